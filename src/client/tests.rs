#[cfg(test)]
mod tests {
    use crate::client::CacheClient;
    use crate::cluster::protocol::KEY_NOT_FOUND;
    use crate::cluster::service::ClusterService;
    use crate::cluster::types::NodeDescriptor;
    use crate::server::CacheServer;
    use std::sync::Arc;

    /// Bind a full node on ephemeral loopback ports and serve it.
    async fn spawn_node(id: &str) -> (NodeDescriptor, Arc<ClusterService>) {
        let rest = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let rpc = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let descriptor = NodeDescriptor::new(
            id,
            "127.0.0.1",
            rest.local_addr().unwrap().port(),
            rpc.local_addr().unwrap().port(),
        );

        let cluster = ClusterService::new(descriptor.clone(), vec![descriptor.clone()], 4, 42);
        let server = CacheServer::new(64, Arc::clone(&cluster)).unwrap();
        server.serve(rest, rpc);
        (descriptor, cluster)
    }

    #[tokio::test]
    async fn test_connect_fails_without_reachable_seed() {
        let seeds = vec![NodeDescriptor::new("ghost", "127.0.0.1", 9, 9)];
        assert!(CacheClient::connect_seeds(&seeds, 4).await.is_err());
    }

    #[tokio::test]
    async fn test_single_node_roundtrip() {
        let (descriptor, cluster) = spawn_node("solo").await;
        let client = CacheClient::connect_seeds(&[descriptor], 4).await.unwrap();

        assert_eq!(client.registry().len(), 1);
        assert_eq!(client.owner_of("anything").unwrap().id, "solo");
        assert!(client.owner_of("").is_err());

        client.put("greeting", "hello").await.unwrap();
        assert_eq!(
            client.get("greeting").await.unwrap(),
            Some("hello".to_string())
        );
        assert_eq!(client.get("absent").await.unwrap(), None);

        client.put_rpc("direct", "value").await.unwrap();
        assert_eq!(client.get_rpc("direct").await.unwrap(), "value");
        assert_eq!(client.get_rpc("missing").await.unwrap(), KEY_NOT_FOUND);

        cluster.shutdown();
    }

    #[tokio::test]
    async fn test_refresh_follows_leader_view() {
        let (descriptor, cluster) = spawn_node("solo").await;
        cluster.run_election().await;

        let client = CacheClient::connect_seeds(&[descriptor], 4).await.unwrap();

        // The leader's view is unchanged, so a refresh is a no-op diff.
        client.refresh_cluster_config().await.unwrap();
        assert_eq!(client.registry().len(), 1);
        assert_eq!(client.ring().len(), 4);

        cluster.shutdown();
    }
}

//! End-to-end cluster tests: real servers on ephemeral loopback ports,
//! driven through the client facade and the RPC surface.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use shardcache::client::CacheClient;
use shardcache::cluster::protocol::KEY_NOT_FOUND;
use shardcache::cluster::service::ClusterService;
use shardcache::cluster::types::NodeDescriptor;
use shardcache::server::CacheServer;

struct TestNode {
    descriptor: NodeDescriptor,
    cluster: Arc<ClusterService>,
    #[allow(dead_code)]
    server: CacheServer,
}

/// Bind and serve one node per (id, pid) pair; every node is seeded with the
/// full membership, mirroring a shared config file.
async fn spawn_cluster(
    specs: &[(&str, u32)],
    virtual_nodes: u32,
    capacity: usize,
) -> Vec<TestNode> {
    let mut listeners = Vec::new();
    let mut descriptors = Vec::new();

    for (id, _) in specs {
        let rest = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let rpc = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        descriptors.push(NodeDescriptor::new(
            *id,
            "127.0.0.1",
            rest.local_addr().unwrap().port(),
            rpc.local_addr().unwrap().port(),
        ));
        listeners.push((rest, rpc));
    }

    let mut nodes = Vec::new();
    for (i, (rest, rpc)) in listeners.into_iter().enumerate() {
        let cluster = ClusterService::new(
            descriptors[i].clone(),
            descriptors.clone(),
            virtual_nodes,
            specs[i].1,
        );
        let server = CacheServer::new(capacity, Arc::clone(&cluster)).unwrap();
        server.serve(rest, rpc);
        nodes.push(TestNode {
            descriptor: descriptors[i].clone(),
            cluster,
            server,
        });
    }
    nodes
}

/// Poll `condition` until it holds or the deadline passes.
async fn wait_until<F: Fn() -> bool>(deadline: Duration, condition: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    condition()
}

fn shut_down(nodes: &[TestNode]) {
    for node in nodes {
        node.cluster.shutdown();
    }
}

// ============================================================
// ELECTION AND MEMBERSHIP
// ============================================================

#[tokio::test]
async fn test_highest_ranked_challenger_wins() {
    let nodes = spawn_cluster(&[("a", 100), ("b", 200), ("c", 300)], 1, 16).await;

    // "c" outranks everyone, so its own election makes it leader and the
    // announcement reaches both peers.
    nodes[2].cluster.run_election().await;

    for node in &nodes {
        assert_eq!(node.cluster.leader_id(), "c", "node {}", node.descriptor.id);
    }
    shut_down(&nodes);
}

#[tokio::test]
async fn test_simultaneous_elections_converge_on_one_leader() {
    let nodes = spawn_cluster(&[("a", 100), ("b", 200), ("c", 300)], 1, 16).await;

    let elections: Vec<_> = nodes
        .iter()
        .map(|node| {
            let cluster = Arc::clone(&node.cluster);
            tokio::spawn(async move {
                cluster.run_election().await;
            })
        })
        .collect();
    for handle in elections {
        handle.await.unwrap();
    }

    let converged = wait_until(Duration::from_secs(20), || {
        let leaders: Vec<String> = nodes.iter().map(|n| n.cluster.leader_id()).collect();
        leaders.iter().all(|l| l == &leaders[0])
            && nodes.iter().filter(|n| n.cluster.is_leader()).count() == 1
    })
    .await;
    assert!(converged, "cluster did not settle on a single leader");

    shut_down(&nodes);
}

#[tokio::test]
async fn test_leader_failure_triggers_reelection() {
    let nodes = spawn_cluster(&[("a", 100), ("b", 200), ("c", 300)], 1, 16).await;
    let monitors: Vec<_> = nodes
        .iter()
        .map(|node| {
            let cluster = Arc::clone(&node.cluster);
            tokio::spawn(async move {
                cluster.run_election().await;
                cluster.monitor_liveness().await;
            })
        })
        .collect();

    let elected = wait_until(Duration::from_secs(20), || {
        nodes.iter().all(|n| n.cluster.leader_id() == "c")
    })
    .await;
    assert!(elected, "initial election did not converge on c");

    // Kill the leader; its listeners close and its monitor stops.
    nodes[2].cluster.shutdown();

    let survivors = &nodes[..2];
    let recovered = wait_until(Duration::from_secs(30), || {
        let leaders: Vec<String> = survivors.iter().map(|n| n.cluster.leader_id()).collect();
        leaders.iter().all(|l| l == &leaders[0] && l != "c")
            && survivors
                .iter()
                .all(|n| !n.cluster.registry().contains("c"))
    })
    .await;
    assert!(recovered, "survivors did not elect a new leader and drop c");

    shut_down(&nodes);
    for handle in monitors {
        let _ = handle.await;
    }
}

#[tokio::test]
async fn test_registration_reaches_every_peer() {
    let nodes = spawn_cluster(&[("a", 100), ("b", 200)], 1, 16).await;
    nodes[1].cluster.run_election().await;
    assert!(nodes[1].cluster.is_leader());

    // A third node starts later, knowing the original two as seeds.
    let rest = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let rpc = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let descriptor = NodeDescriptor::new(
        "late",
        "127.0.0.1",
        rest.local_addr().unwrap().port(),
        rpc.local_addr().unwrap().port(),
    );
    let seeds = vec![
        nodes[0].descriptor.clone(),
        nodes[1].descriptor.clone(),
        descriptor.clone(),
    ];
    let cluster = ClusterService::new(descriptor, seeds, 1, 50);
    let server = CacheServer::new(16, Arc::clone(&cluster)).unwrap();
    server.serve(rest, rpc);

    cluster.register_with_cluster().await;

    let propagated = wait_until(Duration::from_secs(20), || {
        nodes.iter().all(|n| n.cluster.registry().contains("late"))
    })
    .await;
    assert!(propagated, "registration did not reach every peer");

    cluster.shutdown();
    shut_down(&nodes);
}

// ============================================================
// END-TO-END CACHING
// ============================================================

#[tokio::test]
async fn test_put_then_get_through_same_ring_view() {
    let nodes = spawn_cluster(&[("a", 100), ("b", 200), ("c", 300)], 10, 128).await;
    let seeds: Vec<NodeDescriptor> = nodes.iter().map(|n| n.descriptor.clone()).collect();
    let client = CacheClient::connect_seeds(&seeds, 10).await.unwrap();

    client.put("k", "v").await.unwrap();
    assert_eq!(client.get("k").await.unwrap(), Some("v".to_string()));

    shut_down(&nodes);
}

#[tokio::test]
async fn test_ten_thousand_concurrent_puts() {
    let nodes = spawn_cluster(&[("a", 100), ("b", 200), ("c", 300)], 10, 10_000).await;
    let seeds: Vec<NodeDescriptor> = nodes.iter().map(|n| n.descriptor.clone()).collect();
    let client = CacheClient::connect_seeds(&seeds, 10).await.unwrap();

    let errors = Arc::new(AtomicUsize::new(0));
    let mut workers = Vec::new();
    for task in 0..10 {
        let client = Arc::clone(&client);
        let errors = Arc::clone(&errors);
        workers.push(tokio::spawn(async move {
            for i in 0..1000 {
                let key = format!("{}-{}", task, i);
                if client.put(&key, &key).await.is_err() {
                    errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }
    assert_eq!(errors.load(Ordering::Relaxed), 0, "puts must not fail");

    // No key was lost, and no key was replicated: the ring placed each one
    // on exactly one node's local store.
    let total: usize = nodes.iter().map(|n| n.server.store().len()).sum();
    assert_eq!(total, 10_000);

    let http = reqwest::Client::new();
    for task in 0..10 {
        let key = format!("{}-{}", task, task * 99 % 1000);
        assert_eq!(client.get(&key).await.unwrap(), Some(key.clone()));

        let mut holders = 0;
        for node in &nodes {
            let url = format!("{}/rpc/get/{}", node.descriptor.rpc_base(), key);
            let data: serde_json::Value = http
                .get(url)
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if data["data"] != KEY_NOT_FOUND {
                holders += 1;
            }
        }
        assert_eq!(holders, 1, "key {} must live on exactly one node", key);
    }

    shut_down(&nodes);
}

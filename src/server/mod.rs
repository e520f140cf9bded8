//! Cache Node Assembly
//!
//! Wires one node's LRU store and cluster service into its two HTTP
//! surfaces: the public REST endpoint and the internal RPC endpoint used by
//! peers and routed clients. Handlers trust that callers routed correctly
//! and always operate on the local store only.

pub mod handlers;

use anyhow::Result;
use axum::routing::{get, post};
use axum::{extract::Extension, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::cluster::handlers as cluster_handlers;
use crate::cluster::protocol::{
    ENDPOINT_CLUSTER_CONFIG, ENDPOINT_ELECTION, ENDPOINT_GET, ENDPOINT_LEADER, ENDPOINT_PID,
    ENDPOINT_PUT, ENDPOINT_REGISTER, ENDPOINT_STATUS, ENDPOINT_UPDATE_CLUSTER_CONFIG,
    ENDPOINT_UPDATE_LEADER,
};
use crate::cluster::service::ClusterService;
use crate::store::LruStore;

/// One cache node: a bounded LRU store plus the cluster service that keeps
/// the node's membership view converging.
pub struct CacheServer {
    store: Arc<LruStore>,
    cluster: Arc<ClusterService>,
}

impl CacheServer {
    pub fn new(capacity: usize, cluster: Arc<ClusterService>) -> Result<Self, crate::error::Error> {
        Ok(Self {
            store: Arc::new(LruStore::new(capacity)?),
            cluster,
        })
    }

    pub fn store(&self) -> &Arc<LruStore> {
        &self.store
    }

    pub fn cluster(&self) -> &Arc<ClusterService> {
        &self.cluster
    }

    /// Public REST surface: text get/put plus the stats endpoint.
    pub fn rest_router(&self) -> Router {
        Router::new()
            .route("/get/:key", get(handlers::handle_get))
            .route("/put", post(handlers::handle_put))
            .route("/stats", get(handlers::handle_stats))
            .layer(Extension(Arc::clone(&self.store)))
            .layer(Extension(Arc::clone(&self.cluster)))
    }

    /// Internal RPC surface: cache access for routed callers plus the full
    /// membership protocol.
    pub fn rpc_router(&self) -> Router {
        Router::new()
            .route(&format!("{}/:key", ENDPOINT_GET), get(handlers::handle_rpc_get))
            .route(ENDPOINT_PUT, post(handlers::handle_rpc_put))
            .route(ENDPOINT_PID, post(cluster_handlers::handle_pid))
            .route(ENDPOINT_ELECTION, post(cluster_handlers::handle_election))
            .route(ENDPOINT_LEADER, post(cluster_handlers::handle_get_leader))
            .route(
                ENDPOINT_UPDATE_LEADER,
                post(cluster_handlers::handle_update_leader),
            )
            .route(ENDPOINT_STATUS, post(cluster_handlers::handle_status))
            .route(ENDPOINT_REGISTER, post(cluster_handlers::handle_register))
            .route(
                ENDPOINT_CLUSTER_CONFIG,
                post(cluster_handlers::handle_cluster_config),
            )
            .route(
                ENDPOINT_UPDATE_CLUSTER_CONFIG,
                post(cluster_handlers::handle_update_cluster_config),
            )
            .layer(Extension(Arc::clone(&self.store)))
            .layer(Extension(Arc::clone(&self.cluster)))
    }

    /// Serve both routers. Each server task runs until the cluster service's
    /// shutdown signal fires; in-flight requests are allowed to finish.
    pub fn serve(
        &self,
        rest_listener: TcpListener,
        rpc_listener: TcpListener,
    ) -> (JoinHandle<()>, JoinHandle<()>) {
        let rest = Self::spawn_listener("rest", rest_listener, self.rest_router(), &self.cluster);
        let rpc = Self::spawn_listener("rpc", rpc_listener, self.rpc_router(), &self.cluster);
        (rest, rpc)
    }

    /// Join the cluster and keep membership converging: register with the
    /// leader (or discover there is none), elect, then monitor liveness.
    pub fn start_background(&self) -> JoinHandle<()> {
        let cluster = Arc::clone(&self.cluster);
        tokio::spawn(async move {
            cluster.register_with_cluster().await;
            cluster.run_election().await;
            cluster.monitor_liveness().await;
        })
    }

    fn spawn_listener(
        name: &'static str,
        listener: TcpListener,
        router: Router,
        cluster: &Arc<ClusterService>,
    ) -> JoinHandle<()> {
        let mut shutdown = cluster.shutdown_signal();
        tokio::spawn(async move {
            let addr = listener.local_addr().ok();
            info!(endpoint = name, ?addr, "listener starting");
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.changed().await;
                })
                .await;
            if let Err(e) = result {
                error!(endpoint = name, "server error: {e}");
            }
        })
    }
}

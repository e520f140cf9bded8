//! Cluster RPC Handlers
//!
//! HTTP endpoints that expose the membership protocol on the internal RPC
//! port. They translate wire DTOs into [`ClusterService`] calls; election
//! work triggered here runs on spawned tasks so handlers return promptly.

use axum::{extract::Extension, Json};
use std::sync::Arc;
use tracing::debug;

use super::protocol::{
    ClusterConfig, ClusterConfigRequest, ElectionRequest, GenericResponse, LeaderRequest,
    LeaderResponse, NewLeaderAnnouncement, PidRequest, PidResponse, StatusRequest,
};
use super::service::ClusterService;
use super::types::{NodeDescriptor, OK};

/// Rank exchange during an election. Replying with a higher rank may start
/// a counter-election on this node.
pub async fn handle_pid(
    Extension(cluster): Extension<Arc<ClusterService>>,
    Json(req): Json<PidRequest>,
) -> Json<PidResponse> {
    let pid = cluster.on_pid_request(req.caller_pid, &req.caller_node_id);
    Json(PidResponse { pid })
}

/// Election challenge from a lower-ranked peer.
pub async fn handle_election(
    Extension(cluster): Extension<Arc<ClusterService>>,
    Json(req): Json<ElectionRequest>,
) -> Json<GenericResponse> {
    let data = cluster.on_election_request(&req.caller_node_id);
    Json(GenericResponse { data })
}

/// Leader discovery. Blocks until a leader exists, electing one if needed.
pub async fn handle_get_leader(
    Extension(cluster): Extension<Arc<ClusterService>>,
    Json(req): Json<LeaderRequest>,
) -> Json<LeaderResponse> {
    debug!(caller = %req.caller, "leader lookup");
    let id = cluster.ensure_leader().await;
    Json(LeaderResponse { id })
}

/// Winner announcement from an election elsewhere in the cluster.
pub async fn handle_update_leader(
    Extension(cluster): Extension<Arc<ClusterService>>,
    Json(req): Json<NewLeaderAnnouncement>,
) -> Json<GenericResponse> {
    cluster.record_leader(&req.leader_id);
    Json(GenericResponse {
        data: OK.to_string(),
    })
}

/// Liveness probe; answering at all is the signal.
pub async fn handle_status(
    Extension(cluster): Extension<Arc<ClusterService>>,
    Json(req): Json<StatusRequest>,
) -> Json<GenericResponse> {
    debug!(node = %cluster.local().id, caller = %req.caller_node_id, "returning status");
    Json(GenericResponse {
        data: OK.to_string(),
    })
}

/// Registration of a newly started node. Leader-only in practice; a changed
/// membership is fanned out to the peers in the background.
pub async fn handle_register(
    Extension(cluster): Extension<Arc<ClusterService>>,
    Json(node): Json<NodeDescriptor>,
) -> Json<GenericResponse> {
    if cluster.register_node(node) {
        let service = Arc::clone(&cluster);
        tokio::spawn(async move {
            service.broadcast_cluster_config().await;
        });
    }
    Json(GenericResponse {
        data: OK.to_string(),
    })
}

/// Full membership dump, served to servers and clients alike.
pub async fn handle_cluster_config(
    Extension(cluster): Extension<Arc<ClusterService>>,
    Json(req): Json<ClusterConfigRequest>,
) -> Json<ClusterConfig> {
    debug!(caller = %req.caller_node_id, "returning cluster config");
    Json(ClusterConfig {
        nodes: cluster.cluster_config(),
    })
}

/// Membership replacement pushed by the leader.
pub async fn handle_update_cluster_config(
    Extension(cluster): Extension<Arc<ClusterService>>,
    Json(config): Json<ClusterConfig>,
) -> Json<GenericResponse> {
    cluster.apply_cluster_config(config.nodes);
    Json(GenericResponse {
        data: OK.to_string(),
    })
}

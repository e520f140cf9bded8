//! Cache Request Handlers
//!
//! Thin adapters between the HTTP surfaces and the local LRU store. They
//! perform no cross-node routing: the client facade (or a peer) has already
//! resolved the owner before the request arrives here.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use sysinfo::System;
use tracing::debug;

use crate::cluster::protocol::{GenericResponse, GetResponse, PutRequest, KEY_NOT_FOUND};
use crate::cluster::service::ClusterService;
use crate::error::Error;
use crate::store::LruStore;

/// A key-value pair on the text endpoint. Both sides are opaque strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pair {
    pub key: String,
    pub value: String,
}

/// Text read: `GET /get/{key}` returns `{key, value}` or `{error}`.
pub async fn handle_get(
    Extension(store): Extension<Arc<LruStore>>,
    Path(key): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    match store.get(&key) {
        Some(value) => (StatusCode::OK, Json(json!({ "key": key, "value": value }))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": Error::KeyNotFound.to_string() })),
        ),
    }
}

/// Text write: `POST /put` with `{key, value}` stores unconditionally.
pub async fn handle_put(
    Extension(store): Extension<Arc<LruStore>>,
    Json(pair): Json<Pair>,
) -> (StatusCode, Json<Pair>) {
    store.put(&pair.key, &pair.value);
    (StatusCode::CREATED, Json(pair))
}

/// RPC read: the value, or the [`KEY_NOT_FOUND`] sentinel on a miss.
pub async fn handle_rpc_get(
    Extension(store): Extension<Arc<LruStore>>,
    Path(key): Path<String>,
) -> Json<GetResponse> {
    let data = store
        .get(&key)
        .unwrap_or_else(|| KEY_NOT_FOUND.to_string());
    Json(GetResponse { data })
}

/// RPC write; cannot fail on a well-formed request.
pub async fn handle_rpc_put(
    Extension(store): Extension<Arc<LruStore>>,
    Json(req): Json<PutRequest>,
) -> Json<GenericResponse> {
    debug!(key = %req.key, "rpc put");
    store.put(&req.key, &req.value);
    Json(GenericResponse {
        data: crate::cluster::types::OK.to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct NodeSummary {
    pub id: String,
    pub host: String,
    pub rest_port: u16,
    pub rpc_port: u16,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub node_id: String,
    pub leader_id: String,
    pub cluster_size: usize,
    pub nodes: Vec<NodeSummary>,
    pub cache_entries: usize,
    pub cache_capacity: usize,
    pub cpu_usage: f32,
    pub mem_used_mb: u64,
    pub mem_total_mb: u64,
}

/// Node and process statistics for operators.
pub async fn handle_stats(
    Extension(store): Extension<Arc<LruStore>>,
    Extension(cluster): Extension<Arc<ClusterService>>,
) -> Json<StatsResponse> {
    let nodes: Vec<NodeSummary> = cluster
        .cluster_config()
        .into_iter()
        .map(|n| NodeSummary {
            id: n.id,
            host: n.host,
            rest_port: n.rest_port,
            rpc_port: n.rpc_port,
        })
        .collect();

    let mut sys = System::new_all();
    sys.refresh_cpu();
    sys.refresh_memory();
    let cpu_usage = sys.global_cpu_info().cpu_usage();
    // sysinfo reports memory in bytes.
    let mem_total_mb = sys.total_memory() / (1024 * 1024);
    let mem_used_mb = sys.used_memory() / (1024 * 1024);

    Json(StatsResponse {
        node_id: cluster.local().id.clone(),
        leader_id: cluster.leader_id(),
        cluster_size: nodes.len(),
        nodes,
        cache_entries: store.len(),
        cache_capacity: store.capacity(),
        cpu_usage,
        mem_used_mb,
        mem_total_mb,
    })
}

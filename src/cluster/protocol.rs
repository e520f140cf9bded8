//! Cluster RPC Protocol
//!
//! Defines the endpoints and Data Transfer Objects (DTOs) used on the
//! internal RPC port: cache access for routed clients, election traffic, and
//! membership exchange.
//!
//! These structures are serialized as JSON and sent over HTTP. The paths are
//! shared between the server routers and the callers so both sides stay in
//! lockstep.

use serde::{Deserialize, Serialize};

use super::types::NodeDescriptor;

// --- RPC endpoints ---

/// Cache read against the local store of the receiving node.
pub const ENDPOINT_GET: &str = "/rpc/get";
/// Cache write against the local store of the receiving node.
pub const ENDPOINT_PUT: &str = "/rpc/put";
/// Rank exchange during elections.
pub const ENDPOINT_PID: &str = "/rpc/pid";
/// Challenge asking a higher-ranked node to run its own election.
pub const ENDPOINT_ELECTION: &str = "/rpc/election";
/// Leader discovery; elects one first if none is known.
pub const ENDPOINT_LEADER: &str = "/rpc/leader";
/// Announcement of an election winner.
pub const ENDPOINT_UPDATE_LEADER: &str = "/rpc/leader/update";
/// Liveness probe.
pub const ENDPOINT_STATUS: &str = "/rpc/status";
/// Registration of a newly started node, handled by the leader.
pub const ENDPOINT_REGISTER: &str = "/rpc/register";
/// Full membership dump, callable by servers and clients.
pub const ENDPOINT_CLUSTER_CONFIG: &str = "/rpc/cluster";
/// Membership replacement pushed by the leader.
pub const ENDPOINT_UPDATE_CLUSTER_CONFIG: &str = "/rpc/cluster/update";

/// Payload returned by a cache `Get` when the key is absent.
pub const KEY_NOT_FOUND: &str = "key not found";

// --- Data Transfer Objects ---

/// Acknowledgment carrying a status string (usually [`super::types::OK`]).
#[derive(Debug, Serialize, Deserialize)]
pub struct GenericResponse {
    pub data: String,
}

/// Cache read result: the value, or the [`KEY_NOT_FOUND`] sentinel.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetResponse {
    pub data: String,
}

/// Cache write request. Keys and values are opaque strings.
#[derive(Debug, Serialize, Deserialize)]
pub struct PutRequest {
    pub key: String,
    pub value: String,
}

/// Rank query sent while collecting peer ranks for an election.
#[derive(Debug, Serialize, Deserialize)]
pub struct PidRequest {
    pub caller_pid: u32,
    pub caller_node_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PidResponse {
    pub pid: u32,
}

/// Challenge from a lower-ranked node asking the receiver to elect.
#[derive(Debug, Serialize, Deserialize)]
pub struct ElectionRequest {
    pub caller_pid: u32,
    pub caller_node_id: String,
}

/// Leader lookup. The caller id is a node id or a client instance id.
#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderRequest {
    pub caller: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderResponse {
    pub id: String,
}

/// Broadcast by an election winner to every peer.
#[derive(Debug, Serialize, Deserialize)]
pub struct NewLeaderAnnouncement {
    pub leader_id: String,
}

/// Liveness probe payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusRequest {
    pub caller_node_id: String,
}

/// Current membership, as returned by `GetClusterConfig` and pushed by
/// `UpdateClusterConfig`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub nodes: Vec<NodeDescriptor>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterConfigRequest {
    pub caller_node_id: String,
}

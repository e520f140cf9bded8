use serde::{Deserialize, Serialize};

use crate::ring;

/// Sentinel leader id meaning no leader is currently known.
pub const NO_LEADER: &str = "NO LEADER";

/// Generic success payload for acknowledgment-only RPCs.
pub const OK: &str = "OK";

/// A single member of the cluster.
///
/// Descriptors are pure data: endpoints and identity only. Transport
/// connections are pooled separately by whoever talks to the node, so a
/// descriptor can be serialized, compared, and shipped between processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    /// Unique id of the node, stable across restarts.
    pub id: String,
    /// Hostname or address the node's listeners bind to.
    pub host: String,
    /// Port of the public REST endpoint.
    pub rest_port: u16,
    /// Port of the internal RPC endpoint.
    pub rpc_port: u16,
}

impl NodeDescriptor {
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        rest_port: u16,
        rpc_port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            rest_port,
            rpc_port,
        }
    }

    /// Stable hash of the node id, shared with ring placement.
    pub fn hash_id(&self) -> u32 {
        ring::hash_id(&self.id)
    }

    /// Base URL of the REST endpoint.
    pub fn rest_base(&self) -> String {
        format!("http://{}:{}", self.host, self.rest_port)
    }

    /// Base URL of the RPC endpoint.
    pub fn rpc_base(&self) -> String {
        format!("http://{}:{}", self.host, self.rpc_port)
    }
}

/// Mutable election bookkeeping for one server.
///
/// Mutated only by the membership component, under the server's state lock.
#[derive(Debug)]
pub struct ElectionState {
    /// Current leader id, or [`NO_LEADER`].
    pub leader_id: String,
    /// True while an election procedure is in flight on this node.
    pub in_election: bool,
}

impl ElectionState {
    pub fn new() -> Self {
        Self {
            leader_id: NO_LEADER.to_string(),
            in_election: false,
        }
    }

    pub fn has_leader(&self) -> bool {
        self.leader_id != NO_LEADER
    }
}

impl Default for ElectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// True when the first (pid, node id) rank strictly outranks the second.
///
/// Process id is the primary key; node id breaks ties.
pub fn outranks(pid_a: u32, id_a: &str, pid_b: u32, id_b: &str) -> bool {
    (pid_a, id_a) > (pid_b, id_b)
}

//! Cluster Topology Configuration
//!
//! Loads the JSON nodes file consumed at startup:
//!
//! ```json
//! {
//!   "nodes": {
//!     "node1": { "id": "node1", "host": "127.0.0.1", "port": 8080, "grpcPort": 5005 }
//!   }
//! }
//! ```
//!
//! `port` is the public REST endpoint, `grpcPort` the internal RPC endpoint.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::cluster::types::NodeDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfigEntry {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub grpc_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodesConfig {
    pub nodes: HashMap<String, NodeConfigEntry>,
}

impl NodesConfig {
    /// Load and parse a nodes file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: NodesConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Every configured node as a descriptor.
    pub fn descriptors(&self) -> Vec<NodeDescriptor> {
        self.nodes.values().map(NodeConfigEntry::descriptor).collect()
    }

    pub fn node_for_id(&self, id: &str) -> Option<NodeDescriptor> {
        self.nodes.get(id).map(NodeConfigEntry::descriptor)
    }

    /// Find the entry whose host matches, used to infer the local identity
    /// from the `HOSTNAME` environment variable.
    pub fn node_for_host(&self, host: &str) -> Option<NodeDescriptor> {
        self.nodes
            .values()
            .find(|entry| entry.host == host)
            .map(NodeConfigEntry::descriptor)
    }
}

impl NodeConfigEntry {
    pub fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(&self.id, &self.host, self.port, self.grpc_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "nodes": {
            "node1": { "id": "node1", "host": "10.0.0.1", "port": 8080, "grpcPort": 5005 },
            "node2": { "id": "node2", "host": "10.0.0.2", "port": 8080, "grpcPort": 5005 }
        }
    }"#;

    #[test]
    fn test_parse_nodes_file() {
        let config: NodesConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.nodes.len(), 2);

        let node = config.node_for_id("node1").unwrap();
        assert_eq!(node.host, "10.0.0.1");
        assert_eq!(node.rest_port, 8080);
        assert_eq!(node.rpc_port, 5005);
    }

    #[test]
    fn test_node_lookup_by_host() {
        let config: NodesConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.node_for_host("10.0.0.2").unwrap().id, "node2");
        assert!(config.node_for_host("10.0.0.9").is_none());
    }

    #[test]
    fn test_descriptors_cover_all_nodes() {
        let config: NodesConfig = serde_json::from_str(SAMPLE).unwrap();
        let mut ids: Vec<String> = config.descriptors().into_iter().map(|d| d.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["node1".to_string(), "node2".to_string()]);
    }
}

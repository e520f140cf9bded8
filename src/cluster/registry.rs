use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use super::types::NodeDescriptor;

/// In-memory directory of known cluster nodes.
///
/// Reads are concurrent; writes happen only from the membership component
/// (or at startup), which serializes them together with ring updates.
#[derive(Debug)]
pub struct Registry {
    nodes: DashMap<String, NodeDescriptor>,
    rng: Mutex<StdRng>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn insert(&self, node: NodeDescriptor) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn remove(&self, id: &str) -> Option<NodeDescriptor> {
        self.nodes.remove(id).map(|(_, node)| node)
    }

    pub fn get(&self, id: &str) -> Option<NodeDescriptor> {
        self.nodes.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Snapshot of every known descriptor.
    pub fn descriptors(&self) -> Vec<NodeDescriptor> {
        self.nodes
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Every known descriptor except the one with `self_id`.
    pub fn peers(&self, self_id: &str) -> Vec<NodeDescriptor> {
        self.nodes
            .iter()
            .filter(|entry| entry.key() != self_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Uniformly random descriptor, used by clients during discovery.
    pub fn get_random(&self) -> Option<NodeDescriptor> {
        let snapshot = self.descriptors();
        if snapshot.is_empty() {
            return None;
        }
        let idx = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen_range(0..snapshot.len())
        };
        Some(snapshot[idx].clone())
    }

    /// Replace the whole directory with `nodes`.
    pub fn replace_all(&self, nodes: Vec<NodeDescriptor>) {
        self.nodes.clear();
        for node in nodes {
            self.insert(node);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

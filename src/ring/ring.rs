use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Error;

/// Virtual-node labels are spread over the half-open range [0, 2^31).
const LABEL_SPAN: u64 = 1 << 31;

/// Stable 32-bit hash of an id or key (CRC32-IEEE over the UTF-8 bytes).
pub fn hash_id(id: &str) -> u32 {
    crc32fast::hash(id.as_bytes())
}

#[derive(Debug, Clone)]
struct RingPoint {
    id: String,
    position: u32,
}

#[derive(Debug, Default)]
struct Inner {
    points: Vec<RingPoint>, // sorted by (position, id)
    virtual_map: HashMap<String, String>, // virtual id -> physical id
}

/// Consistent-hash ring with virtual nodes.
///
/// Lookups run concurrently; `add`/`remove` take the write lock. For a fixed
/// node set and virtual factor, `get` is a pure function of the key.
#[derive(Debug)]
pub struct Ring {
    virtual_nodes: u32,
    inner: RwLock<Inner>,
}

impl Ring {
    pub fn new(virtual_nodes: u32) -> Self {
        Self {
            virtual_nodes,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Insert a physical node.
    ///
    /// With no virtual nodes the single point sits at the hash of the id.
    /// Otherwise `virtual_nodes` labels are spaced evenly from that hash, and
    /// each point sits at the hash of its derived id `"<id>-<label>"`, which
    /// the reverse index maps back to the physical id.
    pub fn add(&self, id: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.add(id, self.virtual_nodes);
    }

    /// Remove a physical node and every ring point it contributed.
    pub fn remove(&self, id: &str) -> Result<(), Error> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        let Inner {
            points,
            virtual_map,
        } = &mut *inner;

        let before = points.len();
        if self.virtual_nodes == 0 {
            points.retain(|p| p.id != id);
        } else {
            points.retain(|p| virtual_map.get(&p.id).map(String::as_str) != Some(id));
            virtual_map.retain(|_, physical| physical != id);
        }

        if points.len() == before {
            return Err(Error::NodeNotFound);
        }
        Ok(())
    }

    /// Resolve the physical node that owns `key`.
    pub fn get(&self, key: &str) -> Result<String, Error> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        if inner.points.is_empty() {
            return Err(Error::EmptyRing);
        }

        let target = hash_id(key);
        let mut idx = inner.points.partition_point(|p| p.position < target);
        if idx == inner.points.len() {
            idx = 0; // wrap past the last point
        }

        let point = &inner.points[idx];
        Ok(inner
            .virtual_map
            .get(&point.id)
            .cloned()
            .unwrap_or_else(|| point.id.clone()))
    }

    /// Replace the entire membership in one step.
    pub fn reset<I>(&self, ids: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.points.clear();
        inner.virtual_map.clear();
        for id in ids {
            inner.add(id.as_ref(), self.virtual_nodes);
        }
    }

    /// Number of ring points (not physical nodes).
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn virtual_nodes(&self) -> u32 {
        self.virtual_nodes
    }

    /// Percentage of `keys` owned by each physical node.
    ///
    /// Used to validate that virtual nodes smooth the key distribution.
    pub fn distribution<S: AsRef<str>>(&self, keys: &[S]) -> HashMap<String, f64> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for key in keys {
            if let Ok(owner) = self.get(key.as_ref()) {
                *counts.entry(owner).or_insert(0) += 1;
            }
        }

        let total = keys.len() as f64;
        counts
            .into_iter()
            .map(|(owner, count)| (owner, count as f64 / total * 100.0))
            .collect()
    }
}

impl Inner {
    fn add(&mut self, id: &str, virtual_nodes: u32) {
        if virtual_nodes == 0 {
            self.points.push(RingPoint {
                id: id.to_string(),
                position: hash_id(id),
            });
        } else {
            let step = LABEL_SPAN / u64::from(virtual_nodes);
            let base = u64::from(hash_id(id));
            for i in 0..u64::from(virtual_nodes) {
                let label = (base + i * step) % LABEL_SPAN;
                let virtual_id = format!("{}-{}", id, label);
                self.points.push(RingPoint {
                    position: hash_id(&virtual_id),
                    id: virtual_id.clone(),
                });
                self.virtual_map.insert(virtual_id, id.to_string());
            }
        }
        self.points
            .sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
    }
}

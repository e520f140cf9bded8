//! Cluster Coordination Module
//!
//! Maintains the authoritative view of cluster membership and keeps every
//! participant converging toward it.
//!
//! ## Core Mechanisms
//! - **Registry**: In-memory directory of known nodes and their endpoints,
//!   mutated only by the membership protocol.
//! - **Bully election**: The highest-ranked live node (rank = process id,
//!   then node id) wins leadership. Lower-ranked nodes that detect a missing
//!   leader challenge higher-ranked ones and yield when outranked.
//! - **Liveness monitor**: A once-per-second loop. Followers probe the
//!   leader and call an election when it stops answering; the leader probes
//!   every peer, expels unreachable ones from the registry and the ring, and
//!   fans the updated configuration out to the survivors.
//! - **Configuration fan-out**: Followers and clients replace their registry
//!   and rebuild their ring whenever the leader pushes a new cluster config.

pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod types;

//! Distributed In-Memory Cache Cluster Library
//!
//! This library crate defines the core modules that make up the cache cluster.
//! It serves as the foundation for the server binary (`main.rs`) and for the
//! embeddable client facade.
//!
//! ## Architecture Modules
//! The system is composed of six loosely coupled subsystems:
//!
//! - **`store`**: The bounded LRU key-value store. Each node owns one store;
//!   entries are evicted strictly by recency when capacity is exceeded.
//! - **`ring`**: The consistent-hash ring with virtual nodes. Both servers and
//!   clients use it to map a key to the single node that owns it.
//! - **`cluster`**: The coordination layer. Maintains the node registry, runs
//!   Bully leader election, monitors peer liveness, and fans out cluster
//!   configuration updates from the leader to followers.
//! - **`server`**: The cache node assembly. Wires the store and the cluster
//!   service into the public REST endpoint and the internal RPC endpoint.
//! - **`client`**: The routing facade. Resolves key ownership through a local
//!   ring, issues requests to owners, and keeps its cluster view fresh with a
//!   background configuration watcher.
//! - **`config`**: Cluster topology loading from the JSON nodes file.

pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
pub mod ring;
pub mod server;
pub mod store;

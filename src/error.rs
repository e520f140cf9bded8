//! Typed errors for cache, ring, and cluster operations.
//!
//! Transport-level failures (timeouts, refused connections) are reported as
//! `anyhow` errors at the call sites that absorb them; the variants here are
//! the ones callers are expected to match on.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Cache miss.
    #[error("element not found")]
    KeyNotFound,

    /// The ring or the registry has no entry for the requested node.
    #[error("node not found")]
    NodeNotFound,

    /// Lookup against a ring with no points.
    #[error("empty ring")]
    EmptyRing,

    /// No leader is known and none could be discovered.
    #[error("no leader")]
    NoLeader,

    /// Store construction with a capacity of zero.
    #[error("cache capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),

    /// Malformed client input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

//! Bounded LRU Store
//!
//! Implements the per-node cache: a fixed-capacity key-value map with strict
//! least-recently-used eviction.
//!
//! ## Core Concepts
//! - **Recency order**: Entries live on a doubly-linked list, most recently
//!   used first. A hit moves the entry to the front; the back is the eviction
//!   candidate.
//! - **O(1) operations**: A hash index maps keys to list slots, so lookup,
//!   insert, and eviction are all constant time.
//! - **Concurrency**: A `get` reorders the list, so every operation is a
//!   writer; all operations serialize under a single internal mutex and are
//!   linearizable per store.

mod lru;

pub use lru::LruStore;

#[cfg(test)]
mod tests;

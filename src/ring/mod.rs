//! Consistent-Hash Ring
//!
//! Maps keys to owning nodes so that every participant that agrees on the
//! node set and the virtual-node factor computes the same owner for a key.
//!
//! ## Mechanism
//! - **Hashing**: Node ids and keys are hashed to a `u32` with CRC32-IEEE.
//!   One hash function is used for both ring points and key lookups.
//! - **Virtual nodes**: Each physical node contributes `V` evenly spaced ring
//!   points, which lowers the variance of the key distribution. A reverse
//!   index maps each virtual point back to its physical node.
//! - **Lookup**: Binary search for the first point at or past the key's hash,
//!   wrapping to the first point when the hash exceeds every position.

mod ring;

pub use ring::{hash_id, Ring};

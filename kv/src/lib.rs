//! `kv` is an in-memory, ordered key-value engine with per-key TTL expiration, a single
//! buffered client transaction, and append-only log durability.
//!
//! The keyspace is a sorted vector (see [`storage::Keyspace`]), expired records are purged
//! lazily on access, and every committed write is appended as a line to a durability log
//! that is replayed in full on startup. [Author fengyang]

pub mod clock;
pub mod error;
pub mod storage;
pub mod store;
pub mod txn;

pub use store::{Outcome, Store};

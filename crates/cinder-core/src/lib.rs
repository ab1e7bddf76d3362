//! cinder-core: the keyspace engine.
//!
//! Owns the multi-database store, the typed value datastructures, and
//! expiration. A [`Store`] holds a fixed sequence of databases, each an
//! independent keyspace protected by its own reader-writer lock. All
//! higher layers (the command dispatcher, the snapshot engine) talk to
//! the store through database-indexed operations.

pub mod error;
pub mod expiry;
pub mod glob;
pub mod store;
pub mod time;
pub mod types;

pub use error::StoreError;
pub use store::{Store, StoreConfig, TtlResult, DEFAULT_DATABASES};
pub use types::Value;

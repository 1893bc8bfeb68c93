//! Storage layer
//!
//! Keeps the last fetched task snapshot in SQLite so that front ends can
//! show stale data across restarts while the backend is unreachable.
//!
//! The backend stays the source of truth; the cache is overwritten
//! wholesale after every successful fetch.

pub mod cache;
pub mod error;
pub mod schema;

pub use cache::SnapshotCache;
pub use error::{StorageError, StorageResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};

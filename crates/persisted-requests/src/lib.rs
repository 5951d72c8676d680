//! Durable request store for the sequential queue.
//!
//! This crate provides:
//! - `PersistedRequests`: the ordered pending list plus the single in-flight
//!   slot, mirrored to storage after every mutation
//! - `KeyValueStorage`: the persistence port, with SQLite and in-memory adapters
//!
//! Memory is authoritative for the lifetime of the process. Storage is a
//! cache used to resume after a restart, so write failures are logged and
//! never block the queue.

mod error;
mod storage;
mod store;
mod writer;

pub use error::{StoreError, StoreResult};
pub use storage::{InMemoryStorage, KeyValueStorage, SqliteStorage};
pub use store::{PersistedRequests, PERSISTED_ONGOING_REQUEST_KEY, PERSISTED_REQUESTS_KEY};

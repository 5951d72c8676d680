//! SQLite persistence layer for the request queue.
//!
//! This crate provides:
//! - Async SQLite executor with a dedicated thread
//! - Schema migrations
//! - Key-value query helpers used to persist queue snapshots
//!
//! # Architecture
//!
//! `AsyncDatabase` uses a single dedicated thread for all SQLite operations.
//! Queries are sent through a channel and executed in FIFO order.
//!
//! ```ignore
//! let db = AsyncDatabase::open(path).await?;
//! db.call(|conn| queries::set_value(conn, "persistedRequests", "[]")).await?;
//! ```
//!
//! **Important**: Only SQL operations should run inside `db.call()`.
//! Serialization and heavy computation must happen outside.

mod error;
mod executor;
mod migrations;
pub mod queries;

pub use error::{DatabaseError, DatabaseResult};
pub use executor::AsyncDatabase;
pub use migrations::{run_migrations, CURRENT_VERSION};

//! # Persistent Snapshot Store
//!
//! Durable, keyed storage for one entity type at a time. Each store owns the
//! complete set of entities of its kind as an immutable in-memory snapshot
//! backed by SQLite:
//!
//! - reads are non-blocking and always observe the last committed snapshot
//! - `replace_all` swaps the entire set atomically (readers never see a mix
//!   of old and new items)
//! - `upsert` overwrites a single entity without disturbing the rest
//! - every commit bumps a monotonic version and notifies subscribers
//!
//! No network or business logic lives here; repositories and coordinators
//! are the only writers.

pub mod db;
pub mod entity;
pub mod error;
pub mod snapshot;
pub mod store;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use entity::CacheEntity;
pub use error::{Result, StoreError};
pub use snapshot::Snapshot;
pub use store::{SnapshotStore, SqliteSnapshotStore};

//! Entity contract for snapshot stores.

use serde::{de::DeserializeOwned, Serialize};

/// An entity that can live in a [`crate::SnapshotStore`].
///
/// Rows are persisted as JSON payloads keyed by [`CacheEntity::id`], one
/// table per [`CacheEntity::KIND`]. Ids are opaque, remote-assigned strings
/// and must be unique within a store.
pub trait CacheEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table-name suffix and event label for this entity type
    /// (e.g. `"artists"`).
    const KIND: &'static str;

    /// Stable unique identifier of this entity.
    fn id(&self) -> &str;
}

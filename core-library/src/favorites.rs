//! Write-through favorite mutations.
//!
//! The remote is the source of truth: the flag is persisted there first and
//! the cache is only patched after the remote accepted the mutation. A
//! failed remote call leaves the cache exactly as it was — no optimistic
//! state is ever visible.

use crate::error::{LibraryError, Result};
use crate::models::Favoritable;
use crate::remote::RemoteMusicService;
use core_runtime::events::{CoreEvent, EventBus, FavoriteEvent};
use core_store::{CacheEntity, SnapshotStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Coordinates favorite toggles for one entity type.
///
/// Concurrent toggles on the same id are serialized through a per-id lock,
/// so the last successfully committed remote call wins and out-of-order
/// cache writes cannot produce a stale final state.
pub struct FavoriteCoordinator<T: CacheEntity + Favoritable> {
    store: Arc<dyn SnapshotStore<T>>,
    remote: Arc<dyn RemoteMusicService>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    events: Option<EventBus>,
}

impl<T: CacheEntity + Favoritable> FavoriteCoordinator<T> {
    pub fn new(store: Arc<dyn SnapshotStore<T>>, remote: Arc<dyn RemoteMusicService>) -> Self {
        Self {
            store,
            remote,
            locks: Mutex::new(HashMap::new()),
            events: None,
        }
    }

    /// Attach an event bus; committed toggles are announced on it.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    async fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Set the favorite flag for `id`.
    ///
    /// Write-through: the remote mutation happens first and the cache is
    /// patched only on success. Returns the updated entity.
    #[instrument(skip(self), fields(kind = T::KIND))]
    pub async fn set_favorite(&self, id: &str, favorite: bool) -> Result<T> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut entity = self.store.read_by_id(id).ok_or_else(|| LibraryError::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        })?;

        self.remote.set_favorite(id, favorite).await.map_err(|e| {
            warn!(kind = T::KIND, id, error = %e, "Remote favorite failed; cache unchanged");
            LibraryError::Remote(e)
        })?;

        entity.set_favorite(favorite);
        self.store.upsert(entity.clone()).await?;

        debug!(kind = T::KIND, id, favorite, "Favorite committed");

        if let Some(bus) = &self.events {
            bus.emit(CoreEvent::Favorite(FavoriteEvent::Changed {
                entity_kind: T::KIND.to_string(),
                entity_id: id.to_string(),
                favorite,
            }))
            .ok();
        }

        Ok(entity)
    }
}

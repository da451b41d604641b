//! Immutable, cheaply-clonable view of one entity collection.

use crate::entity::CacheEntity;
use std::collections::HashMap;
use std::sync::Arc;

/// The complete, internally consistent set of entities of one type at a
/// point in time.
///
/// Cloning a snapshot is two `Arc` bumps; readers keep whatever snapshot
/// they cloned even while a writer commits a newer one.
#[derive(Debug)]
pub struct Snapshot<T> {
    items: Arc<Vec<T>>,
    index: Arc<HashMap<String, usize>>,
    version: u64,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            index: Arc::clone(&self.index),
            version: self.version,
        }
    }
}

impl<T: CacheEntity> Snapshot<T> {
    /// An empty snapshot at version 0 (nothing committed yet).
    pub fn empty() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            index: Arc::new(HashMap::new()),
            version: 0,
        }
    }

    /// Build a snapshot from an ordered item list.
    ///
    /// Ids are expected to be unique; if a duplicate slips through, the
    /// later occurrence wins the index entry.
    pub fn new(items: Vec<T>, version: u64) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id().to_string(), i))
            .collect();

        Self {
            items: Arc::new(items),
            index: Arc::new(index),
            version,
        }
    }

    /// Items in committed order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Owned copy of the items in committed order.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.as_ref().clone()
    }

    /// Look up one entity by id.
    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Monotonic commit counter; bumped on every `replace_all`/`upsert`.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Derive a new snapshot with one item inserted or overwritten in place.
    pub(crate) fn with_upsert(&self, item: T, version: u64) -> Self {
        let mut items = self.items.as_ref().clone();
        match self.index.get(item.id()) {
            Some(&i) => items[i] = item,
            None => items.push(item),
        }
        Self::new(items, version)
    }
}

//! Keyed single-flight execution.
//!
//! Prevents duplicate concurrent work for the same logical request:
//! overlapping callers share one underlying future and therefore one
//! outcome. The map holds only weak handles, so if every caller drops
//! (cancellation) the underlying work is dropped mid-flight too, and the
//! next caller starts fresh.

use futures::future::{BoxFuture, FutureExt, WeakShared};
use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::Mutex;

type WeakOp<V, E> = WeakShared<BoxFuture<'static, std::result::Result<V, E>>>;

/// Deduplicates concurrent operations per key.
///
/// `V` and `E` must be `Clone` so every joiner receives the shared outcome.
pub struct SingleFlight<K, V, E> {
    in_flight: Mutex<HashMap<K, WeakOp<V, E>>>,
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Join the in-flight operation for `key`, or start `make()` as the new
    /// one. All joiners resolve with the same cloned result.
    pub async fn run<F>(&self, key: K, make: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> BoxFuture<'static, std::result::Result<V, E>>,
    {
        let shared = {
            let mut map = self.in_flight.lock().await;
            map.retain(|_, weak| weak.upgrade().is_some());

            let existing = map
                .get(&key)
                .and_then(|weak| weak.upgrade())
                // A completed flight is never rejoined; a later call is a
                // new logical request.
                .filter(|op| op.peek().is_none());

            match existing {
                Some(op) => op,
                None => {
                    let op = make().shared();
                    if let Some(weak) = op.downgrade() {
                        map.insert(key, weak);
                    }
                    op
                }
            }
        };

        shared.await
    }

    /// Whether an operation for `key` is currently in flight.
    pub async fn is_in_flight(&self, key: &K) -> bool {
        let map = self.in_flight.lock().await;
        map.get(key)
            .and_then(|weak| weak.upgrade())
            .map(|op| op.peek().is_none())
            .unwrap_or(false)
    }
}

impl<K, V, E> Default for SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

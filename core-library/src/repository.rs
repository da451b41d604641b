//! Cache-first repository over one entity type.
//!
//! Reads come straight from the snapshot store; refreshes go to the remote
//! and commit into the store on success. Concurrent refreshes for the same
//! fetch window are deduplicated — all callers attach to one underlying
//! remote call and share its outcome.

use crate::error::{LibraryError, Result};
use crate::pagination::PageRequest;
use crate::remote::RemoteResult;
use crate::single_flight::SingleFlight;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use core_store::{CacheEntity, Snapshot, SnapshotStore};
use async_trait::async_trait;
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

/// Fetch adapter binding a repository to one collection of the remote
/// service. The composition root implements this per entity type.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteFetcher<T: Send + Sync + 'static>: Send + Sync {
    /// Fetch one window of the collection; `None` means everything.
    async fn fetch(&self, page: Option<PageRequest>) -> RemoteResult<Vec<T>>;
}

/// Logical fetch key for single-flight deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKey {
    /// Whole-collection fetch.
    Full,
    /// One paging window.
    Window { page: u32, page_size: u32 },
}

impl From<Option<PageRequest>> for FetchKey {
    fn from(page: Option<PageRequest>) -> Self {
        match page {
            None => FetchKey::Full,
            Some(p) => FetchKey::Window {
                page: p.page,
                page_size: p.page_size,
            },
        }
    }
}

/// Where a feed emission came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionSource {
    /// Last committed cache snapshot (possibly stale).
    Cache,
    /// Freshly refreshed from the remote.
    Remote,
}

/// One delivery of a cache-then-network subscription.
#[derive(Debug, Clone)]
pub struct Emission<T> {
    pub items: Vec<T>,
    pub source: EmissionSource,
    pub version: u64,
}

/// Terminal or intermediate feed state.
#[derive(Debug, Clone)]
pub enum FeedEvent<T> {
    Snapshot(Emission<T>),
    /// The refresh failed; the cache emission (if consumed) stands.
    Failed(LibraryError),
}

/// Two-phase cache-then-network subscription.
///
/// Backed by a `watch` channel, which retains only the latest unconsumed
/// value: when the refresh lands before the cache emission was consumed,
/// the stale emission is overwritten and never delivered. Stale data is
/// therefore never observed after fresh data on the same subscription.
pub struct SnapshotFeed<T> {
    rx: watch::Receiver<FeedEvent<T>>,
    first: bool,
}

impl<T: Clone> SnapshotFeed<T> {
    /// Next emission, or `None` once the feed is exhausted.
    pub async fn next(&mut self) -> Option<FeedEvent<T>> {
        if self.first {
            self.first = false;
            return Some(self.rx.borrow_and_update().clone());
        }

        match self.rx.changed().await {
            Ok(()) => Some(self.rx.borrow_and_update().clone()),
            Err(_) => None,
        }
    }
}

/// Cache-first view of one entity collection.
pub struct Repository<T: CacheEntity> {
    store: Arc<dyn SnapshotStore<T>>,
    fetcher: Arc<dyn RemoteFetcher<T>>,
    flights: Arc<SingleFlight<FetchKey, Vec<T>, LibraryError>>,
    events: Option<EventBus>,
}

impl<T: CacheEntity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            fetcher: Arc::clone(&self.fetcher),
            flights: Arc::clone(&self.flights),
            events: self.events.clone(),
        }
    }
}

impl<T: CacheEntity> Repository<T> {
    pub fn new(store: Arc<dyn SnapshotStore<T>>, fetcher: Arc<dyn RemoteFetcher<T>>) -> Self {
        Self {
            store,
            fetcher,
            flights: Arc::new(SingleFlight::new()),
            events: None,
        }
    }

    /// Attach an event bus; cache commits are announced on it.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Current cached items, instantly. Never fetches; empty is a valid
    /// answer.
    pub fn get(&self) -> Vec<T> {
        self.store.read_all().to_vec()
    }

    /// Current cache snapshot (items + version).
    pub fn snapshot(&self) -> Snapshot<T> {
        self.store.read_all()
    }

    /// Cached entity by id; no implicit remote fetch.
    pub fn get_by_id(&self, id: &str) -> Result<T> {
        self.store.read_by_id(id).ok_or_else(|| LibraryError::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        })
    }

    /// Version notifications for the underlying store ("subscribe to next
    /// change").
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.store.changes()
    }

    /// Fetch from the remote and commit into the cache.
    ///
    /// Joins the in-flight refresh for the same window if one exists; all
    /// joiners receive the same items or the same error. On failure the
    /// cache is untouched. Dropping every joiner cancels the remote call.
    #[instrument(skip(self), fields(kind = T::KIND))]
    pub async fn refresh(&self, page: Option<PageRequest>) -> Result<Vec<T>> {
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let events = self.events.clone();

        self.flights
            .run(FetchKey::from(page), move || {
                async move {
                    let outcome = Self::fetch_and_commit(store, fetcher, page).await;
                    if let Some(bus) = &events {
                        let event = match &outcome {
                            Ok((snapshot, items)) => match page {
                                None => LibraryEvent::SnapshotReplaced {
                                    entity_kind: T::KIND.to_string(),
                                    item_count: items.len(),
                                    version: snapshot.version(),
                                },
                                Some(_) => LibraryEvent::PageMerged {
                                    entity_kind: T::KIND.to_string(),
                                    item_count: items.len(),
                                    version: snapshot.version(),
                                },
                            },
                            Err(e) => LibraryEvent::RefreshFailed {
                                entity_kind: T::KIND.to_string(),
                                message: e.to_string(),
                            },
                        };
                        bus.emit(CoreEvent::Library(event)).ok();
                    }
                    outcome.map(|(_, items)| items)
                }
                .boxed()
            })
            .await
    }

    async fn fetch_and_commit(
        store: Arc<dyn SnapshotStore<T>>,
        fetcher: Arc<dyn RemoteFetcher<T>>,
        page: Option<PageRequest>,
    ) -> Result<(Snapshot<T>, Vec<T>)> {
        let items = fetcher.fetch(page).await.map_err(|e| {
            warn!(kind = T::KIND, error = %e, "Remote fetch failed; cache untouched");
            LibraryError::Remote(e)
        })?;

        let snapshot = match page {
            // A whole-collection fetch is the new truth.
            None => store.replace_all(items.clone()).await?,
            // A window only replaces its own portion of the cache.
            Some(_) => {
                let mut snapshot = store.read_all();
                for item in items.clone() {
                    snapshot = store.upsert(item).await?;
                }
                snapshot
            }
        };

        debug!(
            kind = T::KIND,
            items = items.len(),
            version = snapshot.version(),
            "Refresh committed"
        );
        Ok((snapshot, items))
    }

    /// Cache-then-network subscription: the current cache snapshot is
    /// emitted synchronously, a refresh starts in the background, and the
    /// fresh snapshot (or the error) follows. If the cache emission was not
    /// yet consumed when the refresh lands, it is suppressed.
    pub fn refresh_feed(&self, page: Option<PageRequest>) -> SnapshotFeed<T> {
        let current = self.store.read_all();
        let (tx, rx) = watch::channel(FeedEvent::Snapshot(Emission {
            items: current.to_vec(),
            source: EmissionSource::Cache,
            version: current.version(),
        }));

        let repo = self.clone();
        tokio::spawn(async move {
            let event = match repo.refresh(page).await {
                Ok(_) => {
                    let snapshot = repo.store.read_all();
                    FeedEvent::Snapshot(Emission {
                        items: snapshot.to_vec(),
                        source: EmissionSource::Remote,
                        version: snapshot.version(),
                    })
                }
                Err(e) => FeedEvent::Failed(e),
            };
            tx.send_replace(event);
        });

        SnapshotFeed { rx, first: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Album;
    use core_store::{create_test_pool, SqliteSnapshotStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn album(id: &str, name: &str) -> Album {
        Album::new(id, name, "ar-1", "Artist")
    }

    async fn test_store() -> Arc<SqliteSnapshotStore<Album>> {
        let pool = create_test_pool().await.unwrap();
        let store = SqliteSnapshotStore::new(pool);
        store.initialize().await.unwrap();
        Arc::new(store)
    }

    /// Fetcher that counts calls and can hold them open until released.
    struct CountingFetcher {
        items: Vec<Album>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl RemoteFetcher<Album> for CountingFetcher {
        async fn fetch(&self, _page: Option<PageRequest>) -> RemoteResult<Vec<Album>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(self.items.clone())
        }
    }

    #[tokio::test]
    async fn test_get_is_cache_only() {
        let store = test_store().await;
        let mut mock = MockRemoteFetcher::<Album>::new();
        mock.expect_fetch().times(0);
        let repo = Repository::new(store.clone(), Arc::new(mock));

        assert!(repo.get().is_empty());

        store.replace_all(vec![album("a", "A")]).await.unwrap();
        assert_eq!(repo.get().len(), 1);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let store = test_store().await;
        let mut mock = MockRemoteFetcher::<Album>::new();
        mock.expect_fetch().times(0);
        let repo = Repository::new(store, Arc::new(mock));

        let result = repo.get_by_id("missing");
        assert!(matches!(result, Err(LibraryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_refresh_commits_in_fetch_order() {
        let store = test_store().await;
        let items = vec![album("3", "C"), album("1", "A"), album("2", "B")];
        let fetcher = Arc::new(CountingFetcher {
            items: items.clone(),
            calls: AtomicUsize::new(0),
            gate: None,
        });
        let repo = Repository::new(store, fetcher);

        let fetched = repo.refresh(None).await.unwrap();
        assert_eq!(fetched, items);
        assert_eq!(repo.get(), items);
        assert_eq!(repo.snapshot().version(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_leaves_cache_untouched() {
        let store = test_store().await;
        store.replace_all(vec![album("a", "A")]).await.unwrap();

        let mut mock = MockRemoteFetcher::<Album>::new();
        mock.expect_fetch()
            .times(1)
            .returning(|_| Err(crate::remote::RemoteError::Network("offline".to_string())));
        let repo = Repository::new(store.clone(), Arc::new(mock));

        let result = repo.refresh(None).await;
        assert!(matches!(result, Err(LibraryError::Remote(_))));
        assert_eq!(repo.get().len(), 1);
        assert_eq!(repo.snapshot().version(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_fetch() {
        let store = test_store().await;
        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(CountingFetcher {
            items: vec![album("a", "A")],
            calls: AtomicUsize::new(0),
            gate: Some(Arc::clone(&gate)),
        });
        let repo = Repository::new(store, fetcher.clone());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move { repo.refresh(None).await }));
        }

        tokio::task::yield_now().await;
        gate.notify_one();

        for handle in handles {
            let items = handle.await.unwrap().unwrap();
            assert_eq!(items.len(), 1);
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        // Exactly one commit happened.
        assert_eq!(repo.snapshot().version(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_notifies_on_commit() {
        let store = test_store().await;
        let fetcher = Arc::new(CountingFetcher {
            items: vec![album("a", "A")],
            calls: AtomicUsize::new(0),
            gate: None,
        });
        let repo = Repository::new(store, fetcher);

        let mut changes = repo.subscribe();
        assert_eq!(*changes.borrow_and_update(), 0);

        repo.refresh(None).await.unwrap();

        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow_and_update(), 1);
    }

    #[tokio::test]
    async fn test_paged_refresh_merges_window() {
        let store = test_store().await;
        store
            .replace_all(vec![album("a", "A"), album("b", "B")])
            .await
            .unwrap();

        let fetcher = Arc::new(CountingFetcher {
            items: vec![album("b", "B2"), album("c", "C")],
            calls: AtomicUsize::new(0),
            gate: None,
        });
        let repo = Repository::new(store, fetcher);

        repo.refresh(Some(PageRequest::new(1, 2))).await.unwrap();

        let items = repo.get();
        assert_eq!(items.len(), 3);
        assert_eq!(repo.get_by_id("b").unwrap().name, "B2");
        assert_eq!(repo.get_by_id("a").unwrap().name, "A");
    }

    #[tokio::test]
    async fn test_feed_emits_cache_then_remote() {
        let store = test_store().await;
        store.replace_all(vec![album("old", "Old")]).await.unwrap();

        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(CountingFetcher {
            items: vec![album("new", "New")],
            calls: AtomicUsize::new(0),
            gate: Some(Arc::clone(&gate)),
        });
        let repo = Repository::new(store, fetcher);

        let mut feed = repo.refresh_feed(None);

        // First emission is the cached snapshot, delivered synchronously.
        let first = feed.next().await.unwrap();
        match first {
            FeedEvent::Snapshot(e) => {
                assert_eq!(e.source, EmissionSource::Cache);
                assert_eq!(e.items[0].id, "old");
            }
            FeedEvent::Failed(e) => panic!("unexpected failure: {}", e),
        }

        // notify_one stores a permit even if the fetch hasn't started yet.
        gate.notify_one();

        let second = feed.next().await.unwrap();
        match second {
            FeedEvent::Snapshot(e) => {
                assert_eq!(e.source, EmissionSource::Remote);
                assert_eq!(e.items[0].id, "new");
            }
            FeedEvent::Failed(e) => panic!("unexpected failure: {}", e),
        }

        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn test_feed_suppresses_stale_after_fresh() {
        let store = test_store().await;
        store.replace_all(vec![album("old", "Old")]).await.unwrap();

        let fetcher = Arc::new(CountingFetcher {
            items: vec![album("new", "New")],
            calls: AtomicUsize::new(0),
            gate: None,
        });
        let repo = Repository::new(store, fetcher);

        let mut feed = repo.refresh_feed(None);

        // Let the refresh land before the first emission is consumed.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let first = feed.next().await.unwrap();
        match first {
            FeedEvent::Snapshot(e) => {
                assert_eq!(e.source, EmissionSource::Remote);
                assert_eq!(e.items[0].id, "new");
            }
            FeedEvent::Failed(e) => panic!("unexpected failure: {}", e),
        }

        // The stale cache emission was overwritten, never delivered.
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn test_feed_surfaces_refresh_error_after_cache() {
        let store = test_store().await;
        store.replace_all(vec![album("a", "A")]).await.unwrap();

        let gate = Arc::new(Notify::new());

        struct FailingFetcher {
            gate: Arc<Notify>,
        }

        #[async_trait]
        impl RemoteFetcher<Album> for FailingFetcher {
            async fn fetch(&self, _page: Option<PageRequest>) -> RemoteResult<Vec<Album>> {
                self.gate.notified().await;
                Err(crate::remote::RemoteError::Network("offline".to_string()))
            }
        }

        let repo = Repository::new(
            store,
            Arc::new(FailingFetcher {
                gate: Arc::clone(&gate),
            }),
        );

        let mut feed = repo.refresh_feed(None);

        let first = feed.next().await.unwrap();
        assert!(matches!(first, FeedEvent::Snapshot(_)));

        gate.notify_one();

        let second = feed.next().await.unwrap();
        assert!(matches!(second, FeedEvent::Failed(LibraryError::Remote(_))));
    }
}

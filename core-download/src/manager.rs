//! Download orchestration.
//!
//! One transfer per asset at a time, bounded overall by a semaphore. Bytes
//! are staged into a sibling `.part` file, verified, and renamed onto the
//! destination in one atomic step; every failure path removes the staged
//! file so the destination is never partial.

use crate::error::{DownloadError, Result};
use crate::task::{staging_path, DownloadState, DownloadTask};
use bridge_traits::FileSystemAccess;
use core_library::RemoteMusicService;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use core_store::SnapshotStore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Everything needed to start one asset transfer.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Asset id; keys the persistent task record.
    pub asset_id: String,
    /// Opaque handle resolvable by the remote service.
    pub source_ref: String,
    /// Final path for the committed file.
    pub destination: PathBuf,
    /// Expected byte count, when the caller knows it.
    pub expected_size: Option<u64>,
}

/// Cancellable handle to one running transfer.
///
/// Failures surface here and in the task record; they are never thrown
/// into unrelated code.
#[derive(Debug)]
pub struct DownloadHandle {
    asset_id: String,
    token: CancellationToken,
    state_rx: watch::Receiver<DownloadState>,
}

impl DownloadHandle {
    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// Cooperatively stop the transfer; cleanup runs as for a transport
    /// error.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Last observed state.
    pub fn state(&self) -> DownloadState {
        *self.state_rx.borrow()
    }

    /// Wait for the terminal state of this transfer.
    pub async fn wait(mut self) -> DownloadState {
        loop {
            let current = *self.state_rx.borrow_and_update();
            if current.is_terminal() {
                return current;
            }
            if self.state_rx.changed().await.is_err() {
                return *self.state_rx.borrow();
            }
        }
    }
}

/// Transfers remote binary assets into local durable storage.
#[derive(Clone)]
pub struct DownloadManager {
    remote: Arc<dyn RemoteMusicService>,
    fs: Arc<dyn FileSystemAccess>,
    tasks: Arc<dyn SnapshotStore<DownloadTask>>,
    semaphore: Arc<Semaphore>,
    active: Arc<Mutex<HashMap<String, CancellationToken>>>,
    events: Option<EventBus>,
}

impl DownloadManager {
    pub fn new(
        remote: Arc<dyn RemoteMusicService>,
        fs: Arc<dyn FileSystemAccess>,
        tasks: Arc<dyn SnapshotStore<DownloadTask>>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            remote,
            fs,
            tasks,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            active: Arc::new(Mutex::new(HashMap::new())),
            events: None,
        }
    }

    /// Attach an event bus; transfer lifecycle is announced on it.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Begin a transfer for a fresh request.
    ///
    /// Rejects with [`DownloadError::AlreadyInFlight`] while a transfer for
    /// the same asset is running — two transfers never race one
    /// destination. A previous terminal record for the asset is replaced.
    #[instrument(skip(self, request), fields(asset_id = %request.asset_id))]
    pub async fn start(&self, request: DownloadRequest) -> Result<DownloadHandle> {
        staging_path(&request.destination)?;

        let task = DownloadTask::new(
            request.asset_id,
            request.source_ref,
            request.destination,
            request.expected_size,
        );
        self.launch(task).await
    }

    /// Manually retry a failed transfer from its stored record.
    ///
    /// No automatic retry or backoff happens in this layer; retrying is
    /// always an explicit caller decision.
    #[instrument(skip(self))]
    pub async fn retry(&self, asset_id: &str) -> Result<DownloadHandle> {
        let mut task = self
            .tasks
            .read_by_id(asset_id)
            .ok_or_else(|| DownloadError::TaskNotFound(asset_id.to_string()))?;

        // Only Failed → Pending is a legal retry edge.
        task.transition(DownloadState::Pending)?;
        self.launch(task).await
    }

    /// Startup pass: any task left in-flight by a crash is failed over and
    /// its staged file removed. Returns the number of tasks failed over.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> Result<u32> {
        let snapshot = self.tasks.read_all();
        let mut recovered = 0;

        for task in snapshot.items() {
            if task.state != DownloadState::InFlight {
                continue;
            }

            let mut stale = task.clone();
            if let Ok(temp) = stale.temp_path() {
                self.remove_if_present(&temp).await;
            }
            stale.mark_failed("interrupted before completion")?;
            self.tasks.upsert(stale).await?;
            recovered += 1;
        }

        if recovered > 0 {
            info!(recovered, "Failed over interrupted downloads");
        }
        Ok(recovered)
    }

    /// Fetch artwork bytes and place them atomically at `destination`.
    #[instrument(skip(self))]
    pub async fn save_image(
        &self,
        entity_id: &str,
        size: Option<u32>,
        destination: &Path,
    ) -> Result<u64> {
        let temp = staging_path(destination)?;

        let bytes = self.remote.fetch_image(entity_id, size).await?;
        if bytes.is_empty() {
            return Err(DownloadError::Integrity("empty image payload".to_string()));
        }

        if let Some(parent) = destination.parent() {
            self.fs.create_dir_all(parent).await?;
        }

        let len = bytes.len() as u64;
        self.fs.write_file(&temp, bytes).await?;
        self.commit_staged(&temp, destination).await?;

        debug!(entity_id, size_bytes = len, "Artwork committed");
        Ok(len)
    }

    /// Persistent record for one asset, if any.
    pub fn task(&self, asset_id: &str) -> Option<DownloadTask> {
        self.tasks.read_by_id(asset_id)
    }

    /// All persistent task records.
    pub fn all_tasks(&self) -> Vec<DownloadTask> {
        self.tasks.read_all().to_vec()
    }

    /// Whether a transfer for this asset is currently running.
    pub async fn is_active(&self, asset_id: &str) -> bool {
        self.active.lock().await.contains_key(asset_id)
    }

    async fn launch(&self, task: DownloadTask) -> Result<DownloadHandle> {
        let token = CancellationToken::new();
        {
            let mut active = self.active.lock().await;
            if active.contains_key(&task.asset_id) {
                return Err(DownloadError::AlreadyInFlight(task.asset_id.clone()));
            }
            active.insert(task.asset_id.clone(), token.clone());
        }

        if let Err(e) = self.tasks.upsert(task.clone()).await {
            self.active.lock().await.remove(&task.asset_id);
            return Err(e.into());
        }

        let (state_tx, state_rx) = watch::channel(task.state);
        let handle = DownloadHandle {
            asset_id: task.asset_id.clone(),
            token: token.clone(),
            state_rx,
        };

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run_transfer(task, token, state_tx).await;
        });

        Ok(handle)
    }

    async fn run_transfer(
        &self,
        mut task: DownloadTask,
        token: CancellationToken,
        state_tx: watch::Sender<DownloadState>,
    ) {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await;

        let outcome = match (permit, task.mark_in_flight()) {
            (Ok(_permit), Ok(())) => {
                if let Err(e) = self.tasks.upsert(task.clone()).await {
                    Err(e.into())
                } else {
                    state_tx.send_replace(DownloadState::InFlight);
                    self.emit(DownloadEvent::Started {
                        asset_id: task.asset_id.clone(),
                        attempt: task.attempts,
                    });
                    self.transfer_and_commit(&task, &token).await
                }
            }
            (Err(_), _) => Err(DownloadError::Transport("transfer pool closed".to_string())),
            (_, Err(e)) => Err(e),
        };

        self.active.lock().await.remove(&task.asset_id);

        match outcome {
            Ok((size, sha256)) => {
                if let Err(e) = task.mark_committed(size, sha256) {
                    error!(asset_id = %task.asset_id, error = %e, "Commit bookkeeping failed");
                }
                if let Err(e) = self.tasks.upsert(task.clone()).await {
                    error!(asset_id = %task.asset_id, error = %e, "Task record write failed");
                }
                state_tx.send_replace(DownloadState::Committed);
                info!(asset_id = %task.asset_id, size_bytes = size, "Download committed");
                self.emit(DownloadEvent::Committed {
                    asset_id: task.asset_id.clone(),
                    size_bytes: size,
                });
            }
            Err(e) => {
                let cancelled = matches!(e, DownloadError::Cancelled);
                if task.state == DownloadState::InFlight {
                    task.mark_failed(e.to_string()).ok();
                }
                if let Err(persist) = self.tasks.upsert(task.clone()).await {
                    error!(asset_id = %task.asset_id, error = %persist, "Task record write failed");
                }
                state_tx.send_replace(DownloadState::Failed);
                if cancelled {
                    info!(asset_id = %task.asset_id, "Download cancelled");
                    self.emit(DownloadEvent::Cancelled {
                        asset_id: task.asset_id.clone(),
                    });
                } else {
                    warn!(asset_id = %task.asset_id, error = %e, "Download failed");
                    self.emit(DownloadEvent::Failed {
                        asset_id: task.asset_id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    /// Stream bytes into the staging file, verify, and commit. Returns the
    /// committed size and SHA-256 digest.
    async fn transfer_and_commit(
        &self,
        task: &DownloadTask,
        token: &CancellationToken,
    ) -> Result<(u64, String)> {
        let temp = task.temp_path()?;

        if let Some(parent) = task.destination.parent() {
            self.fs.create_dir_all(parent).await?;
        }

        let mut source = tokio::select! {
            _ = token.cancelled() => return Err(DownloadError::Cancelled),
            opened = self.remote.open_byte_stream(&task.source_ref) => {
                opened.map_err(DownloadError::Remote)?
            }
        };

        let mut sink = self.fs.open_write_stream(&temp).await?;
        let mut hasher = Sha256::new();
        let mut written: u64 = 0;
        let mut buf = vec![0u8; COPY_BUF_SIZE];

        let copied: Result<()> = loop {
            tokio::select! {
                _ = token.cancelled() => break Err(DownloadError::Cancelled),
                read = source.read(&mut buf) => match read {
                    Ok(0) => break Ok(()),
                    Ok(n) => {
                        hasher.update(&buf[..n]);
                        written += n as u64;
                        if let Err(e) = sink.write_all(&buf[..n]).await {
                            break Err(DownloadError::Integrity(format!(
                                "write to staging file failed: {}",
                                e
                            )));
                        }
                    }
                    Err(e) => break Err(DownloadError::Transport(e.to_string())),
                },
            }
        };

        let flushed = sink.shutdown().await;
        drop(sink);

        if let Err(e) = copied {
            self.remove_if_present(&temp).await;
            return Err(e);
        }
        if let Err(e) = flushed {
            self.remove_if_present(&temp).await;
            return Err(DownloadError::Integrity(format!(
                "flush of staging file failed: {}",
                e
            )));
        }

        // The staged file must exist, be non-empty, and match the byte
        // count we streamed (and the expected size when known).
        let meta = match self.fs.metadata(&temp).await {
            Ok(meta) => meta,
            Err(e) => {
                self.remove_if_present(&temp).await;
                return Err(DownloadError::Integrity(format!(
                    "staged file missing: {}",
                    e
                )));
            }
        };
        if meta.size == 0 {
            self.remove_if_present(&temp).await;
            return Err(DownloadError::Integrity("staged file is empty".to_string()));
        }
        if meta.size != written {
            self.remove_if_present(&temp).await;
            return Err(DownloadError::Integrity(format!(
                "staged {} bytes but wrote {}",
                meta.size, written
            )));
        }
        if let Some(expected) = task.expected_size {
            if expected != written {
                self.remove_if_present(&temp).await;
                return Err(DownloadError::Integrity(format!(
                    "expected {} bytes, received {}",
                    expected, written
                )));
            }
        }

        self.commit_staged(&temp, &task.destination).await?;

        Ok((written, format!("{:x}", hasher.finalize())))
    }

    /// Clear any previous destination file and rename the staged file into
    /// place. On failure both the staged file and any partially-placed
    /// destination are removed.
    async fn commit_staged(&self, temp: &Path, destination: &Path) -> Result<()> {
        match self.fs.exists(destination).await {
            Ok(true) => {
                if let Err(e) = self.fs.delete_file(destination).await {
                    self.remove_if_present(temp).await;
                    return Err(DownloadError::Integrity(format!(
                        "could not clear destination: {}",
                        e
                    )));
                }
            }
            Ok(false) => {}
            Err(e) => {
                self.remove_if_present(temp).await;
                return Err(e.into());
            }
        }

        if let Err(e) = self.fs.rename(temp, destination).await {
            self.remove_if_present(temp).await;
            self.remove_if_present(destination).await;
            return Err(DownloadError::Integrity(format!(
                "rename into place failed: {}",
                e
            )));
        }

        Ok(())
    }

    async fn remove_if_present(&self, path: &Path) {
        match self.fs.exists(path).await {
            Ok(true) => {
                if let Err(e) = self.fs.delete_file(path).await {
                    warn!(path = ?path, error = %e, "Cleanup failed");
                }
            }
            Ok(false) => {}
            Err(e) => warn!(path = ?path, error = %e, "Cleanup check failed"),
        }
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.events {
            bus.emit(CoreEvent::Download(event)).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::TokioFileSystem;
    use bytes::Bytes;
    use core_library::{
        Album, Artist, ByteStream, PageRequest, RemoteError, RemoteResult, Song,
    };
    use core_store::{create_test_pool, SqliteSnapshotStore};
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Remote stub serving planned byte streams and optional artwork.
    struct StubAssets {
        streams: std::sync::Mutex<VecDeque<RemoteResult<ByteStream>>>,
        image: Option<Bytes>,
    }

    impl StubAssets {
        fn with_streams(streams: Vec<RemoteResult<ByteStream>>) -> Self {
            Self {
                streams: std::sync::Mutex::new(streams.into_iter().collect()),
                image: None,
            }
        }

        fn with_image(image: Bytes) -> Self {
            Self {
                streams: std::sync::Mutex::new(VecDeque::new()),
                image: Some(image),
            }
        }
    }

    #[async_trait]
    impl RemoteMusicService for StubAssets {
        async fn fetch_artists(&self, _page: Option<PageRequest>) -> RemoteResult<Vec<Artist>> {
            Ok(Vec::new())
        }

        async fn fetch_albums(
            &self,
            _page: Option<PageRequest>,
            _artist_filter: Option<&str>,
        ) -> RemoteResult<Vec<Album>> {
            Ok(Vec::new())
        }

        async fn fetch_songs(
            &self,
            _page: Option<PageRequest>,
            _album_filter: Option<&str>,
        ) -> RemoteResult<Vec<Song>> {
            Ok(Vec::new())
        }

        async fn set_favorite(&self, _entity_id: &str, _favorite: bool) -> RemoteResult<()> {
            Ok(())
        }

        async fn open_byte_stream(&self, asset_id: &str) -> RemoteResult<ByteStream> {
            self.streams
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RemoteError::NotFound(asset_id.to_string())))
        }

        async fn fetch_image(&self, entity_id: &str, _size: Option<u32>) -> RemoteResult<Bytes> {
            self.image
                .clone()
                .ok_or_else(|| RemoteError::NotFound(entity_id.to_string()))
        }
    }

    /// Reader that yields one chunk, then a transport error.
    struct BrokenReader {
        chunk: Option<Vec<u8>>,
    }

    impl tokio::io::AsyncRead for BrokenReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            match self.chunk.take() {
                Some(chunk) => {
                    buf.put_slice(&chunk);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "stream reset",
                ))),
            }
        }
    }

    fn cursor_stream(data: &[u8]) -> RemoteResult<ByteStream> {
        Ok(Box::new(Cursor::new(data.to_vec())))
    }

    struct Fixture {
        dir: tempfile::TempDir,
        manager: DownloadManager,
        tasks: Arc<SqliteSnapshotStore<DownloadTask>>,
        fs: Arc<TokioFileSystem>,
    }

    impl Fixture {
        fn dest(&self, name: &str) -> PathBuf {
            self.dir.path().join("music").join(name)
        }

        fn request(&self, asset_id: &str, name: &str) -> DownloadRequest {
            DownloadRequest {
                asset_id: asset_id.to_string(),
                source_ref: format!("ref-{}", asset_id),
                destination: self.dest(name),
                expected_size: None,
            }
        }
    }

    async fn fixture(remote: StubAssets) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_test_pool().await.unwrap();
        let tasks = Arc::new(SqliteSnapshotStore::new(pool));
        tasks.initialize().await.unwrap();
        let fs = Arc::new(TokioFileSystem::with_downloads_dir(
            dir.path().join("downloads"),
        ));
        let manager = DownloadManager::new(Arc::new(remote), fs.clone(), tasks.clone(), 2);
        Fixture {
            dir,
            manager,
            tasks,
            fs,
        }
    }

    #[tokio::test]
    async fn test_successful_download_commits_destination() {
        let payload = b"full audio payload";
        let fx = fixture(StubAssets::with_streams(vec![cursor_stream(payload)])).await;
        let request = fx.request("song-1", "song-1.mp3");
        let dest = request.destination.clone();

        let handle = fx.manager.start(request).await.unwrap();
        assert_eq!(handle.wait().await, DownloadState::Committed);

        assert_eq!(&fx.fs.read_file(&dest).await.unwrap()[..], payload);
        assert!(!fx.fs.exists(&staging_path(&dest).unwrap()).await.unwrap());

        let task = fx.tasks.read_by_id("song-1").unwrap();
        assert_eq!(task.state, DownloadState::Committed);
        assert_eq!(task.committed_size, Some(payload.len() as u64));
        let expected_sha = format!("{:x}", Sha256::digest(payload));
        assert_eq!(task.content_sha256.as_deref(), Some(expected_sha.as_str()));
    }

    #[tokio::test]
    async fn test_failed_stream_leaves_no_partial_files() {
        let broken: ByteStream = Box::new(BrokenReader {
            chunk: Some(b"some bytes".to_vec()),
        });
        let fx = fixture(StubAssets::with_streams(vec![Ok(broken)])).await;
        let request = fx.request("song-1", "song-1.mp3");
        let dest = request.destination.clone();

        let handle = fx.manager.start(request).await.unwrap();
        assert_eq!(handle.wait().await, DownloadState::Failed);

        assert!(!fx.fs.exists(&dest).await.unwrap());
        assert!(!fx.fs.exists(&staging_path(&dest).unwrap()).await.unwrap());

        let task = fx.tasks.read_by_id("song-1").unwrap();
        assert_eq!(task.state, DownloadState::Failed);
        assert!(task.last_error.is_some());
    }

    #[tokio::test]
    async fn test_size_mismatch_is_integrity_failure() {
        let fx = fixture(StubAssets::with_streams(vec![cursor_stream(b"short")])).await;
        let mut request = fx.request("song-1", "song-1.mp3");
        request.expected_size = Some(999);
        let dest = request.destination.clone();

        let handle = fx.manager.start(request).await.unwrap();
        assert_eq!(handle.wait().await, DownloadState::Failed);

        assert!(!fx.fs.exists(&dest).await.unwrap());
        let task = fx.tasks.read_by_id("song-1").unwrap();
        assert!(task.last_error.unwrap().contains("expected 999"));
    }

    #[tokio::test]
    async fn test_cancellation_cleans_temp_and_preserves_old_destination() {
        let (client, mut server) = tokio::io::duplex(64);
        let fx = fixture(StubAssets::with_streams(vec![Ok(Box::new(client))])).await;
        let request = fx.request("song-1", "song-1.mp3");
        let dest = request.destination.clone();

        // A valid file from an earlier download is already in place.
        fx.fs
            .write_file(&dest, Bytes::from_static(b"previous version"))
            .await
            .unwrap();

        server.write_all(b"partial").await.unwrap();
        let handle = fx.manager.start(request).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        handle.cancel();
        assert_eq!(handle.wait().await, DownloadState::Failed);

        // The pre-existing destination is untouched; staging is gone.
        assert_eq!(
            &fx.fs.read_file(&dest).await.unwrap()[..],
            b"previous version"
        );
        assert!(!fx.fs.exists(&staging_path(&dest).unwrap()).await.unwrap());
        assert!(!fx.manager.is_active("song-1").await);
    }

    #[tokio::test]
    async fn test_duplicate_start_is_rejected() {
        let (client, mut server) = tokio::io::duplex(64);
        let fx = fixture(StubAssets::with_streams(vec![Ok(Box::new(client))])).await;

        server.write_all(b"held open").await.unwrap();
        let handle = fx.manager.start(fx.request("song-1", "song-1.mp3")).await.unwrap();
        assert_eq!(handle.asset_id(), "song-1");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(handle.state(), DownloadState::InFlight);

        let second = fx.manager.start(fx.request("song-1", "song-1.mp3")).await;
        assert!(matches!(second, Err(DownloadError::AlreadyInFlight(_))));

        handle.cancel();
        let _ = handle.wait().await;
    }

    #[tokio::test]
    async fn test_retry_after_failure() {
        let payload = b"second attempt works";
        let fx = fixture(StubAssets::with_streams(vec![
            Err(RemoteError::Network("offline".to_string())),
            cursor_stream(payload),
        ]))
        .await;
        let request = fx.request("song-1", "song-1.mp3");
        let dest = request.destination.clone();

        let handle = fx.manager.start(request).await.unwrap();
        assert_eq!(handle.wait().await, DownloadState::Failed);

        let handle = fx.manager.retry("song-1").await.unwrap();
        assert_eq!(handle.wait().await, DownloadState::Committed);

        assert_eq!(&fx.fs.read_file(&dest).await.unwrap()[..], payload);
        let task = fx.tasks.read_by_id("song-1").unwrap();
        assert_eq!(task.attempts, 2);
    }

    #[tokio::test]
    async fn test_retry_requires_failed_state() {
        let fx = fixture(StubAssets::with_streams(vec![cursor_stream(b"data")])).await;
        let request = fx.request("song-1", "song-1.mp3");

        let handle = fx.manager.start(request).await.unwrap();
        assert_eq!(handle.wait().await, DownloadState::Committed);

        let result = fx.manager.retry("song-1").await;
        assert!(matches!(
            result,
            Err(DownloadError::InvalidStateTransition { .. })
        ));

        let missing = fx.manager.retry("unknown").await;
        assert!(matches!(missing, Err(DownloadError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_recover_fails_over_inflight_tasks() {
        let fx = fixture(StubAssets::with_streams(Vec::new())).await;
        let dest = fx.dest("song-1.mp3");

        // Simulate a crash: a record stuck in-flight plus its staged file.
        let mut stale = DownloadTask::new("song-1", "ref-1", dest.clone(), None);
        stale.mark_in_flight().unwrap();
        fx.tasks.upsert(stale).await.unwrap();
        let temp = staging_path(&dest).unwrap();
        fx.fs
            .write_file(&temp, Bytes::from_static(b"half written"))
            .await
            .unwrap();

        let recovered = fx.manager.recover().await.unwrap();
        assert_eq!(recovered, 1);

        let all = fx.manager.all_tasks();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].state, DownloadState::Failed);
        assert!(!fx.fs.exists(&temp).await.unwrap());
        assert!(!fx.fs.exists(&dest).await.unwrap());
    }

    #[tokio::test]
    async fn test_download_replaces_existing_destination() {
        let payload = b"new bytes";
        let fx = fixture(StubAssets::with_streams(vec![cursor_stream(payload)])).await;
        let request = fx.request("song-1", "song-1.mp3");
        let dest = request.destination.clone();

        fx.fs
            .write_file(&dest, Bytes::from_static(b"old bytes"))
            .await
            .unwrap();

        let handle = fx.manager.start(request).await.unwrap();
        assert_eq!(handle.wait().await, DownloadState::Committed);
        assert_eq!(&fx.fs.read_file(&dest).await.unwrap()[..], payload);
    }

    #[tokio::test]
    async fn test_save_image_commits_atomically() {
        let fx = fixture(StubAssets::with_image(Bytes::from_static(b"png bytes"))).await;
        let dest = fx.dest("cover.png");

        let len = fx.manager.save_image("album-1", Some(300), &dest).await.unwrap();

        assert_eq!(len, 9);
        assert_eq!(&fx.fs.read_file(&dest).await.unwrap()[..], b"png bytes");
        assert!(!fx.fs.exists(&staging_path(&dest).unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_image_rejects_empty_payload() {
        let fx = fixture(StubAssets::with_image(Bytes::new())).await;
        let dest = fx.dest("cover.png");

        let result = fx.manager.save_image("album-1", None, &dest).await;

        assert!(matches!(result, Err(DownloadError::Integrity(_))));
        assert!(!fx.fs.exists(&dest).await.unwrap());
    }
}

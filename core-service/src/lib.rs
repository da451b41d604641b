//! Core service façade and composition root.
//!
//! Wires the host-provided collaborators (remote music service, filesystem)
//! together with the persistent stores, repositories, favorite coordinators
//! and the download manager. There are no process-wide singletons: hosts
//! construct one [`MusicService`] and hand references to consumers, which
//! keeps the stores on a single writer path per entity type.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::FileSystemAccess;
use core_download::{DownloadHandle, DownloadManager, DownloadRequest};
use core_library::{
    Album, Artist, FavoriteCoordinator, PageRequest, RemoteFetcher, RemoteMusicService,
    RemoteResult, Repository, Song,
};
use core_runtime::{CoreConfig, EventBus};
use core_store::{create_pool, CacheEntity, DatabaseConfig, SnapshotStore, SqliteSnapshotStore};
use tracing::info;

// ============================================================================
// Remote fetch adapters
// ============================================================================

struct ArtistFetcher {
    remote: Arc<dyn RemoteMusicService>,
}

#[async_trait]
impl RemoteFetcher<Artist> for ArtistFetcher {
    async fn fetch(&self, page: Option<PageRequest>) -> RemoteResult<Vec<Artist>> {
        self.remote.fetch_artists(page).await
    }
}

struct AlbumFetcher {
    remote: Arc<dyn RemoteMusicService>,
}

#[async_trait]
impl RemoteFetcher<Album> for AlbumFetcher {
    async fn fetch(&self, page: Option<PageRequest>) -> RemoteResult<Vec<Album>> {
        self.remote.fetch_albums(page, None).await
    }
}

struct SongFetcher {
    remote: Arc<dyn RemoteMusicService>,
}

#[async_trait]
impl RemoteFetcher<Song> for SongFetcher {
    async fn fetch(&self, page: Option<PageRequest>) -> RemoteResult<Vec<Song>> {
        self.remote.fetch_songs(page, None).await
    }
}

// ============================================================================
// Service
// ============================================================================

/// Primary façade exposed to host applications.
pub struct MusicService {
    config: CoreConfig,
    events: EventBus,
    artists: Repository<Artist>,
    albums: Repository<Album>,
    songs: Repository<Song>,
    artist_favorites: FavoriteCoordinator<Artist>,
    album_favorites: FavoriteCoordinator<Album>,
    song_favorites: FavoriteCoordinator<Song>,
    downloads: DownloadManager,
}

impl MusicService {
    /// Build and bootstrap the whole core.
    ///
    /// Opens the library database, loads the committed snapshots, fails
    /// over downloads interrupted by a previous shutdown, and wires every
    /// component onto one event bus.
    pub async fn new(
        config: CoreConfig,
        remote: Arc<dyn RemoteMusicService>,
        fs: Arc<dyn FileSystemAccess>,
    ) -> Result<Self> {
        let pool = create_pool(DatabaseConfig::new(&config.database_path))
            .await
            .map_err(|e| CoreError::InitializationFailed(format!("library database: {}", e)))?;
        let events = EventBus::new(config.event_capacity);

        let artist_store = init_store::<Artist>(&pool).await?;
        let album_store = init_store::<Album>(&pool).await?;
        let song_store = init_store::<Song>(&pool).await?;
        let download_store = init_store::<core_download::DownloadTask>(&pool).await?;

        fs.create_dir_all(&config.downloads_dir).await?;

        let artists = Repository::new(
            artist_store.clone(),
            Arc::new(ArtistFetcher {
                remote: Arc::clone(&remote),
            }),
        )
        .with_event_bus(events.clone());

        let albums = Repository::new(
            album_store.clone(),
            Arc::new(AlbumFetcher {
                remote: Arc::clone(&remote),
            }),
        )
        .with_event_bus(events.clone());

        let songs = Repository::new(
            song_store.clone(),
            Arc::new(SongFetcher {
                remote: Arc::clone(&remote),
            }),
        )
        .with_event_bus(events.clone());

        let artist_favorites =
            FavoriteCoordinator::new(artist_store, Arc::clone(&remote)).with_event_bus(events.clone());
        let album_favorites =
            FavoriteCoordinator::new(album_store, Arc::clone(&remote)).with_event_bus(events.clone());
        let song_favorites =
            FavoriteCoordinator::new(song_store, Arc::clone(&remote)).with_event_bus(events.clone());

        let downloads = DownloadManager::new(
            Arc::clone(&remote),
            fs,
            download_store,
            config.max_concurrent_downloads,
        )
        .with_event_bus(events.clone());

        let recovered = downloads.recover().await?;
        info!(recovered, "Music service bootstrapped");

        Ok(Self {
            config,
            events,
            artists,
            albums,
            songs,
            artist_favorites,
            album_favorites,
            song_favorites,
            downloads,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The shared event bus; subscribe for cache, favorite and download
    /// notifications.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn artists(&self) -> &Repository<Artist> {
        &self.artists
    }

    pub fn albums(&self) -> &Repository<Album> {
        &self.albums
    }

    pub fn songs(&self) -> &Repository<Song> {
        &self.songs
    }

    pub fn artist_favorites(&self) -> &FavoriteCoordinator<Artist> {
        &self.artist_favorites
    }

    pub fn album_favorites(&self) -> &FavoriteCoordinator<Album> {
        &self.album_favorites
    }

    pub fn song_favorites(&self) -> &FavoriteCoordinator<Song> {
        &self.song_favorites
    }

    pub fn downloads(&self) -> &DownloadManager {
        &self.downloads
    }

    /// Paging window for one page of the configured size.
    pub fn page(&self, page: u32) -> PageRequest {
        PageRequest::new(page, self.config.page_size)
    }

    /// Download a cached song's audio file into the downloads directory.
    pub async fn download_song(&self, song_id: &str) -> Result<DownloadHandle> {
        let song = self.songs.get_by_id(song_id)?;

        let destination = self
            .config
            .downloads_dir
            .join(format!("{}.{}", song.id, song.file_ext));

        let request = DownloadRequest {
            asset_id: song.id.clone(),
            source_ref: song.id,
            destination,
            expected_size: (song.size_bytes > 0).then_some(song.size_bytes),
        };

        Ok(self.downloads.start(request).await?)
    }
}

async fn init_store<T: CacheEntity>(
    pool: &sqlx::Pool<sqlx::Sqlite>,
) -> Result<Arc<dyn SnapshotStore<T>>> {
    let store = SqliteSnapshotStore::<T>::new(pool.clone());
    store.initialize().await?;
    Ok(Arc::new(store))
}

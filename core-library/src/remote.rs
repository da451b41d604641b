//! Remote library server seam.
//!
//! The transport (HTTP construction, authentication, wire schema) lives
//! outside the core; this trait is the whole contract the synchronization
//! layer depends on.

use crate::models::{Album, Artist, Song};
use crate::pagination::PageRequest;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Streaming byte source for a remote binary asset.
pub type ByteStream = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

/// Errors produced by the remote collaborator.
///
/// `Clone` so a single outcome can be fanned out to every joiner of a
/// deduplicated fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Transient transport failure; the caller may retry.
    #[error("Network failure: {0}")]
    Network(String),

    /// Credentials rejected by the server.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The server answered with something the client cannot interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Entity or asset absent remotely.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A concurrent remote mutation invalidated this request.
    #[error("Conflict: {0}")]
    Conflict(String),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Remote media-library server contract consumed by the core.
///
/// `page: None` requests the entire collection.
#[async_trait]
pub trait RemoteMusicService: Send + Sync {
    /// Fetch artists, optionally windowed.
    async fn fetch_artists(&self, page: Option<PageRequest>) -> RemoteResult<Vec<Artist>>;

    /// Fetch albums, optionally windowed and filtered by artist id.
    async fn fetch_albums(
        &self,
        page: Option<PageRequest>,
        artist_filter: Option<&str>,
    ) -> RemoteResult<Vec<Album>>;

    /// Fetch songs, optionally windowed and filtered by album id.
    async fn fetch_songs(
        &self,
        page: Option<PageRequest>,
        album_filter: Option<&str>,
    ) -> RemoteResult<Vec<Song>>;

    /// Persist a favorite flag remotely.
    async fn set_favorite(&self, entity_id: &str, favorite: bool) -> RemoteResult<()>;

    /// Open a byte stream for an audio asset.
    async fn open_byte_stream(&self, asset_id: &str) -> RemoteResult<ByteStream>;

    /// Fetch artwork bytes for an entity, optionally at a bounded size.
    async fn fetch_image(&self, entity_id: &str, size: Option<u32>) -> RemoteResult<Bytes>;
}

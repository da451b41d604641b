//! # Library Synchronization Module
//!
//! Local-first access to the music library: cached reads served instantly,
//! background refreshes against the remote source of truth, and
//! write-through favoriting.
//!
//! ## Components
//!
//! - **Models** (`models`): artists, albums, songs
//! - **Remote seam** (`remote`): the `RemoteMusicService` collaborator trait
//! - **Repository** (`repository`): cache-then-network reads with
//!   single-flight refresh deduplication
//! - **Favorite Coordinator** (`favorites`): per-id serialized write-through
//!   mutations

pub mod error;
pub mod favorites;
pub mod models;
pub mod pagination;
pub mod remote;
pub mod repository;
pub mod single_flight;

pub use error::{LibraryError, Result};
pub use favorites::FavoriteCoordinator;
pub use models::{Album, Artist, Favoritable, Song};
pub use pagination::PageRequest;
pub use remote::{ByteStream, RemoteError, RemoteMusicService, RemoteResult};
pub use repository::{
    Emission, EmissionSource, FeedEvent, FetchKey, RemoteFetcher, Repository, SnapshotFeed,
};

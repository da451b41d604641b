//! Domain models for the music library
//!
//! Entities mirror what the remote library server exposes. Ids are opaque,
//! remote-assigned strings; references (`artist_id`, `album_id`) may dangle
//! after a partial refresh, in which case display falls back to the
//! denormalized name fields.

use core_store::CacheEntity;
use serde::{Deserialize, Serialize};

/// An entity carrying a user favorite flag.
pub trait Favoritable {
    fn is_favorite(&self) -> bool;
    fn set_favorite(&mut self, favorite: bool);
}

/// Derive the collation key used for alphabetical ordering.
///
/// Lowercased with a leading "the " stripped, matching how the remote
/// server sorts its own listings.
pub fn sort_key_for(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    lowered
        .strip_prefix("the ")
        .map(str::to_string)
        .unwrap_or(lowered)
}

// =============================================================================
// Artist
// =============================================================================

/// Music artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    /// Unique identifier (opaque, remote-assigned)
    pub id: String,
    /// Display name
    pub name: String,
    /// Collation key
    pub sort_key: String,
    /// User favorite flag
    pub is_favorite: bool,
}

impl Artist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let sort_key = sort_key_for(&name);
        Self {
            id: id.into(),
            name,
            sort_key,
            is_favorite: false,
        }
    }
}

impl CacheEntity for Artist {
    const KIND: &'static str = "artists";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Favoritable for Artist {
    fn is_favorite(&self) -> bool {
        self.is_favorite
    }

    fn set_favorite(&mut self, favorite: bool) {
        self.is_favorite = favorite;
    }
}

// =============================================================================
// Album
// =============================================================================

/// Album with a reference (not ownership) to its artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    /// Unique identifier
    pub id: String,
    /// Album title
    pub name: String,
    /// Collation key
    pub sort_key: String,
    /// Referenced artist id; may dangle across refreshes
    pub artist_id: String,
    /// Denormalized artist name for display when the reference dangles
    pub artist_name: String,
    /// User favorite flag
    pub is_favorite: bool,
    /// When the album was added remotely (unix seconds)
    pub created_at: i64,
}

impl Album {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        artist_id: impl Into<String>,
        artist_name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let sort_key = sort_key_for(&name);
        Self {
            id: id.into(),
            name,
            sort_key,
            artist_id: artist_id.into(),
            artist_name: artist_name.into(),
            is_favorite: false,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

impl CacheEntity for Album {
    const KIND: &'static str = "albums";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Favoritable for Album {
    fn is_favorite(&self) -> bool {
        self.is_favorite
    }

    fn set_favorite(&mut self, favorite: bool) {
        self.is_favorite = favorite;
    }
}

// =============================================================================
// Song
// =============================================================================

/// Song within an album
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// Unique identifier; doubles as the audio asset id
    pub id: String,
    /// Track title
    pub name: String,
    /// Collation key
    pub sort_key: String,
    /// Referenced album id; may dangle across refreshes
    pub album_id: String,
    /// Position within the disc
    pub track_number: u32,
    /// Disc number for multi-disc albums
    pub disc_number: u32,
    /// Runtime in seconds
    pub runtime_secs: u32,
    /// Audio file extension (mp3, flac, ...)
    pub file_ext: String,
    /// Audio file size in bytes
    pub size_bytes: u64,
    /// User favorite flag
    pub is_favorite: bool,
}

impl Song {
    pub fn new(id: impl Into<String>, name: impl Into<String>, album_id: impl Into<String>) -> Self {
        let name = name.into();
        let sort_key = sort_key_for(&name);
        Self {
            id: id.into(),
            name,
            sort_key,
            album_id: album_id.into(),
            track_number: 1,
            disc_number: 1,
            runtime_secs: 0,
            file_ext: "mp3".to_string(),
            size_bytes: 0,
            is_favorite: false,
        }
    }
}

impl CacheEntity for Song {
    const KIND: &'static str = "songs";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Favoritable for Song {
    fn is_favorite(&self) -> bool {
        self.is_favorite
    }

    fn set_favorite(&mut self, favorite: bool) {
        self.is_favorite = favorite;
    }
}

//! # Event Bus System
//!
//! Event-driven notifications over `tokio::sync::broadcast`. The UI layer
//! subscribes here; core components emit whenever durable state changes.
//!
//! Subscribers that fall behind receive `RecvError::Lagged` and continue
//! with newer events; `RecvError::Closed` signals shutdown.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
//!
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Library(LibraryEvent::SnapshotReplaced {
//!     entity_kind: "albums".to_string(),
//!     item_count: 12,
//!     version: 3,
//! }))
//! .ok();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Library cache changes
    Library(LibraryEvent),
    /// Favorite mutations
    Favorite(FavoriteEvent),
    /// Binary download lifecycle
    Download(DownloadEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Favorite(e) => e.description(),
            CoreEvent::Download(e) => e.description(),
        }
    }
}

/// Events emitted when cached library state changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// A full snapshot of one entity type was committed.
    SnapshotReplaced {
        /// Which entity collection changed ("artists", "albums", "songs").
        entity_kind: String,
        /// Number of items in the new snapshot.
        item_count: usize,
        /// Snapshot version after the commit.
        version: u64,
    },
    /// A paged refresh merged one window into the snapshot.
    PageMerged {
        entity_kind: String,
        item_count: usize,
        version: u64,
    },
    /// A refresh against the remote failed; the cache is unchanged.
    RefreshFailed {
        entity_kind: String,
        message: String,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::SnapshotReplaced { .. } => "Library snapshot replaced",
            LibraryEvent::PageMerged { .. } => "Library page merged",
            LibraryEvent::RefreshFailed { .. } => "Library refresh failed",
        }
    }
}

/// Events emitted by the favorite coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum FavoriteEvent {
    /// A favorite flag was committed remotely and locally.
    Changed {
        entity_kind: String,
        entity_id: String,
        favorite: bool,
    },
}

impl FavoriteEvent {
    fn description(&self) -> &str {
        match self {
            FavoriteEvent::Changed { .. } => "Favorite changed",
        }
    }
}

/// Events emitted by the download manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    /// A transfer entered the in-flight state.
    Started { asset_id: String, attempt: u32 },
    /// A transfer committed its destination file.
    Committed { asset_id: String, size_bytes: u64 },
    /// A transfer failed; temp files are cleaned up.
    Failed { asset_id: String, message: String },
    /// A transfer was cancelled by its handle.
    Cancelled { asset_id: String },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::Started { .. } => "Download started",
            DownloadEvent::Committed { .. } => "Download committed",
            DownloadEvent::Failed { .. } => "Download failed",
            DownloadEvent::Cancelled { .. } => "Download cancelled",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally: multiple producers (clone the
/// bus), multiple independent consumers (each `subscribe()` creates a new
/// receiver), non-blocking sends, lagging detection.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber receiving all future events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

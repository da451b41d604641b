//! # Binary Asset Downloads
//!
//! Transfers remote binary assets (audio files, artwork) into local durable
//! storage with atomic commit and crash-safe cleanup.
//!
//! ## State Machine
//!
//! ```text
//! Pending → InFlight → Committed
//!               ↓
//!             Failed → Pending  (explicit retry only)
//! ```
//!
//! A destination file is either fully absent or a byte-exact, fully-written
//! copy of the source — never partial. Bytes are staged into a temp file
//! next to the destination and renamed into place only after verification.

pub mod error;
pub mod manager;
pub mod task;

pub use error::{DownloadError, Result};
pub use manager::{DownloadHandle, DownloadManager, DownloadRequest};
pub use task::{DownloadState, DownloadTask};

//! Host-provided seams for the Resona core.
//!
//! The core never touches the platform directly: binary data lands on disk
//! through the [`storage::FileSystemAccess`] trait, implemented per host
//! (desktop, mobile, tests). Keeping the trait in its own leaf crate lets
//! every core crate share the seam without dependency cycles.

pub mod error;
pub mod storage;

pub use error::{BridgeError, Result};
pub use storage::{FileMetadata, FileSystemAccess};

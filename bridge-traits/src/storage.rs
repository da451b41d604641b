//! File System Abstraction
//!
//! Platform-agnostic trait for the file I/O the download path needs:
//! staging temp files, atomic rename-into-place, and cleanup.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts file I/O operations to support different hosts:
/// - Desktop: direct filesystem access
/// - Mobile: sandboxed app directories
/// - Tests: temporary directories
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn stage(fs: &dyn FileSystemAccess, data: bytes::Bytes) -> Result<()> {
///     let dir = fs.downloads_directory().await?;
///     fs.write_file(&dir.join("asset.part"), data).await?;
///     fs.rename(&dir.join("asset.part"), &dir.join("asset.mp3")).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the directory where committed downloads live.
    async fn downloads_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating it if it doesn't exist
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Atomically move a file to a new path on the same volume.
    ///
    /// The destination becomes visible in a single rename operation; it is
    /// never observable in a partially-written state.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Open a file for streaming writes
    ///
    /// The returned writer must be shut down to guarantee the bytes are
    /// flushed before a subsequent `rename`.
    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn tokio::io::AsyncWrite + Send + Unpin>>;
}

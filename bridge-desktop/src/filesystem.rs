//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Tokio-based file system implementation
///
/// Provides async file I/O over `tokio::fs` rooted at a downloads directory
/// derived from the platform data dir (overridable for tests).
pub struct TokioFileSystem {
    downloads_dir: PathBuf,
}

impl TokioFileSystem {
    /// Create a new file system accessor with the default downloads directory
    pub fn new() -> Self {
        let downloads_dir = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("resona")
            .join("downloads");

        Self { downloads_dir }
    }

    /// Create a new file system accessor rooted at a custom directory
    pub fn with_downloads_dir(downloads_dir: PathBuf) -> Self {
        Self { downloads_dir }
    }

    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn downloads_directory(&self) -> Result<PathBuf> {
        if !self.downloads_dir.exists() {
            fs::create_dir_all(&self.downloads_dir)
                .await
                .map_err(Self::map_io_error)?;
            debug!(path = ?self.downloads_dir, "Created downloads directory");
        }
        Ok(self.downloads_dir.clone())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(path).await.map_err(Self::map_io_error)?)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path).await.map_err(Self::map_io_error)?;

        Ok(FileMetadata {
            size: metadata.len(),
            modified_at: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64),
            is_directory: metadata.is_dir(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await.map_err(Self::map_io_error)
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).await.map_err(Self::map_io_error)?;
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(Self::map_io_error)?;
        }
        let mut file = fs::File::create(path).await.map_err(Self::map_io_error)?;
        file.write_all(&data).await.map_err(Self::map_io_error)?;
        file.flush().await.map_err(Self::map_io_error)?;
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await.map_err(Self::map_io_error)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).await.map_err(Self::map_io_error)?;
        debug!(from = ?from, to = ?to, "Renamed file");
        Ok(())
    }

    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn tokio::io::AsyncWrite + Send + Unpin>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(Self::map_io_error)?;
        }
        let file = fs::File::create(path).await.map_err(Self::map_io_error)?;
        Ok(Box::new(file))
    }
}

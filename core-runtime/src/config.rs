//! # Core Configuration Module
//!
//! Builder-constructed configuration for the Resona core. The builder
//! enforces fail-fast validation so a composition root can't come up with a
//! half-usable configuration.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/tmp/resona/library.db")
//!     .downloads_dir("/tmp/resona/downloads")
//!     .page_size(100)
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.page_size, 100);
//! ```

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Default page size for remote fetches.
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Default cap on concurrent binary downloads.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 3;

/// Default event bus buffer capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Configuration for the Resona core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Path to the SQLite library database.
    pub database_path: PathBuf,
    /// Directory where committed downloads are placed.
    pub downloads_dir: PathBuf,
    /// Page size used for paged remote fetches.
    pub page_size: u32,
    /// Maximum number of simultaneous binary transfers.
    pub max_concurrent_downloads: usize,
    /// Buffer capacity of the core event bus.
    pub event_capacity: usize,
}

impl CoreConfig {
    /// Start building a configuration.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    downloads_dir: Option<PathBuf>,
    page_size: Option<u32>,
    max_concurrent_downloads: Option<usize>,
    event_capacity: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn downloads_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.downloads_dir = Some(path.into());
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent_downloads = Some(max);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required field is missing or a
    /// numeric field is zero.
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self
            .database_path
            .ok_or_else(|| Error::Config("database_path is required".to_string()))?;

        let downloads_dir = self
            .downloads_dir
            .ok_or_else(|| Error::Config("downloads_dir is required".to_string()))?;

        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(Error::Config("page_size must be positive".to_string()));
        }

        let max_concurrent_downloads = self
            .max_concurrent_downloads
            .unwrap_or(DEFAULT_MAX_CONCURRENT_DOWNLOADS);
        if max_concurrent_downloads == 0 {
            return Err(Error::Config(
                "max_concurrent_downloads must be positive".to_string(),
            ));
        }

        let event_capacity = self.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY);
        if event_capacity == 0 {
            return Err(Error::Config("event_capacity must be positive".to_string()));
        }

        Ok(CoreConfig {
            database_path,
            downloads_dir,
            page_size,
            max_concurrent_downloads,
            event_capacity,
        })
    }
}

//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the Resona core:
//! - Logging and tracing bootstrap
//! - Configuration management
//! - Event bus system
//!
//! This crate contains the runtime utilities the other core crates depend
//! on. It establishes the logging conventions and event broadcasting
//! mechanisms used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::CoreConfig;
pub use error::{Error, Result};
pub use events::{CoreEvent, DownloadEvent, EventBus, FavoriteEvent, LibraryEvent};

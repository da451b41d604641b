//! Workspace facade crate.
//!
//! Host applications can depend on `resona-workspace` and reach the whole
//! core through [`core_service`] without wiring each workspace crate
//! individually.

pub use core_service;

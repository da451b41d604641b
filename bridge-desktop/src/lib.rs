//! Desktop implementations of the `bridge-traits` seams.

pub mod filesystem;

pub use filesystem::TokioFileSystem;

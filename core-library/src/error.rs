use crate::remote::RemoteError;
use core_store::StoreError;
use thiserror::Error;

/// Errors surfaced by repositories and coordinators.
///
/// `Clone` so that every joiner of a single-flight refresh can receive the
/// same outcome; store failures are carried as display strings for the same
/// reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Entity not found: {kind} with id {id}")]
    NotFound { kind: &'static str, id: String },
}

impl From<StoreError> for LibraryError {
    fn from(e: StoreError) -> Self {
        Self::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;

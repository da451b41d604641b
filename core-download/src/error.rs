use bridge_traits::BridgeError;
use core_library::RemoteError;
use core_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Filesystem error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Transfer stream error: {0}")]
    Transport(String),

    #[error("Integrity failure: {0}")]
    Integrity(String),

    #[error("Download cancelled")]
    Cancelled,

    #[error("Download already in flight for asset {0}")]
    AlreadyInFlight(String),

    #[error("No download task for asset {0}")]
    TaskNotFound(String),

    #[error("Invalid destination path: {0}")]
    InvalidDestination(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl From<StoreError> for DownloadError {
    fn from(e: StoreError) -> Self {
        Self::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

//! Download task records with validated state transitions.
//!
//! Tasks persist in a snapshot store keyed by asset id so that transfers
//! interrupted by a crash can be detected and cleaned up on the next start.

use crate::error::{DownloadError, Result};
use core_store::CacheEntity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The current state of a download task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    /// Recorded but not yet transferring
    Pending,
    /// Bytes are moving into the temp file
    InFlight,
    /// Destination file committed
    Committed,
    /// Transfer or commit failed; temp files cleaned up
    Failed,
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadState::Committed | DownloadState::Failed)
    }

    fn can_transition_to(&self, next: DownloadState) -> bool {
        matches!(
            (self, next),
            (DownloadState::Pending, DownloadState::InFlight)
                | (DownloadState::InFlight, DownloadState::Committed)
                | (DownloadState::InFlight, DownloadState::Failed)
                | (DownloadState::Failed, DownloadState::Pending)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadState::Pending => "pending",
            DownloadState::InFlight => "in_flight",
            DownloadState::Committed => "committed",
            DownloadState::Failed => "failed",
        }
    }
}

/// Derive the staging path for a destination: a dot-prefixed `.part` file
/// in the same directory, so the final rename never crosses volumes.
pub fn staging_path(destination: &Path) -> Result<PathBuf> {
    let name = destination
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DownloadError::InvalidDestination(destination.display().to_string()))?;

    Ok(destination.with_file_name(format!(".{}.part", name)))
}

/// Persistent record of one asset transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Asset id; also the record key
    pub asset_id: String,
    /// Opaque handle resolvable by the remote service
    pub source_ref: String,
    /// Final path of the committed file
    pub destination: PathBuf,
    /// Lifecycle state
    pub state: DownloadState,
    /// How many transfers have been started for this record
    pub attempts: u32,
    /// Size the caller expects, when known (used for verification)
    pub expected_size: Option<u64>,
    /// Byte count of the committed file
    pub committed_size: Option<u64>,
    /// SHA-256 digest of the committed file
    pub content_sha256: Option<String>,
    /// Message of the most recent failure
    pub last_error: Option<String>,
    /// Unix seconds of the last record change
    pub updated_at: i64,
}

impl DownloadTask {
    pub fn new(
        asset_id: impl Into<String>,
        source_ref: impl Into<String>,
        destination: PathBuf,
        expected_size: Option<u64>,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            source_ref: source_ref.into(),
            destination,
            state: DownloadState::Pending,
            attempts: 0,
            expected_size,
            committed_size: None,
            content_sha256: None,
            last_error: None,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Staging path next to the destination.
    pub fn temp_path(&self) -> Result<PathBuf> {
        staging_path(&self.destination)
    }

    /// Validated state transition.
    pub fn transition(&mut self, next: DownloadState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(DownloadError::InvalidStateTransition {
                from: self.state.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.state = next;
        self.updated_at = chrono::Utc::now().timestamp();
        Ok(())
    }

    /// Begin a transfer attempt.
    pub fn mark_in_flight(&mut self) -> Result<()> {
        self.transition(DownloadState::InFlight)?;
        self.attempts += 1;
        Ok(())
    }

    /// Record a committed destination file.
    pub fn mark_committed(&mut self, size: u64, sha256: String) -> Result<()> {
        self.transition(DownloadState::Committed)?;
        self.committed_size = Some(size);
        self.content_sha256 = Some(sha256);
        self.last_error = None;
        Ok(())
    }

    /// Record a failed transfer.
    pub fn mark_failed(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(DownloadState::Failed)?;
        self.last_error = Some(message.into());
        Ok(())
    }
}

impl CacheEntity for DownloadTask {
    const KIND: &'static str = "downloads";

    fn id(&self) -> &str {
        &self.asset_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> DownloadTask {
        DownloadTask::new("song-1", "ref-1", PathBuf::from("/music/song-1.mp3"), None)
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut t = task();
        assert_eq!(t.state, DownloadState::Pending);

        t.mark_in_flight().unwrap();
        assert_eq!(t.state, DownloadState::InFlight);
        assert_eq!(t.attempts, 1);

        t.mark_committed(42, "abc".to_string()).unwrap();
        assert_eq!(t.state, DownloadState::Committed);
        assert_eq!(t.committed_size, Some(42));
        assert!(t.state.is_terminal());
    }

    #[test]
    fn test_failure_and_manual_retry() {
        let mut t = task();
        t.mark_in_flight().unwrap();
        t.mark_failed("connection reset").unwrap();
        assert_eq!(t.state, DownloadState::Failed);
        assert_eq!(t.last_error.as_deref(), Some("connection reset"));

        // Failed → Pending is the explicit retry edge.
        t.transition(DownloadState::Pending).unwrap();
        t.mark_in_flight().unwrap();
        assert_eq!(t.attempts, 2);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut t = task();
        assert!(matches!(
            t.transition(DownloadState::Committed),
            Err(DownloadError::InvalidStateTransition { .. })
        ));

        t.mark_in_flight().unwrap();
        t.mark_committed(1, "h".to_string()).unwrap();
        // Committed is terminal; not even retry leaves it.
        assert!(t.transition(DownloadState::Pending).is_err());
        assert!(t.transition(DownloadState::InFlight).is_err());
    }

    #[test]
    fn test_staging_path_is_sibling_dotfile() {
        let temp = staging_path(Path::new("/music/album/track.mp3")).unwrap();
        assert_eq!(temp, PathBuf::from("/music/album/.track.mp3.part"));
    }

    #[test]
    fn test_staging_path_requires_file_name() {
        assert!(staging_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut t = task();
        t.mark_in_flight().unwrap();

        let json = serde_json::to_string(&t).unwrap();
        let back: DownloadTask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}

//! Checkpoint Store Adapters
//!
//! In-memory and session-file implementations of the `CheckpointStore` port.

use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::{ScanCheckpoint, TroveError};
use crate::ports::CheckpointStore;

/// Default slot name.
pub const DEFAULT_SESSION_KEY: &str = "redemptionResults";

/// Checkpoint slot held in process memory.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    slot: Mutex<Option<ScanCheckpoint>>,
}

impl InMemoryCheckpointStore {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load(&self) -> Result<Option<ScanCheckpoint>, TroveError> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, checkpoint: &ScanCheckpoint) -> Result<(), TroveError> {
        *self.slot.lock() = Some(checkpoint.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TroveError> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// Checkpoint slot stored as `{dir}/{session_key}.json`.
///
/// Writes go to a temporary sibling and are renamed into place, so a crash
/// mid-write leaves the previous checkpoint intact.
pub struct SessionFileCheckpointStore {
    path: PathBuf,
}

impl SessionFileCheckpointStore {
    /// Slot `session_key` under `dir`. The directory is created on first save.
    pub fn new(dir: impl AsRef<Path>, session_key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{session_key}.json")),
        }
    }

    /// File backing the slot.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, action: &str, e: std::io::Error) -> TroveError {
        TroveError::Checkpoint(format!("{action} {}: {e}", self.path.display()))
    }
}

impl CheckpointStore for SessionFileCheckpointStore {
    fn load(&self) -> Result<Option<ScanCheckpoint>, TroveError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error("read", e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| TroveError::Checkpoint(format!("corrupt {}: {e}", self.path.display())))
    }

    fn save(&self, checkpoint: &ScanCheckpoint) -> Result<(), TroveError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.io_error("create dir for", e))?;
        }
        let bytes = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| TroveError::Checkpoint(format!("encode: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| self.io_error("write", e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error("rename into", e))?;
        debug!(
            "[trove] Checkpoint saved: {} records, last index {:?}",
            checkpoint.redemptions.len(),
            checkpoint.last_processed_index()
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), TroveError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error("remove", e)),
        }
    }
}

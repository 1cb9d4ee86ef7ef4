//! Durable local storage for generation state.

use super::{GenerationState, JobKind};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One JSON record on disk per job kind.
pub struct TrackerStore {
    path: PathBuf,
}

impl TrackerStore {
    /// Open the store for a job kind under the given data directory,
    /// creating the directory if needed.
    pub fn open(kind: JobKind, data_dir: &Path) -> Result<Self, TrackerStoreError> {
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join(format!("{}.json", kind.storage_key())),
        })
    }

    /// Open the store at an explicit path. Tests use this with a temp dir.
    #[must_use]
    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted record, if any.
    pub fn load(&self) -> Result<Option<GenerationState>, TrackerStoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Overwrite the persisted record.
    pub fn save(&self, state: &GenerationState) -> Result<(), TrackerStoreError> {
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Remove the persisted record.
    pub fn clear(&self) -> Result<(), TrackerStoreError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

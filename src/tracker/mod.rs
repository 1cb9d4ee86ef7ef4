//! Persisted tracking for long-running generation jobs.
//!
//! One tracker instance exists per [`JobKind`]. It records whether a job is
//! believed to be in flight on the backend, when it started, and the inputs
//! it was started with, and it survives process restarts through
//! [`TrackerStore`]. Live file handles are deliberately kept out of the
//! persisted record: after a restore the descriptive metadata is present but
//! the files themselves must be re-selected.

mod files;
mod store;

pub use files::{FileMetadata, UploadedFile, is_supported_file, supported_extensions};
pub use store::{TrackerStore, TrackerStoreError};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tracing::warn;
use uuid::Uuid;

/// Which input path a generation was started with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Text,
    Documents,
}

/// The kind of job a tracker instance follows. Each kind has its own
/// storage record and its own give-up threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Podcast,
    Conversation,
}

impl JobKind {
    #[must_use]
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Podcast => "podcast_generation",
            Self::Conversation => "conversation_generation",
        }
    }

    /// Default threshold after which the client stops waiting. Podcast jobs
    /// routinely run 30+ minutes on the backend; conversations are short.
    #[must_use]
    pub fn default_timeout(self) -> Duration {
        match self {
            Self::Podcast => Duration::from_secs(50 * 60),
            Self::Conversation => Duration::from_secs(5 * 60),
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Podcast => write!(f, "podcast"),
            Self::Conversation => write!(f, "conversation"),
        }
    }
}

/// The serializable portion of tracker state. This is exactly what the
/// store persists; raw file contents are never part of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationState {
    pub is_generating: bool,
    pub mode: GenerationMode,
    pub custom_text: String,
    pub uploaded_file_metadata: Vec<FileMetadata>,
    /// Epoch milliseconds; set while a job is in flight.
    pub start_time: Option<i64>,
    /// Opaque token identifying the current in-flight request. Used by
    /// callers to discard responses from superseded requests.
    pub generation_id: Option<String>,
}

/// Client-side record of generation status for one job kind.
pub struct GenerationTracker {
    state: GenerationState,
    /// Live file handles. Never persisted; always empty after a restore.
    files: Vec<UploadedFile>,
    store: TrackerStore,
    timeout: Duration,
    changes: watch::Sender<GenerationState>,
}

impl GenerationTracker {
    /// Open the tracker for a job kind, restoring any persisted record.
    pub fn open(kind: JobKind, data_dir: &Path, timeout: Duration) -> Result<Self, TrackerStoreError> {
        let store = TrackerStore::open(kind, data_dir)?;
        Ok(Self::with_store(store, timeout))
    }

    /// Build a tracker over an explicit store. Restores persisted state;
    /// an unreadable record degrades to defaults rather than failing.
    #[must_use]
    pub fn with_store(store: TrackerStore, timeout: Duration) -> Self {
        let state = match store.load() {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to restore generation state: {e}; starting fresh");
                GenerationState::default()
            }
        };
        let (changes, _) = watch::channel(state.clone());
        Self {
            state,
            files: Vec::new(),
            store,
            timeout,
            changes,
        }
    }

    /// Record a new in-flight generation and return its id.
    ///
    /// The caller is expected to have validated the input already. A call
    /// while another generation is active simply overwrites the record
    /// (last-writer-wins); the returned id is what lets the earlier caller
    /// detect that its response has gone stale.
    pub fn start_generation(
        &mut self,
        mode: GenerationMode,
        text: &str,
        files: Vec<UploadedFile>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.state.is_generating = true;
        self.state.mode = mode;
        self.state.custom_text = text.to_string();
        self.state.uploaded_file_metadata = files.iter().map(UploadedFile::metadata).collect();
        self.state.start_time = Some(now_ms());
        self.state.generation_id = Some(id.clone());
        self.files = files;
        self.persist();
        id
    }

    /// Mark the tracked generation finished (success or failure).
    ///
    /// Retains the input text and file metadata so the caller can re-submit;
    /// safe to call when nothing is in flight.
    pub fn complete_generation(&mut self) {
        self.state.is_generating = false;
        self.state.start_time = None;
        self.state.generation_id = None;
        self.persist();
    }

    /// Reset the entire record to defaults.
    pub fn clear_generation(&mut self) {
        self.state = GenerationState::default();
        self.files.clear();
        self.persist();
    }

    pub fn set_mode(&mut self, mode: GenerationMode) {
        self.state.mode = mode;
        self.persist();
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.state.custom_text = text.into();
        self.persist();
    }

    /// Replace the selected files, refreshing the metadata snapshot.
    pub fn set_files(&mut self, files: Vec<UploadedFile>) {
        self.state.uploaded_file_metadata = files.iter().map(UploadedFile::metadata).collect();
        self.files = files;
        self.persist();
    }

    /// Functional-update variant of [`Self::set_files`].
    pub fn update_files(&mut self, f: impl FnOnce(&mut Vec<UploadedFile>)) {
        f(&mut self.files);
        self.state.uploaded_file_metadata = self.files.iter().map(UploadedFile::metadata).collect();
        self.persist();
    }

    #[must_use]
    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    /// Live file handles for the current selection (empty after a restore).
    #[must_use]
    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.state.is_generating
    }

    #[must_use]
    pub fn generation_id(&self) -> Option<&str> {
        self.state.generation_id.as_deref()
    }

    /// Whether `id` still identifies the tracked in-flight request.
    #[must_use]
    pub fn is_current(&self, id: &str) -> bool {
        self.state.generation_id.as_deref() == Some(id)
    }

    /// True once the tracked job has been in flight longer than the
    /// configured threshold. "Timed out" means only that the client gives
    /// up waiting; the backend may have completed or failed silently.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        self.is_timed_out_at(now_ms())
    }

    #[must_use]
    pub fn is_timed_out_at(&self, now_ms: i64) -> bool {
        if !self.state.is_generating {
            return false;
        }
        let Some(start) = self.state.start_time else {
            return false;
        };
        let timeout_ms = i64::try_from(self.timeout.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(start) > timeout_ms
    }

    /// Whole minutes since the tracked job started; 0 when idle.
    #[must_use]
    pub fn elapsed_minutes(&self) -> i64 {
        self.elapsed_minutes_at(now_ms())
    }

    #[must_use]
    pub fn elapsed_minutes_at(&self, now_ms: i64) -> i64 {
        self.state
            .start_time
            .map_or(0, |start| now_ms.saturating_sub(start).max(0) / 60_000)
    }

    /// Subscribe to state changes. A snapshot is published after every
    /// mutation; the routing layer drives re-renders from this instead of
    /// polling.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GenerationState> {
        self.changes.subscribe()
    }

    /// Write the serializable state through the store and notify
    /// subscribers. A failed write degrades to session-only tracking.
    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.state) {
            warn!("Failed to persist generation state: {e}; tracking in memory only");
        }
        self.changes.send_replace(self.state.clone());
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

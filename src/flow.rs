//! Generation orchestration.
//!
//! The tracker itself never talks to the network. This module owns the
//! caller side of the contract: validate input, stamp the tracker, await
//! the backend, clear the in-flight record on every exit path, and throw
//! away responses that belong to a superseded request.

use crate::client::{ClientError, GenerateApi, GenerateResponse};
use crate::error::{Error, Result};
use crate::tracker::{
    GenerationMode, GenerationTracker, UploadedFile, is_supported_file, supported_extensions,
};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Minimum characters for a text-mode generation. Shorter inputs produce
/// unusable audio on the backend.
const MIN_TEXT_CHARS: usize = 50;

/// What the caller wants generated.
pub enum GenerationInput {
    Text(String),
    Documents(Vec<UploadedFile>),
}

/// How an awaited generation ended.
#[derive(Debug)]
pub enum GenerateOutcome {
    Completed(GenerateResponse),
    /// The response belonged to a superseded request and was discarded.
    Stale,
}

/// A previous job found timed out at startup. Its outcome is unknown: the
/// backend may have completed or failed silently after the client stopped
/// waiting.
#[derive(Debug)]
pub struct StaleJob {
    pub elapsed_minutes: i64,
}

fn lock(tracker: &Mutex<GenerationTracker>) -> MutexGuard<'_, GenerationTracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the in-flight record when the request it belongs to finishes,
/// whichever path it exits through. Skipped when a newer generation has
/// superseded this one.
struct CompletionGuard<'a> {
    tracker: &'a Mutex<GenerationTracker>,
    id: String,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        let mut tracker = lock(self.tracker);
        if tracker.is_current(&self.id) {
            tracker.complete_generation();
        }
    }
}

/// Run one generation end to end.
///
/// Cancellation through `cancel` is a soft abort: the call is treated as
/// failed locally, but no cancellation reaches the backend.
pub async fn run_generation(
    tracker: &Mutex<GenerationTracker>,
    api: &dyn GenerateApi,
    input: GenerationInput,
    cancel: &CancellationToken,
) -> Result<GenerateOutcome> {
    validate(&input)?;

    let (mode, text, files) = match input {
        GenerationInput::Text(text) => (GenerationMode::Text, text, Vec::new()),
        GenerationInput::Documents(files) => (GenerationMode::Documents, String::new(), files),
    };

    let id = lock(tracker).start_generation(mode, &text, files.clone());
    let _guard = CompletionGuard {
        tracker,
        id: id.clone(),
    };
    info!(mode = ?mode, generation_id = %id, "Generation started");

    let call = async {
        match mode {
            GenerationMode::Text => api.generate_text(&text).await,
            GenerationMode::Documents => api.generate_documents(&files).await,
        }
    };

    let result = tokio::select! {
        () = cancel.cancelled() => Err(ClientError::Cancelled),
        result = call => result,
    };

    // A newer generation may have superseded this one while we waited;
    // its record must not be touched, whatever the backend said.
    if !lock(tracker).is_current(&id) {
        info!(generation_id = %id, "Discarding stale generation response");
        return Ok(GenerateOutcome::Stale);
    }

    match result {
        Ok(response) => {
            info!(success = response.success, "Generation finished");
            Ok(GenerateOutcome::Completed(response))
        }
        Err(e) => {
            warn!("Generation failed: {e}");
            Err(e.into())
        }
    }
}

/// Startup check for a restored record: if the tracked job exceeded its
/// threshold while the process was away, force-clear it and report how
/// long ago it started so the caller can warn the user.
pub fn startup_check(tracker: &mut GenerationTracker) -> Option<StaleJob> {
    if !tracker.is_timed_out() {
        return None;
    }
    let elapsed_minutes = tracker.elapsed_minutes();
    warn!(elapsed_minutes, "Previous generation exceeded its threshold; clearing record");
    tracker.clear_generation();
    Some(StaleJob { elapsed_minutes })
}

fn validate(input: &GenerationInput) -> Result<()> {
    match input {
        GenerationInput::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(Error::InvalidInput("text content is required".to_string()));
            }
            let chars = trimmed.chars().count();
            if chars < MIN_TEXT_CHARS {
                return Err(Error::InvalidInput(format!(
                    "content too short ({chars} chars); at least {MIN_TEXT_CHARS} needed"
                )));
            }
        }
        GenerationInput::Documents(files) => {
            if files.is_empty() {
                return Err(Error::InvalidInput(
                    "at least one file is required".to_string(),
                ));
            }
            for file in files {
                if !is_supported_file(&file.path) {
                    return Err(Error::InvalidInput(format!(
                        "unsupported file type: {}. Supported extensions: {}",
                        file.name,
                        supported_extensions().join(", ")
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{GenerationState, TrackerStore};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    struct StubApi {
        delay_ms: u64,
        response: Mutex<Option<std::result::Result<GenerateResponse, ClientError>>>,
    }

    impl StubApi {
        fn new(delay_ms: u64, response: std::result::Result<GenerateResponse, ClientError>) -> Self {
            Self {
                delay_ms,
                response: Mutex::new(Some(response)),
            }
        }

        fn ok(delay_ms: u64) -> Self {
            Self::new(
                delay_ms,
                Ok(GenerateResponse {
                    success: true,
                    message: "Audio generation initiated".to_string(),
                    processing_time: Some(1.0),
                }),
            )
        }

        fn take(&self) -> std::result::Result<GenerateResponse, ClientError> {
            self.response.lock().unwrap().take().expect("stub called twice")
        }
    }

    #[async_trait]
    impl GenerateApi for StubApi {
        async fn generate_text(
            &self,
            _text: &str,
        ) -> std::result::Result<GenerateResponse, ClientError> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.take()
        }

        async fn generate_documents(
            &self,
            _files: &[UploadedFile],
        ) -> std::result::Result<GenerateResponse, ClientError> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.take()
        }
    }

    fn make_tracker(dir: &std::path::Path) -> GenerationTracker {
        let store = TrackerStore::at_path(dir.join("podcast_generation.json"));
        GenerationTracker::with_store(store, Duration::from_secs(3600))
    }

    fn long_text() -> String {
        "a".repeat(60)
    }

    fn make_file(name: &str) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            path: PathBuf::from("/tmp").join(name),
            size: 1000,
            mime_type: "application/pdf".to_string(),
            last_modified: 123,
        }
    }

    #[tokio::test]
    async fn test_success_path_completes_tracker() {
        let dir = tempdir().unwrap();
        let tracker = Mutex::new(make_tracker(dir.path()));
        let api = StubApi::ok(0);

        let outcome = run_generation(
            &tracker,
            &api,
            GenerationInput::Text(long_text()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, GenerateOutcome::Completed(r) if r.success));
        let tracker = lock(&tracker);
        assert!(!tracker.is_generating());
        assert!(tracker.generation_id().is_none());
        // Text input survives completion for re-submission.
        assert_eq!(tracker.state().custom_text, long_text());
    }

    #[tokio::test]
    async fn test_backend_error_still_completes_tracker() {
        let dir = tempdir().unwrap();
        let tracker = Mutex::new(make_tracker(dir.path()));
        let api = StubApi::new(0, Err(ClientError::Api("HTTP 500: boom".to_string())));

        let result = run_generation(
            &tracker,
            &api,
            GenerationInput::Text(long_text()),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(Error::Client(ClientError::Api(_)))
        ));
        assert!(!lock(&tracker).is_generating());
    }

    #[tokio::test]
    async fn test_cancel_is_local_failure() {
        let dir = tempdir().unwrap();
        let tracker = Mutex::new(make_tracker(dir.path()));
        let api = StubApi::ok(10_000);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run_generation(&tracker, &api, GenerationInput::Text(long_text()), &cancel).await;

        assert!(matches!(result, Err(Error::Client(ClientError::Cancelled))));
        assert!(!lock(&tracker).is_generating());
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let dir = tempdir().unwrap();
        let tracker = Arc::new(Mutex::new(make_tracker(dir.path())));
        let api = Arc::new(StubApi::ok(200));

        let task_tracker = tracker.clone();
        let task_api = api.clone();
        let handle = tokio::spawn(async move {
            run_generation(
                &task_tracker,
                &*task_api,
                GenerationInput::Text(long_text()),
                &CancellationToken::new(),
            )
            .await
        });

        // Let the first request get in flight, then supersede it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second_id =
            lock(&tracker).start_generation(GenerationMode::Text, "second", Vec::new());

        let outcome = handle.await.unwrap().unwrap();
        assert!(matches!(outcome, GenerateOutcome::Stale));

        // The superseding generation is untouched by the stale completion.
        let tracker = lock(&tracker);
        assert!(tracker.is_generating());
        assert!(tracker.is_current(&second_id));
        assert_eq!(tracker.state().custom_text, "second");
    }

    #[tokio::test]
    async fn test_validation_rejects_bad_input() {
        let dir = tempdir().unwrap();
        let tracker = Mutex::new(make_tracker(dir.path()));
        let api = StubApi::ok(0);
        let cancel = CancellationToken::new();

        for input in [
            GenerationInput::Text(String::new()),
            GenerationInput::Text("   ".to_string()),
            GenerationInput::Text("too short".to_string()),
            GenerationInput::Documents(Vec::new()),
            GenerationInput::Documents(vec![make_file("archive.zip")]),
        ] {
            let result = run_generation(&tracker, &api, input, &cancel).await;
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }

        // Nothing was ever started.
        assert!(!lock(&tracker).is_generating());
        assert!(lock(&tracker).state().generation_id.is_none());
    }

    #[test]
    fn test_startup_check_clears_timed_out_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("podcast_generation.json");

        // A record whose job started two hours ago, against a 1h threshold.
        let store = TrackerStore::at_path(path.clone());
        store
            .save(&GenerationState {
                is_generating: true,
                custom_text: "old".to_string(),
                start_time: Some(chrono::Utc::now().timestamp_millis() - 2 * 3600 * 1000),
                generation_id: Some("stale-id".to_string()),
                ..GenerationState::default()
            })
            .unwrap();

        let mut tracker =
            GenerationTracker::with_store(TrackerStore::at_path(path), Duration::from_secs(3600));
        let stale = startup_check(&mut tracker).expect("record should be stale");
        assert!(stale.elapsed_minutes >= 119);
        assert!(!tracker.is_generating());
        assert_eq!(*tracker.state(), GenerationState::default());
    }

    #[test]
    fn test_startup_check_leaves_recent_job_alone() {
        let dir = tempdir().unwrap();
        let mut tracker = make_tracker(dir.path());
        assert!(startup_check(&mut tracker).is_none());

        tracker.start_generation(GenerationMode::Text, "content", Vec::new());
        assert!(startup_check(&mut tracker).is_none());
        assert!(tracker.is_generating());
    }
}

//! Lifecycle controller
//!
//! The single authority for task state changes. Every mutation takes the
//! task lock, validates the transition against the state machine, and
//! stamps `completed_at` exactly once on entering a terminal state.
//! Failure transitions also release the task's artifact; the owning
//! worker cleans up its writer before reporting the failure here.

use std::sync::Arc;

use chrono::Utc;

use fluxo_protocol::{ErrorCode, ExportMetadata, TaskState};
use fluxo_storage::ArtifactStore;
use fluxo_store::UploadOutcome;
use fluxo_writer::FileMetadata;

use crate::error::TaskError;
use crate::metrics::TaskMetrics;
use crate::registry::TaskRegistry;
use crate::task::Task;

/// Owns task state transitions and their per-state side effects
pub struct LifecycleController {
    registry: Arc<TaskRegistry>,
    artifacts: Arc<ArtifactStore>,
    metrics: Arc<TaskMetrics>,
}

impl LifecycleController {
    pub fn new(
        registry: Arc<TaskRegistry>,
        artifacts: Arc<ArtifactStore>,
        metrics: Arc<TaskMetrics>,
    ) -> Self {
        Self {
            registry,
            artifacts,
            metrics,
        }
    }

    /// The registry this controller mutates through
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Create a task from a validated stream header and register it
    pub fn create(&self, metadata: ExportMetadata) -> Arc<Task> {
        let task = Arc::new(Task::new(metadata));
        self.registry.insert(Arc::clone(&task));
        self.metrics.task_created();

        tracing::info!(
            event = "TaskCreated",
            task_id = %task.id,
            request_id = %task.request_id,
            format = %task.format,
            filename = %task.filename,
            "export task created"
        );

        task
    }

    /// Queued → Processing: a worker picked the task up
    pub fn mark_processing(&self, task: &Task) -> Result<(), TaskError> {
        self.transition(task, TaskState::Processing, |_| {})?;
        self.metrics.task_started();

        tracing::info!(
            event = "TaskStarted",
            task_id = %task.id,
            "task processing started"
        );
        Ok(())
    }

    /// Processing → Uploading: artifact finalized, record the file facts
    pub fn mark_uploading(&self, task: &Task, file: &FileMetadata) -> Result<(), TaskError> {
        self.transition(task, TaskState::Uploading, |cells| {
            cells.file_size_bytes = file.size_bytes;
            cells.checksum_sha256 = file.checksum_hex.clone();
            // Finalize counts rows actually written, header included
            cells.records_processed = file.row_count;
        })
    }

    /// Uploading → Completed: signed URL published
    pub fn mark_completed(&self, task: &Task, outcome: &UploadOutcome) -> Result<(), TaskError> {
        self.transition(task, TaskState::Completed, |cells| {
            cells.signed_url = outcome.signed_url.clone();
            cells.progress_percent = 100.0;
        })?;
        self.metrics.task_completed();

        let elapsed = Utc::now() - task.started_at;
        tracing::info!(
            event = "TaskCompleted",
            task_id = %task.id,
            oss_url = %outcome.signed_url,
            file_size = outcome.size_bytes,
            duration_ms = elapsed.num_milliseconds(),
            "export task completed"
        );
        Ok(())
    }

    /// Any non-terminal state → Failed
    ///
    /// Records the error, stamps the terminal timestamp and releases the
    /// artifact. Safe to call from any failure site; an already-terminal
    /// task is left untouched.
    pub fn mark_failed(&self, task: &Task, code: ErrorCode, message: impl Into<String>) {
        let message = message.into();
        let result = self.transition(task, TaskState::Failed, |cells| {
            cells.error_code = Some(code);
            cells.error_message = message.clone();
        });

        match result {
            Ok(()) => {
                self.metrics.task_failed();
                tracing::error!(
                    event = "TaskFailed",
                    task_id = %task.id,
                    error_code = %code,
                    error_message = %message,
                    "export task failed"
                );

                if let Err(e) = self.artifacts.release(&task.id) {
                    if !e.is_not_found() {
                        tracing::warn!(task_id = %task.id, error = %e, "artifact release failed during task failure");
                    }
                }
            }
            Err(e) => {
                // Already terminal; a second failure report changes nothing
                tracing::debug!(task_id = %task.id, error = %e, "ignoring failure for terminal task");
            }
        }
    }

    /// Validated transition with terminal stamping, under the task lock
    fn transition(
        &self,
        task: &Task,
        to: TaskState,
        apply: impl FnOnce(&mut crate::task::TaskCells),
    ) -> Result<(), TaskError> {
        task.with_cells(|cells| {
            let from = cells.state;
            if !from.can_transition(to) {
                return Err(TaskError::IllegalTransition {
                    task_id: task.id.clone(),
                    from,
                    to,
                });
            }

            cells.state = to;
            if to.is_terminal() {
                cells.completed_at = Some(Utc::now());
            }
            apply(cells);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxo_protocol::{ColumnSpec, DataType, ExportFormat, FormatOptions};
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn controller(dir: &TempDir) -> LifecycleController {
        LifecycleController::new(
            Arc::new(TaskRegistry::new()),
            Arc::new(ArtifactStore::new(dir.path()).unwrap()),
            Arc::new(TaskMetrics::new()),
        )
    }

    fn metadata() -> ExportMetadata {
        ExportMetadata {
            request_id: "r1".into(),
            format: ExportFormat::Csv,
            filename: "a.csv".into(),
            columns: vec![ColumnSpec::new("A", DataType::String)],
            options: FormatOptions::default(),
        }
    }

    fn file_meta() -> FileMetadata {
        FileMetadata {
            path: PathBuf::from("/tmp/a.csv"),
            size_bytes: 42,
            checksum_hex: "ff".repeat(32),
            row_count: 4,
        }
    }

    fn outcome() -> UploadOutcome {
        UploadOutcome {
            object_key: "exports/2026/08/02/a.csv".into(),
            signed_url: "https://store/exports/a.csv?sig".into(),
            size_bytes: 42,
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let dir = TempDir::new().unwrap();
        let ctrl = controller(&dir);
        let task = ctrl.create(metadata());

        assert_eq!(ctrl.registry().len(), 1);
        assert_eq!(task.state(), TaskState::Queued);

        ctrl.mark_processing(&task).unwrap();
        assert_eq!(task.state(), TaskState::Processing);

        ctrl.mark_uploading(&task, &file_meta()).unwrap();
        let snapshot = task.snapshot();
        assert_eq!(snapshot.state, TaskState::Uploading);
        assert_eq!(snapshot.file_size_bytes, 42);
        assert_eq!(snapshot.records_processed, 4);
        assert!(!snapshot.checksum_sha256.is_empty());

        ctrl.mark_completed(&task, &outcome()).unwrap();
        let snapshot = task.snapshot();
        assert_eq!(snapshot.state, TaskState::Completed);
        assert_eq!(snapshot.progress_percent, 100.0);
        assert!(!snapshot.signed_url.is_empty());
        assert!(snapshot.completed_at.is_some());
        assert!(snapshot.completed_at.unwrap() >= task.started_at);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let dir = TempDir::new().unwrap();
        let ctrl = controller(&dir);
        let task = ctrl.create(metadata());

        // Queued → Uploading skips Processing
        assert!(matches!(
            ctrl.mark_uploading(&task, &file_meta()),
            Err(TaskError::IllegalTransition { .. })
        ));

        // Queued → Completed is even further off
        assert!(matches!(
            ctrl.mark_completed(&task, &outcome()),
            Err(TaskError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn test_fail_from_any_non_terminal_state() {
        let dir = TempDir::new().unwrap();
        let ctrl = controller(&dir);

        for advance in 0..3 {
            let task = ctrl.create(metadata());
            if advance >= 1 {
                ctrl.mark_processing(&task).unwrap();
            }
            if advance >= 2 {
                ctrl.mark_uploading(&task, &file_meta()).unwrap();
            }

            ctrl.mark_failed(&task, ErrorCode::StorageError, "boom");
            let snapshot = task.snapshot();
            assert_eq!(snapshot.state, TaskState::Failed);
            assert_eq!(snapshot.error_code, Some(ErrorCode::StorageError));
            assert_eq!(snapshot.error_message, "boom");
            assert!(snapshot.completed_at.is_some());
        }
    }

    #[test]
    fn test_terminal_is_sticky() {
        let dir = TempDir::new().unwrap();
        let ctrl = controller(&dir);
        let task = ctrl.create(metadata());

        ctrl.mark_failed(&task, ErrorCode::StreamError, "first");
        let first_completed_at = task.snapshot().completed_at;

        // A second failure report must not overwrite anything
        ctrl.mark_failed(&task, ErrorCode::Internal, "second");
        let snapshot = task.snapshot();
        assert_eq!(snapshot.error_code, Some(ErrorCode::StreamError));
        assert_eq!(snapshot.error_message, "first");
        assert_eq!(snapshot.completed_at, first_completed_at);

        // And completed tasks cannot fail
        let done = ctrl.create(metadata());
        ctrl.mark_processing(&done).unwrap();
        ctrl.mark_uploading(&done, &file_meta()).unwrap();
        ctrl.mark_completed(&done, &outcome()).unwrap();
        ctrl.mark_failed(&done, ErrorCode::Internal, "late");
        assert_eq!(done.state(), TaskState::Completed);
    }

    #[test]
    fn test_failure_releases_artifact() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TaskRegistry::new());
        let artifacts = Arc::new(ArtifactStore::new(dir.path()).unwrap());
        let ctrl = LifecycleController::new(
            Arc::clone(&registry),
            Arc::clone(&artifacts),
            Arc::new(TaskMetrics::new()),
        );

        let task = ctrl.create(metadata());
        ctrl.mark_processing(&task).unwrap();

        let path = artifacts.allocate(&task.id, &task.filename).unwrap();
        std::fs::write(&path, b"partial").unwrap();

        ctrl.mark_failed(&task, ErrorCode::WriterFormat, "bad record");
        assert!(!path.exists());
        assert!(artifacts.is_empty());
    }

    #[test]
    fn test_error_code_iff_failed_and_url_iff_completed() {
        let dir = TempDir::new().unwrap();
        let ctrl = controller(&dir);

        let ok = ctrl.create(metadata());
        ctrl.mark_processing(&ok).unwrap();
        ctrl.mark_uploading(&ok, &file_meta()).unwrap();
        ctrl.mark_completed(&ok, &outcome()).unwrap();
        let snapshot = ok.snapshot();
        assert!(!snapshot.signed_url.is_empty());
        assert!(snapshot.error_code.is_none());

        let bad = ctrl.create(metadata());
        ctrl.mark_failed(&bad, ErrorCode::UploadError, "no");
        let snapshot = bad.snapshot();
        assert!(snapshot.signed_url.is_empty());
        assert!(snapshot.error_code.is_some());
    }
}

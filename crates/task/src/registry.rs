//! Task registry
//!
//! Process-wide map of task id → task. Insertions take the write lock;
//! status reads clone the `Arc` and snapshot under the per-task lock, so
//! queries never block the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use fluxo_protocol::{StatusResponse, TaskState};
use fluxo_storage::TaskGuard;

use crate::task::Task;

/// Process-wide task map
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Arc<Task>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task under its id
    pub fn insert(&self, task: Arc<Task>) {
        self.tasks.write().insert(task.id.clone(), task);
    }

    /// Look up a task by id
    pub fn get(&self, task_id: &str) -> Option<Arc<Task>> {
        self.tasks.read().get(task_id).cloned()
    }

    /// Number of registered tasks
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    /// Project a consistent external status view of one task
    ///
    /// The advisory ETA is included only while the task is processing
    /// with measurable progress; otherwise the field carries -1.
    pub fn project(&self, task_id: &str) -> Option<StatusResponse> {
        let task = self.get(task_id)?;
        let snapshot = task.snapshot();

        let mut estimated_seconds_remaining = -1;
        if snapshot.state == TaskState::Processing
            && snapshot.records_processed > 0
            && snapshot.progress_percent > 0.0
            && snapshot.progress_percent < 100.0
        {
            let elapsed = (Utc::now() - task.started_at).num_milliseconds() as f64 / 1000.0;
            if elapsed > 0.0 {
                let records = snapshot.records_processed as f64;
                let rate = records / elapsed;
                let remaining = records * (100.0 / snapshot.progress_percent as f64 - 1.0);
                estimated_seconds_remaining = (remaining / rate) as i64;
            }
        }

        Some(StatusResponse {
            task_id: task.id.clone(),
            status: snapshot.state,
            format: task.format,
            filename: task.filename.clone(),
            records_processed: snapshot.records_processed,
            progress_percent: snapshot.progress_percent,
            oss_url: snapshot.signed_url,
            file_size_bytes: snapshot.file_size_bytes,
            error_code: snapshot
                .error_code
                .map(|c| c.as_str().to_string())
                .unwrap_or_default(),
            error_message: snapshot.error_message,
            started_at: task.started_at.timestamp(),
            completed_at: snapshot.completed_at.map(|t| t.timestamp()).unwrap_or(0),
            estimated_seconds_remaining,
        })
    }
}

impl TaskGuard for TaskRegistry {
    /// A task owning its artifact must never be reaped
    fn is_active(&self, task_id: &str) -> bool {
        self.get(task_id)
            .map(|task| {
                matches!(
                    task.state(),
                    TaskState::Processing | TaskState::Uploading
                )
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxo_protocol::{ColumnSpec, DataType, ExportFormat, ExportMetadata, FormatOptions};

    fn task() -> Arc<Task> {
        Arc::new(Task::new(ExportMetadata {
            request_id: "r1".into(),
            format: ExportFormat::Csv,
            filename: "a.csv".into(),
            columns: vec![ColumnSpec::new("A", DataType::String)],
            options: FormatOptions::default(),
        }))
    }

    #[test]
    fn test_insert_and_get() {
        let registry = TaskRegistry::new();
        let task = task();
        registry.insert(Arc::clone(&task));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&task.id).unwrap().id, task.id);
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_project_unknown_task() {
        let registry = TaskRegistry::new();
        assert!(registry.project("nope").is_none());
    }

    #[test]
    fn test_project_fields() {
        let registry = TaskRegistry::new();
        let task = task();
        registry.insert(Arc::clone(&task));

        let status = registry.project(&task.id).unwrap();
        assert_eq!(status.task_id, task.id);
        assert_eq!(status.status, TaskState::Queued);
        assert_eq!(status.format, ExportFormat::Csv);
        assert_eq!(status.filename, "a.csv");
        assert!(status.error_code.is_empty());
        assert_eq!(status.completed_at, 0);
        // No ETA while queued
        assert_eq!(status.estimated_seconds_remaining, -1);
    }

    #[test]
    fn test_eta_only_while_processing() {
        let registry = TaskRegistry::new();
        let task = task();
        registry.insert(Arc::clone(&task));

        task.record_progress(5000);
        // Still queued: no ETA despite progress
        assert_eq!(
            registry.project(&task.id).unwrap().estimated_seconds_remaining,
            -1
        );
    }

    #[test]
    fn test_guard_tracks_active_states() {
        let registry = TaskRegistry::new();
        let task = task();
        registry.insert(Arc::clone(&task));

        // Queued tasks hold no artifact yet
        assert!(!registry.is_active(&task.id));
        assert!(!registry.is_active("unknown"));

        task.with_cells(|cells| cells.state = TaskState::Processing);
        assert!(registry.is_active(&task.id));

        task.with_cells(|cells| cells.state = TaskState::Uploading);
        assert!(registry.is_active(&task.id));

        task.with_cells(|cells| cells.state = TaskState::Completed);
        assert!(!registry.is_active(&task.id));
    }
}

//! The task entity
//!
//! Identity fields are immutable after creation; everything that changes
//! over the lifecycle lives behind a per-task mutex and is read through
//! consistent snapshots. Only the lifecycle controller mutates the state
//! cell; the worker updates progress through `record_progress`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use fluxo_protocol::{ErrorCode, ExportFormat, ExportMetadata, ExportResponse, TaskState};

/// Asymptotic progress constant: `records / (records + K)`
///
/// Record totals are unknown a priori, so progress is an advisory
/// monotonic approximation, capped at 99 until finalization.
const PROGRESS_K: f32 = 1000.0;

/// Advisory progress for a record count, in [0, 99]
pub fn advance_progress(records_processed: u64) -> f32 {
    let records = records_processed as f32;
    (records / (records + PROGRESS_K) * 100.0).min(99.0)
}

/// Mutable task cells, guarded by the per-task lock
#[derive(Debug, Clone)]
pub(crate) struct TaskCells {
    pub state: TaskState,
    pub records_processed: u64,
    pub progress_percent: f32,
    pub file_size_bytes: u64,
    pub checksum_sha256: String,
    pub signed_url: String,
    pub error_code: Option<ErrorCode>,
    pub error_message: String,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a task, taken under the task lock
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub state: TaskState,
    pub records_processed: u64,
    pub progress_percent: f32,
    pub file_size_bytes: u64,
    pub checksum_sha256: String,
    pub signed_url: String,
    pub error_code: Option<ErrorCode>,
    pub error_message: String,
    pub completed_at: Option<DateTime<Utc>>,
}

/// An export task, from metadata receipt to signed-URL publication
///
/// Process-lifetime only; the registry owns the `Arc`.
pub struct Task {
    /// Opaque unique id
    pub id: String,

    /// Client-chosen trace id from the stream header
    pub request_id: String,

    /// Requested output format
    pub format: ExportFormat,

    /// Client-requested base filename (sanitized downstream)
    pub filename: String,

    /// Frozen snapshot of the stream header
    pub metadata: ExportMetadata,

    /// Wall-clock creation time
    pub started_at: DateTime<Utc>,

    cells: Mutex<TaskCells>,
}

impl Task {
    /// Create a fresh task in `Queued` from a validated stream header
    pub(crate) fn new(metadata: ExportMetadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request_id: metadata.request_id.clone(),
            format: metadata.format,
            filename: metadata.filename.clone(),
            metadata,
            started_at: Utc::now(),
            cells: Mutex::new(TaskCells {
                state: TaskState::Queued,
                records_processed: 0,
                progress_percent: 0.0,
                file_size_bytes: 0,
                checksum_sha256: String::new(),
                signed_url: String::new(),
                error_code: None,
                error_message: String::new(),
                completed_at: None,
            }),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        self.cells.lock().state
    }

    /// Consistent snapshot of the mutable cells
    pub fn snapshot(&self) -> TaskSnapshot {
        let cells = self.cells.lock();
        TaskSnapshot {
            state: cells.state,
            records_processed: cells.records_processed,
            progress_percent: cells.progress_percent,
            file_size_bytes: cells.file_size_bytes,
            checksum_sha256: cells.checksum_sha256.clone(),
            signed_url: cells.signed_url.clone(),
            error_code: cells.error_code,
            error_message: cells.error_message.clone(),
            completed_at: cells.completed_at,
        }
    }

    /// Account a written batch and advance the advisory progress
    ///
    /// Both counters are monotonic: progress never decreases even though
    /// the asymptotic formula alone would already guarantee it.
    pub fn record_progress(&self, batch_records: u64) -> u64 {
        let mut cells = self.cells.lock();
        cells.records_processed += batch_records;
        let progress = advance_progress(cells.records_processed);
        if progress > cells.progress_percent {
            cells.progress_percent = progress;
        }
        cells.records_processed
    }

    /// Run `f` under the task lock (lifecycle controller only)
    pub(crate) fn with_cells<R>(&self, f: impl FnOnce(&mut TaskCells) -> R) -> R {
        f(&mut self.cells.lock())
    }

    /// Build the terminal response frame from the current snapshot
    pub fn export_response(&self) -> ExportResponse {
        let snapshot = self.snapshot();
        ExportResponse {
            task_id: self.id.clone(),
            status: snapshot.state,
            oss_url: snapshot.signed_url,
            file_size_bytes: snapshot.file_size_bytes,
            record_count: snapshot.records_processed,
            progress_percent: snapshot.progress_percent,
            checksum_sha256: snapshot.checksum_sha256,
            error_code: snapshot
                .error_code
                .map(|c| c.as_str().to_string())
                .unwrap_or_default(),
            error_message: snapshot.error_message,
            started_at: self.started_at.timestamp(),
            completed_at: snapshot.completed_at.map(|t| t.timestamp()).unwrap_or(0),
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("format", &self.format)
            .field("filename", &self.filename)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxo_protocol::{ColumnSpec, DataType, FormatOptions};

    fn metadata() -> ExportMetadata {
        ExportMetadata {
            request_id: "r1".into(),
            format: ExportFormat::Csv,
            filename: "a.csv".into(),
            columns: vec![ColumnSpec::new("A", DataType::String)],
            options: FormatOptions::default(),
        }
    }

    #[test]
    fn test_new_task_is_queued() {
        let task = Task::new(metadata());
        assert_eq!(task.state(), TaskState::Queued);
        assert!(!task.id.is_empty());

        let snapshot = task.snapshot();
        assert_eq!(snapshot.records_processed, 0);
        assert_eq!(snapshot.progress_percent, 0.0);
        assert!(snapshot.signed_url.is_empty());
        assert!(snapshot.error_code.is_none());
        assert!(snapshot.completed_at.is_none());
    }

    #[test]
    fn test_progress_is_monotonic_and_capped() {
        let task = Task::new(metadata());

        let mut last = 0.0f32;
        for _ in 0..200 {
            task.record_progress(500);
            let progress = task.snapshot().progress_percent;
            assert!(progress >= last);
            assert!(progress <= 99.0);
            last = progress;
        }
        // 100k records is deep into the asymptote
        assert!(last > 98.0);
    }

    #[test]
    fn test_advance_progress_formula() {
        assert_eq!(advance_progress(0), 0.0);
        // 1000 / (1000 + 1000) = 50%
        assert!((advance_progress(1000) - 50.0).abs() < 0.01);
        // Never reaches 100
        assert!(advance_progress(u32::MAX as u64) <= 99.0);
    }

    #[test]
    fn test_record_progress_returns_total() {
        let task = Task::new(metadata());
        assert_eq!(task.record_progress(3), 3);
        assert_eq!(task.record_progress(4), 7);
    }

    #[test]
    fn test_export_response_zero_values() {
        let task = Task::new(metadata());
        let resp = task.export_response();
        assert_eq!(resp.task_id, task.id);
        assert_eq!(resp.status, TaskState::Queued);
        assert!(resp.oss_url.is_empty());
        assert!(resp.error_code.is_empty());
        assert_eq!(resp.completed_at, 0);
        assert!(resp.started_at > 0);
    }
}

//! Worker pool
//!
//! Fixed-size pool of pipeline workers. Each worker owns one task at a
//! time, end-to-end: allocate the artifact, drive the writer from the
//! job's frame channel, finalize, upload, publish, clean up, and send
//! the terminal response. Shutdown is cooperative: the cancellation
//! token closes the accept path immediately and is re-checked between
//! pipeline stages and inside the batch loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use fluxo_protocol::ErrorCode;
use fluxo_storage::ArtifactStore;
use fluxo_store::Uploader;
use fluxo_writer::{ExportWriter, WriterError};

use crate::job::{ExportJob, IngestFrame};
use crate::lifecycle::LifecycleController;
use crate::metrics::TaskMetrics;
use crate::queue::JobReceiver;
use crate::task::Task;

/// Shared dependencies handed to every worker
#[derive(Clone)]
pub struct WorkerContext {
    pub controller: Arc<LifecycleController>,
    pub artifacts: Arc<ArtifactStore>,
    pub uploader: Arc<Uploader>,
    pub metrics: Arc<TaskMetrics>,
}

/// Fixed-size pool of pipeline workers
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers consuming from the shared receiver
    pub fn spawn(
        count: usize,
        receiver: JobReceiver,
        ctx: WorkerContext,
        cancel: CancellationToken,
    ) -> Self {
        let workers = (0..count.max(1))
            .map(|worker_id| {
                let receiver = receiver.clone();
                let ctx = ctx.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, receiver, ctx, cancel).await;
                })
            })
            .collect();

        Self { workers }
    }

    /// Number of workers in the pool
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the pool holds no workers
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Wait for all workers to finish, up to `timeout` each
    ///
    /// Workers still running after the timeout are aborted; tasks
    /// interrupted mid-upload are not resumed.
    pub async fn join(self, timeout: Duration) {
        for (worker_id, handle) in self.workers.into_iter().enumerate() {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(worker_id, error = %e, "worker panicked during shutdown");
                }
                Err(_) => {
                    tracing::warn!(worker_id, "worker did not finish within shutdown timeout");
                }
            }
        }
    }
}

/// One worker: loop over {shutdown, next job}
async fn worker_loop(
    worker_id: usize,
    receiver: JobReceiver,
    ctx: WorkerContext,
    cancel: CancellationToken,
) {
    tracing::debug!(worker_id, "worker started");

    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            job = receiver.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        process_job(&ctx, &cancel, job).await;
    }

    tracing::debug!(worker_id, "worker stopped");
}

/// Failure bubbling up through the pipeline stages
struct PipelineFailure {
    code: ErrorCode,
    message: String,
}

impl PipelineFailure {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&WriterError> for PipelineFailure {
    fn from(e: &WriterError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

/// Drive one task through the full pipeline and answer the stream handler
async fn process_job(ctx: &WorkerContext, cancel: &CancellationToken, job: ExportJob) {
    let ExportJob {
        task,
        mut frames,
        respond,
    } = job;

    if let Err(failure) = drive(ctx, cancel, &task, &mut frames).await {
        ctx.controller.mark_failed(&task, failure.code, failure.message);
    }

    // The terminal frame reflects whatever state the task ended in
    if respond.send(task.export_response()).is_err() {
        tracing::debug!(task_id = %task.id, "stream handler gone before terminal response");
    }
}

/// The per-task pipeline; returns the failure that should mark the task
async fn drive(
    ctx: &WorkerContext,
    cancel: &CancellationToken,
    task: &Arc<Task>,
    frames: &mut mpsc::Receiver<IngestFrame>,
) -> Result<(), PipelineFailure> {
    ctx.controller
        .mark_processing(task)
        .map_err(|e| PipelineFailure::new(ErrorCode::Internal, e.to_string()))?;

    if cancel.is_cancelled() {
        return Err(shutdown_failure());
    }

    ctx.artifacts
        .preflight_space(0)
        .map_err(|e| PipelineFailure::new(ErrorCode::StorageError, e.to_string()))?;
    let artifact_path = ctx
        .artifacts
        .allocate(&task.id, &task.filename)
        .map_err(|e| PipelineFailure::new(ErrorCode::StorageError, e.to_string()))?;

    let mut writer = fluxo_writer::for_format(task.format);
    let result = ingest_and_upload(ctx, cancel, task, frames, writer.as_mut(), &artifact_path).await;

    if result.is_err() {
        writer.cleanup();
    }
    result
}

async fn ingest_and_upload(
    ctx: &WorkerContext,
    cancel: &CancellationToken,
    task: &Arc<Task>,
    frames: &mut mpsc::Receiver<IngestFrame>,
    writer: &mut dyn ExportWriter,
    artifact_path: &std::path::Path,
) -> Result<(), PipelineFailure> {
    writer
        .initialize(&task.metadata, artifact_path)
        .map_err(|e| PipelineFailure::from(&e))?;
    writer
        .write_header(&task.metadata.columns)
        .map_err(|e| PipelineFailure::from(&e))?;

    tracing::info!(
        event = "WriterInitialized",
        task_id = %task.id,
        format = %task.format,
        path = %artifact_path.display(),
        "format writer initialized"
    );

    let ingest_started = Instant::now();
    let mut batch_count = 0u64;

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return Err(shutdown_failure()),
            frame = frames.recv() => frame,
        };

        match frame {
            Some(IngestFrame::Batch(batch)) => {
                let batch_started = Instant::now();
                writer
                    .write_records(&batch.records)
                    .map_err(|e| PipelineFailure::from(&e))?;

                let records = batch.len() as u64;
                let total = task.record_progress(records);
                ctx.metrics.batch_processed(records);
                batch_count += 1;

                tracing::debug!(
                    event = "BatchProcessed",
                    task_id = %task.id,
                    batch_sequence = batch.batch_sequence,
                    records,
                    total_records = total,
                    duration_ms = batch_started.elapsed().as_millis() as u64,
                    "batch written"
                );
            }
            Some(IngestFrame::Eof) => break,
            // Sender dropped without a clean end-of-stream
            None => {
                return Err(PipelineFailure::new(
                    ErrorCode::StreamError,
                    "stream closed before end-of-stream",
                ));
            }
        }
    }

    tracing::debug!(
        task_id = %task.id,
        batch_count,
        duration_ms = ingest_started.elapsed().as_millis() as u64,
        "all batches received"
    );

    let file = writer.finalize().map_err(|e| PipelineFailure::from(&e))?;
    tracing::info!(
        event = "FileFinalized",
        task_id = %task.id,
        file_size = file.size_bytes,
        checksum = %file.checksum_hex,
        rows = file.row_count,
        "artifact finalized"
    );

    ctx.controller
        .mark_uploading(task, &file)
        .map_err(|e| PipelineFailure::new(ErrorCode::Internal, e.to_string()))?;

    if cancel.is_cancelled() {
        return Err(shutdown_failure());
    }

    let outcome = ctx
        .uploader
        .upload(&task.id, &file.path)
        .await
        .map_err(|e| PipelineFailure::new(ErrorCode::UploadError, e.to_string()))?;

    ctx.controller
        .mark_completed(task, &outcome)
        .map_err(|e| PipelineFailure::new(ErrorCode::Internal, e.to_string()))?;

    if let Err(e) = ctx.artifacts.release(&task.id) {
        if !e.is_not_found() {
            tracing::warn!(task_id = %task.id, error = %e, "artifact cleanup failed after upload");
        }
    }

    Ok(())
}

fn shutdown_failure() -> PipelineFailure {
    PipelineFailure::new(ErrorCode::Cancelled, "shutting down")
}

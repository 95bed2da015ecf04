//! Stream ingester
//!
//! Per-stream state machine:
//!
//! ```text
//! AwaitingMeta ──validate──> AwaitingBatches ──clean EOF──> Finalizing ──> Done
//!      │                          │                             │
//!      └── validation error      └── transport/protocol error ──┴──> Error
//! ```
//!
//! The metadata frame was already read by the connection handler; this
//! module validates it, creates and enqueues the task, then pumps batch
//! frames into the job's bounded channel in arrival order. The worker
//! drives the writer and the upload; the ingester's last act is writing
//! the terminal frame the worker hands back.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};

use fluxo_protocol::{ErrorCode, ErrorFrame, ExportMetadata, Frame};
use fluxo_task::{ExportJob, IngestFrame, FRAME_CHANNEL_DEPTH};

use crate::connection::{read_frame, write_frame};
use crate::error::Result;
use crate::ServerContext;

/// How the batch pump ended
enum PumpEnd {
    /// Client half-closed cleanly at a frame boundary
    CleanEof,
    /// A second metadata frame arrived mid-stream
    UnexpectedMetadata,
    /// A frame that has no business inside an export stream
    UnexpectedFrame,
    /// The worker dropped its receiver (task already failed)
    WorkerGone,
    /// Read or decode failure
    Transport(String),
}

/// Drive one export stream to its terminal frame
pub(crate) async fn run_export_stream(
    context: Arc<ServerContext>,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    mut buf: BytesMut,
    meta: ExportMetadata,
    peer_addr: SocketAddr,
) -> Result<()> {
    // AwaitingMeta: validate before any task exists
    if let Err(e) = meta.validate() {
        tracing::warn!(
            peer = %peer_addr,
            request_id = %meta.request_id,
            error = %e,
            "export metadata rejected"
        );
        return write_frame(
            &mut writer,
            &Frame::Error(ErrorFrame::new(ErrorCode::ValidationError, e.to_string())),
        )
        .await;
    }

    let task = context.controller.create(meta);
    tracing::info!(
        task_id = %task.id,
        peer = %peer_addr,
        format = %task.format,
        "export stream started"
    );

    let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_DEPTH);
    let (respond_tx, respond_rx) = oneshot::channel();
    let job = ExportJob::new(Arc::clone(&task), frames_rx, respond_tx);

    if let Err(e) = context.queue.enqueue(job, context.config.queue_timeout).await {
        context
            .controller
            .mark_failed(&task, ErrorCode::QueueTimeout, e.to_string());
        return write_frame(
            &mut writer,
            &Frame::Error(
                ErrorFrame::new(ErrorCode::QueueTimeout, e.to_string()).with_task_id(&*task.id),
            ),
        )
        .await;
    }

    tracing::info!(
        event = "TaskQueued",
        task_id = %task.id,
        free_slots = context.queue.free_slots(),
        "task queued for processing"
    );

    // AwaitingBatches: pump frames to the worker in arrival order
    let end = loop {
        match read_frame(&mut reader, &mut buf, context.config.max_frame_size).await {
            Ok(Some(Frame::Batch(batch))) => {
                if frames_tx.send(IngestFrame::Batch(batch)).await.is_err() {
                    break PumpEnd::WorkerGone;
                }
            }
            Ok(Some(Frame::Metadata(_))) => break PumpEnd::UnexpectedMetadata,
            Ok(Some(_)) => break PumpEnd::UnexpectedFrame,
            Ok(None) => break PumpEnd::CleanEof,
            Err(e) => break PumpEnd::Transport(e.to_string()),
        }
    };

    match end {
        PumpEnd::CleanEof => {
            // Worker may already be gone if the task failed; the terminal
            // frame below tells the client either way
            let _ = frames_tx.send(IngestFrame::Eof).await;
        }
        PumpEnd::WorkerGone => {}
        PumpEnd::UnexpectedMetadata => {
            tracing::warn!(task_id = %task.id, "unexpected metadata frame mid-stream");
        }
        PumpEnd::UnexpectedFrame => {
            tracing::warn!(task_id = %task.id, "unexpected frame type mid-stream");
        }
        PumpEnd::Transport(ref e) => {
            tracing::warn!(task_id = %task.id, error = %e, "stream transport error");
        }
    }

    // Dropping the sender without Eof sends the worker down the
    // stream-error path; after Eof it is a no-op
    drop(frames_tx);

    // Finalizing: the worker finishes the pipeline and hands back the
    // terminal response
    let frame = match respond_rx.await {
        Ok(response) => Frame::ExportResponse(response),
        // Job dropped before a worker ran it (shutdown)
        Err(_) => Frame::Error(
            ErrorFrame::new(ErrorCode::Cancelled, "server shutting down")
                .with_task_id(&*task.id),
        ),
    };

    write_frame(&mut writer, &frame).await
}

//! Export jobs
//!
//! The unit handed from the stream ingester to a worker: the task, a
//! bounded channel of ingest frames, and the oneshot the terminal
//! response travels back on.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use fluxo_protocol::{DataBatch, ExportResponse};

use crate::task::Task;

/// One hand-off from the stream reader to the worker
///
/// `Eof` marks the client's clean end-of-stream. A sender dropped
/// without `Eof` means the transport died mid-stream and the task takes
/// the stream-error path.
#[derive(Debug)]
pub enum IngestFrame {
    /// A batch of records, in arrival order
    Batch(DataBatch),
    /// Clean end-of-stream: finalize and upload
    Eof,
}

/// A queued export task plus its stream plumbing
#[derive(Debug)]
pub struct ExportJob {
    /// The task being driven
    pub task: Arc<Task>,

    /// Bounded frame channel fed by the stream ingester
    pub frames: mpsc::Receiver<IngestFrame>,

    /// Terminal response hand-back to the stream handler
    pub respond: oneshot::Sender<ExportResponse>,
}

impl ExportJob {
    pub fn new(
        task: Arc<Task>,
        frames: mpsc::Receiver<IngestFrame>,
        respond: oneshot::Sender<ExportResponse>,
    ) -> Self {
        Self {
            task,
            frames,
            respond,
        }
    }
}

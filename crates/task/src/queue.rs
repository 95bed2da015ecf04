//! Bounded admission queue
//!
//! FIFO channel of export jobs with an enqueue timeout. Workers share
//! one receiver behind an async mutex; dequeue order is channel order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::Mutex;

use crate::error::QueueError;
use crate::job::ExportJob;

/// Create a bounded task queue of the given capacity
pub fn task_queue(capacity: usize) -> (TaskQueue, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        TaskQueue { tx },
        JobReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer half: admission with timeout
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<ExportJob>,
}

impl TaskQueue {
    /// Enqueue a job, waiting up to `timeout` for a slot
    pub async fn enqueue(&self, job: ExportJob, timeout: Duration) -> Result<(), QueueError> {
        match self.tx.send_timeout(job, timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(QueueError::Timeout { timeout }),
            Err(SendTimeoutError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Slots currently free
    pub fn free_slots(&self) -> usize {
        self.tx.capacity()
    }

    /// Total capacity
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Consumer half, shared by the worker pool
#[derive(Clone)]
pub struct JobReceiver {
    rx: Arc<Mutex<mpsc::Receiver<ExportJob>>>,
}

impl JobReceiver {
    /// Wait for the next job; `None` once the queue is closed and drained
    pub async fn recv(&self) -> Option<ExportJob> {
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use fluxo_protocol::{
        ColumnSpec, DataType, ExportFormat, ExportMetadata, FormatOptions,
    };
    use tokio::sync::{mpsc as tokio_mpsc, oneshot};

    fn job() -> ExportJob {
        let task = Arc::new(Task::new(ExportMetadata {
            request_id: "r".into(),
            format: ExportFormat::Csv,
            filename: "a.csv".into(),
            columns: vec![ColumnSpec::new("A", DataType::String)],
            options: FormatOptions::default(),
        }));
        let (_frames_tx, frames_rx) = tokio_mpsc::channel(1);
        let (respond_tx, _respond_rx) = oneshot::channel();
        ExportJob::new(task, frames_rx, respond_tx)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (queue, receiver) = task_queue(4);

        let first = job();
        let first_id = first.task.id.clone();
        let second = job();
        let second_id = second.task.id.clone();

        queue.enqueue(first, Duration::from_secs(1)).await.unwrap();
        queue.enqueue(second, Duration::from_secs(1)).await.unwrap();

        assert_eq!(receiver.recv().await.unwrap().task.id, first_id);
        assert_eq!(receiver.recv().await.unwrap().task.id, second_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_timeout_when_full() {
        let (queue, _receiver) = task_queue(1);

        queue.enqueue(job(), Duration::from_millis(100)).await.unwrap();

        let err = queue
            .enqueue(job(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (queue, receiver) = task_queue(1);
        drop(receiver);

        let err = queue
            .enqueue(job(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Closed));
    }

    #[tokio::test]
    async fn test_capacity_accounting() {
        let (queue, receiver) = task_queue(2);
        assert_eq!(queue.capacity(), 2);
        assert_eq!(queue.free_slots(), 2);

        queue.enqueue(job(), Duration::from_secs(1)).await.unwrap();
        assert_eq!(queue.free_slots(), 1);

        receiver.recv().await.unwrap();
        assert_eq!(queue.free_slots(), 2);
    }
}

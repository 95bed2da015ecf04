//! Task core error types

use std::time::Duration;

use fluxo_protocol::TaskState;
use thiserror::Error;

/// Task state and registry errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// Transition not allowed by the lifecycle state machine
    #[error("illegal transition {from} → {to} for task {task_id}")]
    IllegalTransition {
        task_id: String,
        from: TaskState,
        to: TaskState,
    },

    /// Unknown task id
    #[error("task not found: {0}")]
    NotFound(String),
}

/// Admission queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// No slot became free within the enqueue timeout
    #[error("task queue is full, timed out after {timeout:?} waiting for a slot")]
    Timeout { timeout: Duration },

    /// Queue receiver dropped (shutdown)
    #[error("task queue is closed")]
    Closed,
}

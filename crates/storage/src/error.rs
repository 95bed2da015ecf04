//! Storage error types

use thiserror::Error;

/// Artifact store errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// No artifact tracked for the task
    #[error("no artifact for task: {task_id}")]
    NotFound { task_id: String },

    /// Root directory not usable
    #[error("storage root {path} not usable: {source}")]
    Root {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Write probe failed: out of space or bad permissions
    #[error("storage preflight failed: {0}")]
    Preflight(std::io::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Create a not-found error
    pub fn not_found(task_id: impl Into<String>) -> Self {
        Self::NotFound {
            task_id: task_id.into(),
        }
    }

    /// Whether this error just means the entry is unknown
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

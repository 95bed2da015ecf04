//! Writer error types

use fluxo_protocol::ErrorCode;
use thiserror::Error;

/// Errors raised by format writers
#[derive(Debug, Error)]
pub enum WriterError {
    /// Output path not creatable or options malformed
    #[error("failed to initialize writer: {0}")]
    Init(String),

    /// Contract violated: call out of order
    #[error("writer state error: {0}")]
    State(&'static str),

    /// Record rejected by the encoder (width mismatch, encoding failure)
    #[error("format error: {0}")]
    Format(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WriterError {
    /// Create an initialization error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Stable client-facing error code for this failure
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Init(_) => ErrorCode::WriterInit,
            Self::State(_) => ErrorCode::WriterState,
            Self::Format(_) => ErrorCode::WriterFormat,
            // Local filesystem trouble, not a data problem
            Self::Io(_) => ErrorCode::StorageError,
        }
    }
}

/// Result type for writer operations
pub type Result<T> = std::result::Result<T, WriterError>;

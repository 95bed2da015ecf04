//! Protocol error types
//!
//! Decode failures, metadata validation failures, and the stable error
//! codes surfaced to clients.

use std::str::FromStr;

use thiserror::Error;

/// Errors that can occur while decoding frames
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload is too short to contain required fields
    #[error("message too short: expected at least {expected} bytes, got {actual}")]
    MessageTooShort { expected: usize, actual: usize },

    /// Frame exceeds the maximum allowed size
    #[error("frame size {size} exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Unknown frame type discriminant
    #[error("unknown frame type: {0:#04x}")]
    UnknownFrameType(u8),

    /// Unknown export format discriminant
    #[error("unknown export format: {0}")]
    UnknownFormat(u8),

    /// Unknown column data type discriminant
    #[error("unknown data type: {0}")]
    UnknownDataType(u8),

    /// Unknown task state discriminant
    #[error("unknown task state: {0}")]
    UnknownState(u8),

    /// Unknown error code string
    #[error("unknown error code: {0}")]
    UnknownErrorCode(String),

    /// String field is not valid UTF-8
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
}

impl ProtocolError {
    /// Create a message too short error
    #[inline]
    pub fn too_short(expected: usize, actual: usize) -> Self {
        Self::MessageTooShort { expected, actual }
    }
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Metadata validation failures
///
/// Raised by [`ExportMetadata::validate`](crate::ExportMetadata::validate)
/// before any task is created.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// request_id is empty
    #[error("request_id is required")]
    MissingRequestId,

    /// filename is empty
    #[error("filename is required")]
    MissingFilename,

    /// No columns declared
    #[error("at least one column is required")]
    NoColumns,

    /// A column has an empty name
    #[error("column {0} name is required")]
    UnnamedColumn(usize),
}

/// Stable error codes surfaced to clients
///
/// The wire carries the SCREAMING_SNAKE string form; the set is fixed and
/// versioned with the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// First frame was not metadata, or the transport handed us garbage
    InvalidMetadata,
    /// Metadata failed validation
    ValidationError,
    /// Task queue was full past the enqueue timeout
    QueueTimeout,
    /// Artifact allocation or local filesystem failure
    StorageError,
    /// Writer could not be initialized
    WriterInit,
    /// Writer called out of order
    WriterState,
    /// Record rejected by the format encoder
    WriterFormat,
    /// Stream transport failure mid-export
    StreamError,
    /// Object-store upload failed after retries
    UploadError,
    /// Task interrupted by shutdown
    Cancelled,
    /// Unknown task id
    NotFound,
    /// Unclassified internal failure
    Internal,
}

impl ErrorCode {
    /// Stable string form used on the wire and in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidMetadata => "INVALID_METADATA",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::QueueTimeout => "QUEUE_TIMEOUT",
            Self::StorageError => "STORAGE_ERROR",
            Self::WriterInit => "WRITER_INIT",
            Self::WriterState => "WRITER_STATE",
            Self::WriterFormat => "WRITER_FORMAT",
            Self::StreamError => "STREAM_ERROR",
            Self::UploadError => "UPLOAD_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "INVALID_METADATA" => Ok(Self::InvalidMetadata),
            "VALIDATION_ERROR" => Ok(Self::ValidationError),
            "QUEUE_TIMEOUT" => Ok(Self::QueueTimeout),
            "STORAGE_ERROR" => Ok(Self::StorageError),
            "WRITER_INIT" => Ok(Self::WriterInit),
            "WRITER_STATE" => Ok(Self::WriterState),
            "WRITER_FORMAT" => Ok(Self::WriterFormat),
            "STREAM_ERROR" => Ok(Self::StreamError),
            "UPLOAD_ERROR" => Ok(Self::UploadError),
            "CANCELLED" => Ok(Self::Cancelled),
            "NOT_FOUND" => Ok(Self::NotFound),
            "INTERNAL" => Ok(Self::Internal),
            other => Err(ProtocolError::UnknownErrorCode(other.to_string())),
        }
    }
}

//! Object-store error types and retryability classification

use thiserror::Error;

/// Classification of an object-store failure
///
/// Drives the uploader's retry decision: transient kinds are retried up
/// to the configured budget, structural kinds fail immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Operation timed out
    Timeout,
    /// Network or transport failure
    Transport,
    /// Credentials rejected for this key
    AccessDenied,
    /// Target bucket does not exist
    NoSuchBucket,
    /// Request was malformed (bad key, bad part list, unknown upload id)
    InvalidRequest,
    /// Unclassified failure
    Other,
}

impl StoreErrorKind {
    /// Whether the uploader may retry after this failure
    ///
    /// Unclassified failures are treated as transient, matching the
    /// behavior of retrying SDK wrappers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport | Self::Other)
    }
}

/// An object-store operation failure
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Timeout, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Transport, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::AccessDenied, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::InvalidRequest, message)
    }

    /// Whether the uploader may retry after this failure
    #[inline]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        let kind = match e.kind() {
            std::io::ErrorKind::TimedOut => StoreErrorKind::Timeout,
            std::io::ErrorKind::PermissionDenied => StoreErrorKind::AccessDenied,
            _ => StoreErrorKind::Transport,
        };
        Self::new(kind, e.to_string())
    }
}

/// Uploader failures surfaced to the task pipeline
#[derive(Debug, Error)]
pub enum UploadError {
    /// Every allowed attempt failed with a retryable error
    #[error("upload failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// A non-retryable store failure; remaining retries were skipped
    #[error("upload failed: {0}")]
    Terminal(#[source] StoreError),

    /// Local artifact could not be read
    #[error("failed to read artifact: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StoreErrorKind::Timeout.is_retryable());
        assert!(StoreErrorKind::Transport.is_retryable());
        assert!(StoreErrorKind::Other.is_retryable());
        assert!(!StoreErrorKind::AccessDenied.is_retryable());
        assert!(!StoreErrorKind::NoSuchBucket.is_retryable());
        assert!(!StoreErrorKind::InvalidRequest.is_retryable());
    }

    #[test]
    fn test_io_error_mapping() {
        let e = StoreError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(e.kind, StoreErrorKind::AccessDenied);

        let e = StoreError::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert_eq!(e.kind, StoreErrorKind::Timeout);
    }
}

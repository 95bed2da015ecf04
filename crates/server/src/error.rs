//! Server error types

use thiserror::Error;

use fluxo_protocol::ProtocolError;

/// Export server errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind the listen address
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on a connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame from the client
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection closed in the middle of a frame
    #[error("connection closed mid-frame ({buffered} bytes buffered)")]
    TruncatedFrame { buffered: usize },
}

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

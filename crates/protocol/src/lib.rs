//! Fluxo - Protocol
//!
//! Frame types and wire codec for the export stream transport.
//!
//! # Wire Format
//!
//! All frames are length-prefixed:
//! ```text
//! ┌──────────────┬──────────────┬────────────────────────┐
//! │ 4 bytes      │ 1 byte       │ N bytes                │
//! │ length (BE)  │ frame type   │ payload                │
//! └──────────────┴──────────────┴────────────────────────┘
//! ```
//!
//! The length covers the frame type byte plus the payload.
//!
//! # Frame Types
//!
//! Client → Server:
//! - `Metadata` (0x01): opens an export stream with columns and options
//! - `Batch` (0x02): a group of records for the open stream
//! - `StatusRequest` (0x03): unary task status query
//!
//! Server → Client:
//! - `ExportResponse` (0x10): terminal export outcome
//! - `StatusResponse` (0x11): status query answer
//! - `Error` (0x12): error code + message, optionally with a task id
//!
//! End-of-stream is the client's clean write-side close; the server keeps
//! the read side open to deliver the terminal frame.

mod error;
mod state;
mod types;
mod wire;

pub use error::{ErrorCode, MetadataError, ProtocolError, Result};
pub use state::TaskState;
pub use types::{
    ColumnSpec, DataBatch, DataType, ErrorFrame, ExportFormat, ExportMetadata, ExportResponse,
    FormatOptions, Record, StatusRequest, StatusResponse,
};
pub use wire::{frame_length, Frame, LENGTH_PREFIX_SIZE};

/// Default maximum frame size accepted by the transport (16 MiB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

//! Fluxo - Writers
//!
//! Streaming format writers producing the local export artifact.
//!
//! # Contract
//!
//! Every writer is an incremental, append-only producer:
//!
//! ```text
//! initialize → write_header → write_records* → finalize
//!                                  └──(any error)──→ cleanup
//! ```
//!
//! - `write_header` must be called exactly once before any records
//! - every record's width must equal the declared column count
//! - in-flight buffering is bounded (64 KiB plus format-intrinsic state);
//!   writers flush to disk periodically so resident memory stays flat for
//!   arbitrarily long streams
//! - `finalize` flushes, closes, computes the SHA-256 of the final bytes
//!   and reports `FileMetadata`
//! - `cleanup` is best-effort: release handles, delete partial output
//!
//! # Available Writers
//!
//! | Writer | Format | Notes |
//! |--------|--------|-------|
//! | `CsvWriter` | RFC 4180 CSV | configurable delimiter, UTF-8 output |
//! | `WorkbookWriter` | XLSX | constant-memory row streaming |

mod checksum;
mod csv;
mod error;
mod workbook;

pub use checksum::sha256_file;
pub use error::{Result, WriterError};
pub use self::csv::CsvWriter;
pub use workbook::WorkbookWriter;

use std::path::{Path, PathBuf};

use fluxo_protocol::{ColumnSpec, ExportFormat, ExportMetadata, Record};

/// Flush to disk every this many rows
pub(crate) const FLUSH_EVERY_ROWS: u64 = 1000;

/// In-flight write buffer size (64 KiB)
pub(crate) const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Metadata describing a finalized artifact
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    /// Artifact location on the local filesystem
    pub path: PathBuf,

    /// Final size in bytes
    pub size_bytes: u64,

    /// Hex-encoded SHA-256 of the final bytes
    pub checksum_hex: String,

    /// Rows written, including the header row
    pub row_count: u64,
}

/// Streaming encoder for a single output format
///
/// Implementations own the file handle between `initialize` and
/// `finalize`/`cleanup`; the caller owns the path.
pub trait ExportWriter: Send {
    /// Prepare output at `output_path` using the stream header options
    fn initialize(&mut self, meta: &ExportMetadata, output_path: &Path) -> Result<()>;

    /// Write the header row; exactly once, before any records
    fn write_header(&mut self, columns: &[ColumnSpec]) -> Result<()>;

    /// Append records; each record's width must match the column count
    fn write_records(&mut self, records: &[Record]) -> Result<()>;

    /// Flush, close and checksum the artifact
    ///
    /// Not idempotent: a second call fails with a state error.
    fn finalize(&mut self) -> Result<FileMetadata>;

    /// Best-effort release of handles and removal of partial output
    fn cleanup(&mut self);
}

/// Construct the writer for a requested format
pub fn for_format(format: ExportFormat) -> Box<dyn ExportWriter> {
    match format {
        ExportFormat::Csv => Box::new(CsvWriter::new()),
        ExportFormat::Workbook => Box::new(WorkbookWriter::new()),
    }
}

/// Check that every record matches the declared column count
pub(crate) fn check_record_widths(records: &[Record], column_count: usize) -> Result<()> {
    for record in records {
        if record.values.len() != column_count {
            return Err(WriterError::Format(format!(
                "record has {} fields, expected {}",
                record.values.len(),
                column_count
            )));
        }
    }
    Ok(())
}

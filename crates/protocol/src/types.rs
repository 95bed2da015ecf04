//! Export message types
//!
//! The logical messages carried by the framed transport: the stream
//! header (`ExportMetadata`), record batches, and the response shapes.
//! Optional response fields use zero-value sentinels (empty string, 0,
//! or -1 for the ETA) rather than presence tags.

use crate::error::{MetadataError, ProtocolError};
use crate::state::TaskState;

/// Requested output format for an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// RFC 4180 tabular CSV
    Csv,
    /// Spreadsheet workbook (XLSX)
    Workbook,
}

impl ExportFormat {
    /// Stable name used in logs and responses
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Workbook => "WORKBOOK",
        }
    }

    pub(crate) fn to_wire(self) -> u8 {
        match self {
            Self::Csv => 1,
            Self::Workbook => 2,
        }
    }

    pub(crate) fn from_wire(v: u8) -> Result<Self, ProtocolError> {
        match v {
            1 => Ok(Self::Csv),
            2 => Ok(Self::Workbook),
            other => Err(ProtocolError::UnknownFormat(other)),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic type of a column
///
/// Informational for the CSV writer (everything is emitted as text);
/// the workbook writer may use it for cell formatting hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    Number,
    Date,
    Boolean,
}

impl DataType {
    pub(crate) fn to_wire(self) -> u8 {
        match self {
            Self::String => 1,
            Self::Number => 2,
            Self::Date => 3,
            Self::Boolean => 4,
        }
    }

    pub(crate) fn from_wire(v: u8) -> Result<Self, ProtocolError> {
        match v {
            1 => Ok(Self::String),
            2 => Ok(Self::Number),
            3 => Ok(Self::Date),
            4 => Ok(Self::Boolean),
            other => Err(ProtocolError::UnknownDataType(other)),
        }
    }
}

/// A single column declaration
///
/// Column order in the metadata is the field order of every subsequent
/// record.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Column name (non-empty), emitted in the header row
    pub name: String,

    /// Semantic type
    pub data_type: DataType,

    /// Display width hint (spreadsheet formats only), `None` = default
    pub width: Option<u32>,

    /// Display-format pattern hint, `None` = none
    pub format: Option<String>,
}

impl ColumnSpec {
    /// Create a plain column with no hints
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            width: None,
            format: None,
        }
    }
}

/// Format-specific options carried in the stream header
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOptions {
    /// CSV field delimiter (first byte is used)
    pub csv_delimiter: String,

    /// CSV output encoding
    pub csv_encoding: String,

    /// Workbook sheet name
    pub sheet_name: String,

    /// Workbook starting row (1-based)
    pub start_row: u32,

    /// Whether the client asked for compressed output
    ///
    /// Accepted and recorded; no writer currently applies it.
    pub compression_enabled: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            csv_delimiter: ",".into(),
            csv_encoding: "UTF-8".into(),
            sheet_name: "Sheet1".into(),
            start_row: 1,
            compression_enabled: false,
        }
    }
}

/// The stream header: everything needed to start an export task
#[derive(Debug, Clone, PartialEq)]
pub struct ExportMetadata {
    /// Client-chosen trace id
    pub request_id: String,

    /// Requested output format
    pub format: ExportFormat,

    /// Requested base filename (sanitized server-side)
    pub filename: String,

    /// Column declarations, in record field order
    pub columns: Vec<ColumnSpec>,

    /// Format-specific options
    pub options: FormatOptions,
}

impl ExportMetadata {
    /// Validate the header before any task is created
    ///
    /// Mirrors the admission rules of the stream ingester: non-empty
    /// request id and filename, at least one column, every column named.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.request_id.is_empty() {
            return Err(MetadataError::MissingRequestId);
        }
        if self.filename.is_empty() {
            return Err(MetadataError::MissingFilename);
        }
        if self.columns.is_empty() {
            return Err(MetadataError::NoColumns);
        }
        for (i, col) in self.columns.iter().enumerate() {
            if col.name.is_empty() {
                return Err(MetadataError::UnnamedColumn(i));
            }
        }
        Ok(())
    }

    /// Number of declared columns
    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// One exported row: stringified field values in column order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Field values; length must equal the declared column count
    pub values: Vec<String>,
}

impl Record {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }
}

impl From<Vec<String>> for Record {
    fn from(values: Vec<String>) -> Self {
        Self { values }
    }
}

impl From<Vec<&str>> for Record {
    fn from(values: Vec<&str>) -> Self {
        Self {
            values: values.into_iter().map(String::from).collect(),
        }
    }
}

/// A contiguous group of records delivered in one stream frame
#[derive(Debug, Clone, PartialEq)]
pub struct DataBatch {
    /// Monotonic sequence number, informational (diagnostics only)
    pub batch_sequence: i64,

    /// Records in delivery order
    pub records: Vec<Record>,
}

impl DataBatch {
    pub fn new(batch_sequence: i64, records: Vec<Record>) -> Self {
        Self {
            batch_sequence,
            records,
        }
    }

    /// Number of records in the batch
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch carries no records
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Terminal response sent after finalize or failure
#[derive(Debug, Clone, PartialEq)]
pub struct ExportResponse {
    pub task_id: String,
    pub status: TaskState,
    /// Signed download URL; empty unless Completed
    pub oss_url: String,
    /// Final artifact size; 0 until finalized
    pub file_size_bytes: u64,
    /// Rows written including the header row
    pub record_count: u64,
    pub progress_percent: f32,
    /// Hex SHA-256 of the artifact; empty until finalized
    pub checksum_sha256: String,
    /// Stable error code; empty unless Failed
    pub error_code: String,
    pub error_message: String,
    /// Unix seconds
    pub started_at: i64,
    /// Unix seconds; 0 until a terminal state is reached
    pub completed_at: i64,
}

/// Unary task status query
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRequest {
    pub task_id: String,
}

/// Status query answer: a consistent snapshot of one task
#[derive(Debug, Clone, PartialEq)]
pub struct StatusResponse {
    pub task_id: String,
    pub status: TaskState,
    pub format: ExportFormat,
    pub filename: String,
    pub records_processed: u64,
    pub progress_percent: f32,
    /// Signed download URL; empty unless Completed
    pub oss_url: String,
    pub file_size_bytes: u64,
    /// Stable error code; empty unless Failed
    pub error_code: String,
    pub error_message: String,
    /// Unix seconds
    pub started_at: i64,
    /// Unix seconds; 0 until a terminal state is reached
    pub completed_at: i64,
    /// Advisory ETA in seconds; -1 when there is not enough data
    pub estimated_seconds_remaining: i64,
}

/// Error frame payload
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorFrame {
    pub code: crate::ErrorCode,
    pub message: String,
    /// Task id when one was created before the failure; empty otherwise
    pub task_id: String,
}

impl ErrorFrame {
    pub fn new(code: crate::ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            task_id: String::new(),
        }
    }

    /// Attach the task id the error refers to
    #[must_use]
    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }
}

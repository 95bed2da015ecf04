//! CSV writer
//!
//! RFC 4180 output: fields containing the delimiter, CR, LF or a double
//! quote are quoted, embedded quotes are doubled. The delimiter is
//! configurable (first byte of the option string, comma by default);
//! output is always UTF-8. Rows are pushed through a 64 KiB buffer and
//! flushed every 1000 rows so resident memory stays bounded.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ::csv::WriterBuilder;
use fluxo_protocol::{ColumnSpec, ExportMetadata, Record};

use crate::error::{Result, WriterError};
use crate::{check_record_widths, ExportWriter, FileMetadata, FLUSH_EVERY_ROWS, WRITE_BUFFER_SIZE};

/// Streaming CSV writer
pub struct CsvWriter {
    inner: Option<::csv::Writer<BufWriter<File>>>,
    output_path: Option<PathBuf>,
    delimiter: u8,
    column_count: usize,
    header_written: bool,
    row_count: u64,
}

impl CsvWriter {
    /// Create an uninitialized CSV writer with default options
    pub fn new() -> Self {
        Self {
            inner: None,
            output_path: None,
            delimiter: b',',
            column_count: 0,
            header_written: false,
            row_count: 0,
        }
    }

    fn writer(&mut self) -> Result<&mut ::csv::Writer<BufWriter<File>>> {
        self.inner
            .as_mut()
            .ok_or(WriterError::State("writer not initialized"))
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportWriter for CsvWriter {
    fn initialize(&mut self, meta: &ExportMetadata, output_path: &Path) -> Result<()> {
        if self.inner.is_some() {
            return Err(WriterError::State("writer already initialized"));
        }

        if let Some(&b) = meta.options.csv_delimiter.as_bytes().first() {
            self.delimiter = b;
        }

        let file = File::create(output_path)
            .map_err(|e| WriterError::init(format!("create {}: {e}", output_path.display())))?;
        let buffered = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

        self.inner = Some(
            WriterBuilder::new()
                .delimiter(self.delimiter)
                .from_writer(buffered),
        );
        self.output_path = Some(output_path.to_path_buf());
        self.column_count = meta.column_count();

        Ok(())
    }

    fn write_header(&mut self, columns: &[ColumnSpec]) -> Result<()> {
        if self.header_written {
            return Err(WriterError::State("header already written"));
        }

        self.column_count = columns.len();
        let writer = self.writer()?;
        writer
            .write_record(columns.iter().map(|c| c.name.as_str()))
            .map_err(|e| WriterError::Format(format!("write header: {e}")))?;

        self.header_written = true;
        self.row_count += 1;
        Ok(())
    }

    fn write_records(&mut self, records: &[Record]) -> Result<()> {
        if self.inner.is_none() {
            return Err(WriterError::State("writer not initialized"));
        }
        if !self.header_written {
            return Err(WriterError::State("header not written"));
        }

        check_record_widths(records, self.column_count)?;

        let column_count = self.column_count;
        let writer = self.writer()?;
        for record in records {
            debug_assert_eq!(record.values.len(), column_count);
            writer
                .write_record(&record.values)
                .map_err(|e| WriterError::Format(format!("write record: {e}")))?;
        }
        self.row_count += records.len() as u64;

        if self.row_count % FLUSH_EVERY_ROWS < records.len() as u64 {
            self.writer()?.flush()?;
        }

        Ok(())
    }

    fn finalize(&mut self) -> Result<FileMetadata> {
        let writer = self
            .inner
            .take()
            .ok_or(WriterError::State("writer not initialized"))?;
        let path = self
            .output_path
            .clone()
            .ok_or(WriterError::State("writer not initialized"))?;

        let mut buffered = writer
            .into_inner()
            .map_err(|e| WriterError::Format(format!("flush csv writer: {e}")))?;
        buffered.flush()?;
        let file = buffered
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        file.sync_all()?;
        drop(file);

        let size_bytes = std::fs::metadata(&path)?.len();
        let checksum_hex = crate::sha256_file(&path)?;

        Ok(FileMetadata {
            path,
            size_bytes,
            checksum_hex,
            row_count: self.row_count,
        })
    }

    fn cleanup(&mut self) {
        // Dropping the writer closes the handle; flush failures are moot here
        self.inner = None;

        if let Some(path) = self.output_path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %path.display(), error = %e, "failed to remove partial csv output");
                }
            }
        }
    }
}

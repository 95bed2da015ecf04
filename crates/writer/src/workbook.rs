//! Workbook (XLSX) writer
//!
//! Streams rows into a constant-memory worksheet: finished rows are
//! spilled to a temporary file by the underlying library instead of being
//! held in an in-memory workbook, so arbitrarily long exports stay within
//! the writer memory bound. Sheet name and 1-based starting row come from
//! the stream options; column width hints are applied from the column
//! declarations.

use std::path::{Path, PathBuf};

use fluxo_protocol::{ColumnSpec, ExportMetadata, Record};
use rust_xlsxwriter::Workbook;

use crate::error::{Result, WriterError};
use crate::{check_record_widths, ExportWriter, FileMetadata};

/// Streaming workbook writer
pub struct WorkbookWriter {
    workbook: Option<Workbook>,
    output_path: Option<PathBuf>,
    sheet_name: String,
    /// 0-based index of the next row to write
    current_row: u32,
    column_count: usize,
    header_written: bool,
    row_count: u64,
}

impl WorkbookWriter {
    /// Create an uninitialized workbook writer with default options
    pub fn new() -> Self {
        Self {
            workbook: None,
            output_path: None,
            sheet_name: "Sheet1".into(),
            current_row: 0,
            column_count: 0,
            header_written: false,
            row_count: 0,
        }
    }
}

impl Default for WorkbookWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportWriter for WorkbookWriter {
    fn initialize(&mut self, meta: &ExportMetadata, output_path: &Path) -> Result<()> {
        if self.workbook.is_some() {
            return Err(WriterError::State("writer already initialized"));
        }

        if !meta.options.sheet_name.is_empty() {
            self.sheet_name = meta.options.sheet_name.clone();
        }
        if meta.options.start_row > 0 {
            self.current_row = meta.options.start_row - 1;
        }

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet_with_constant_memory();
        worksheet
            .set_name(&self.sheet_name)
            .map_err(|e| WriterError::init(format!("sheet name: {e}")))?;

        self.workbook = Some(workbook);
        self.output_path = Some(output_path.to_path_buf());
        self.column_count = meta.column_count();

        Ok(())
    }

    fn write_header(&mut self, columns: &[ColumnSpec]) -> Result<()> {
        if self.header_written {
            return Err(WriterError::State("header already written"));
        }
        let workbook = self
            .workbook
            .as_mut()
            .ok_or(WriterError::State("writer not initialized"))?;
        let worksheet = workbook
            .worksheet_from_index(0)
            .map_err(|e| WriterError::Format(e.to_string()))?;

        for (i, col) in columns.iter().enumerate() {
            if let Some(width) = col.width {
                worksheet
                    .set_column_width(i as u16, width as f64)
                    .map_err(|e| WriterError::Format(format!("column width: {e}")))?;
            }
        }
        for (i, col) in columns.iter().enumerate() {
            worksheet
                .write_string(self.current_row, i as u16, &col.name)
                .map_err(|e| WriterError::Format(format!("write header: {e}")))?;
        }

        self.column_count = columns.len();
        self.current_row += 1;
        self.row_count += 1;
        self.header_written = true;
        Ok(())
    }

    fn write_records(&mut self, records: &[Record]) -> Result<()> {
        if !self.header_written {
            return Err(WriterError::State("header not written"));
        }

        check_record_widths(records, self.column_count)?;

        let workbook = self
            .workbook
            .as_mut()
            .ok_or(WriterError::State("writer not initialized"))?;
        let worksheet = workbook
            .worksheet_from_index(0)
            .map_err(|e| WriterError::Format(e.to_string()))?;

        for record in records {
            for (i, value) in record.values.iter().enumerate() {
                worksheet
                    .write_string(self.current_row, i as u16, value)
                    .map_err(|e| WriterError::Format(format!("write record: {e}")))?;
            }
            self.current_row += 1;
        }
        self.row_count += records.len() as u64;

        Ok(())
    }

    fn finalize(&mut self) -> Result<FileMetadata> {
        let mut workbook = self
            .workbook
            .take()
            .ok_or(WriterError::State("writer not initialized"))?;
        let path = self
            .output_path
            .clone()
            .ok_or(WriterError::State("writer not initialized"))?;

        workbook
            .save(&path)
            .map_err(|e| WriterError::Format(format!("save workbook: {e}")))?;
        drop(workbook);

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
        self.workbook = None;

        if let Some(path) = self.output_path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %path.display(), error = %e, "failed to remove partial workbook output");
                }
            }
        }
    }
}

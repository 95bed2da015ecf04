//! Frame codec
//!
//! Length-prefixed binary encoding of the export protocol frames. The
//! format is deliberately simple (no schema compiler) so non-Rust clients
//! can implement it from this file alone.
//!
//! Scalars are big-endian. Strings are `[u32 length][UTF-8 bytes]`.
//! Optional fields use zero-value sentinels: empty string, width 0, or
//! -1 for the status ETA.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};
use crate::state::TaskState;
use crate::types::{
    ColumnSpec, DataBatch, DataType, ErrorFrame, ExportFormat, ExportMetadata, ExportResponse,
    FormatOptions, Record, StatusRequest, StatusResponse,
};

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Frame type discriminants
const FRAME_METADATA: u8 = 0x01;
const FRAME_BATCH: u8 = 0x02;
const FRAME_STATUS_REQUEST: u8 = 0x03;
const FRAME_EXPORT_RESPONSE: u8 = 0x10;
const FRAME_STATUS_RESPONSE: u8 = 0x11;
const FRAME_ERROR: u8 = 0x12;

/// A complete protocol frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Client → Server: opens an export stream
    Metadata(ExportMetadata),
    /// Client → Server: a group of records
    Batch(DataBatch),
    /// Client → Server: unary status query
    StatusRequest(StatusRequest),
    /// Server → Client: terminal export outcome
    ExportResponse(ExportResponse),
    /// Server → Client: status query answer
    StatusResponse(StatusResponse),
    /// Server → Client: error with stable code
    Error(ErrorFrame),
}

/// Peek at the next frame length in a read buffer
///
/// Returns:
/// - `Ok(Some(len))` if a complete frame is buffered (`len` = type byte +
///   payload, not including the prefix)
/// - `Ok(None)` if more data is needed
/// - `Err` if the declared length exceeds `max`
#[inline]
pub fn frame_length(buf: &[u8], max: usize) -> Result<Option<usize>> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > max {
        return Err(ProtocolError::FrameTooLarge { size: len, max });
    }
    if buf.len() < LENGTH_PREFIX_SIZE + len {
        return Ok(None);
    }
    Ok(Some(len))
}

impl Frame {
    /// Encode the frame to bytes, length prefix included
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(256);

        // Reserve space for the length prefix (filled in at the end)
        buf.put_u32(0);

        match self {
            Frame::Metadata(meta) => {
                buf.put_u8(FRAME_METADATA);
                encode_metadata(meta, &mut buf);
            }
            Frame::Batch(batch) => {
                buf.put_u8(FRAME_BATCH);
                encode_batch(batch, &mut buf);
            }
            Frame::StatusRequest(req) => {
                buf.put_u8(FRAME_STATUS_REQUEST);
                put_string(&mut buf, &req.task_id);
            }
            Frame::ExportResponse(resp) => {
                buf.put_u8(FRAME_EXPORT_RESPONSE);
                encode_export_response(resp, &mut buf);
            }
            Frame::StatusResponse(resp) => {
                buf.put_u8(FRAME_STATUS_RESPONSE);
                encode_status_response(resp, &mut buf);
            }
            Frame::Error(err) => {
                buf.put_u8(FRAME_ERROR);
                put_string(&mut buf, err.code.as_str());
                put_string(&mut buf, &err.message);
                put_string(&mut buf, &err.task_id);
            }
        }

        // Length excludes the 4-byte prefix itself
        let len = (buf.len() - LENGTH_PREFIX_SIZE) as u32;
        buf[0..LENGTH_PREFIX_SIZE].copy_from_slice(&len.to_be_bytes());

        buf.freeze()
    }

    /// Decode a frame from its payload (after the length prefix)
    pub fn decode(mut buf: Bytes) -> Result<Self> {
        ensure(&buf, 1)?;
        let frame_type = buf.get_u8();

        match frame_type {
            FRAME_METADATA => Ok(Frame::Metadata(decode_metadata(&mut buf)?)),
            FRAME_BATCH => Ok(Frame::Batch(decode_batch(&mut buf)?)),
            FRAME_STATUS_REQUEST => Ok(Frame::StatusRequest(StatusRequest {
                task_id: get_string(&mut buf)?,
            })),
            FRAME_EXPORT_RESPONSE => Ok(Frame::ExportResponse(decode_export_response(&mut buf)?)),
            FRAME_STATUS_RESPONSE => Ok(Frame::StatusResponse(decode_status_response(&mut buf)?)),
            FRAME_ERROR => {
                let code = get_string(&mut buf)?.parse()?;
                let message = get_string(&mut buf)?;
                let task_id = get_string(&mut buf)?;
                Ok(Frame::Error(ErrorFrame {
                    code,
                    message,
                    task_id,
                }))
            }
            other => Err(ProtocolError::UnknownFrameType(other)),
        }
    }
}

// =============================================================================
// Per-message encoders/decoders
// =============================================================================

fn encode_metadata(meta: &ExportMetadata, buf: &mut BytesMut) {
    put_string(buf, &meta.request_id);
    buf.put_u8(meta.format.to_wire());
    put_string(buf, &meta.filename);

    buf.put_u32(meta.columns.len() as u32);
    for col in &meta.columns {
        put_string(buf, &col.name);
        buf.put_u8(col.data_type.to_wire());
        buf.put_u32(col.width.unwrap_or(0));
        put_string(buf, col.format.as_deref().unwrap_or(""));
    }

    let opts = &meta.options;
    put_string(buf, &opts.csv_delimiter);
    put_string(buf, &opts.csv_encoding);
    put_string(buf, &opts.sheet_name);
    buf.put_u32(opts.start_row);
    buf.put_u8(opts.compression_enabled as u8);
}

fn decode_metadata(buf: &mut Bytes) -> Result<ExportMetadata> {
    let request_id = get_string(buf)?;
    ensure(buf, 1)?;
    let format = ExportFormat::from_wire(buf.get_u8())?;
    let filename = get_string(buf)?;

    ensure(buf, 4)?;
    let column_count = buf.get_u32() as usize;
    let mut columns = Vec::with_capacity(column_count.min(1024));
    for _ in 0..column_count {
        let name = get_string(buf)?;
        ensure(buf, 5)?;
        let data_type = DataType::from_wire(buf.get_u8())?;
        let width = match buf.get_u32() {
            0 => None,
            w => Some(w),
        };
        let format = match get_string(buf)? {
            s if s.is_empty() => None,
            s => Some(s),
        };
        columns.push(ColumnSpec {
            name,
            data_type,
            width,
            format,
        });
    }

    let csv_delimiter = get_string(buf)?;
    let csv_encoding = get_string(buf)?;
    let sheet_name = get_string(buf)?;
    ensure(buf, 5)?;
    let start_row = buf.get_u32();
    let compression_enabled = buf.get_u8() != 0;

    Ok(ExportMetadata {
        request_id,
        format,
        filename,
        columns,
        options: FormatOptions {
            csv_delimiter,
            csv_encoding,
            sheet_name,
            start_row,
            compression_enabled,
        },
    })
}

fn encode_batch(batch: &DataBatch, buf: &mut BytesMut) {
    buf.put_i64(batch.batch_sequence);
    buf.put_u32(batch.records.len() as u32);
    for record in &batch.records {
        buf.put_u32(record.values.len() as u32);
        for value in &record.values {
            put_string(buf, value);
        }
    }
}

fn decode_batch(buf: &mut Bytes) -> Result<DataBatch> {
    ensure(buf, 12)?;
    let batch_sequence = buf.get_i64();
    let record_count = buf.get_u32() as usize;

    let mut records = Vec::with_capacity(record_count.min(65_536));
    for _ in 0..record_count {
        ensure(buf, 4)?;
        let value_count = buf.get_u32() as usize;
        let mut values = Vec::with_capacity(value_count.min(1024));
        for _ in 0..value_count {
            values.push(get_string(buf)?);
        }
        records.push(Record { values });
    }

    Ok(DataBatch {
        batch_sequence,
        records,
    })
}

fn encode_export_response(resp: &ExportResponse, buf: &mut BytesMut) {
    put_string(buf, &resp.task_id);
    buf.put_u8(resp.status.to_wire());
    put_string(buf, &resp.oss_url);
    buf.put_u64(resp.file_size_bytes);
    buf.put_u64(resp.record_count);
    buf.put_f32(resp.progress_percent);
    put_string(buf, &resp.checksum_sha256);
    put_string(buf, &resp.error_code);
    put_string(buf, &resp.error_message);
    buf.put_i64(resp.started_at);
    buf.put_i64(resp.completed_at);
}

fn decode_export_response(buf: &mut Bytes) -> Result<ExportResponse> {
    let task_id = get_string(buf)?;
    ensure(buf, 1)?;
    let status = TaskState::from_wire(buf.get_u8())?;
    let oss_url = get_string(buf)?;
    ensure(buf, 20)?;
    let file_size_bytes = buf.get_u64();
    let record_count = buf.get_u64();
    let progress_percent = buf.get_f32();
    let checksum_sha256 = get_string(buf)?;
    let error_code = get_string(buf)?;
    let error_message = get_string(buf)?;
    ensure(buf, 16)?;
    let started_at = buf.get_i64();
    let completed_at = buf.get_i64();

    Ok(ExportResponse {
        task_id,
        status,
        oss_url,
        file_size_bytes,
        record_count,
        progress_percent,
        checksum_sha256,
        error_code,
        error_message,
        started_at,
        completed_at,
    })
}

fn encode_status_response(resp: &StatusResponse, buf: &mut BytesMut) {
    put_string(buf, &resp.task_id);
    buf.put_u8(resp.status.to_wire());
    buf.put_u8(resp.format.to_wire());
    put_string(buf, &resp.filename);
    buf.put_u64(resp.records_processed);
    buf.put_f32(resp.progress_percent);
    put_string(buf, &resp.oss_url);
    buf.put_u64(resp.file_size_bytes);
    put_string(buf, &resp.error_code);
    put_string(buf, &resp.error_message);
    buf.put_i64(resp.started_at);
    buf.put_i64(resp.completed_at);
    buf.put_i64(resp.estimated_seconds_remaining);
}

fn decode_status_response(buf: &mut Bytes) -> Result<StatusResponse> {
    let task_id = get_string(buf)?;
    ensure(buf, 2)?;
    let status = TaskState::from_wire(buf.get_u8())?;
    let format = ExportFormat::from_wire(buf.get_u8())?;
    let filename = get_string(buf)?;
    ensure(buf, 12)?;
    let records_processed = buf.get_u64();
    let progress_percent = buf.get_f32();
    let oss_url = get_string(buf)?;
    ensure(buf, 8)?;
    let file_size_bytes = buf.get_u64();
    let error_code = get_string(buf)?;
    let error_message = get_string(buf)?;
    ensure(buf, 24)?;
    let started_at = buf.get_i64();
    let completed_at = buf.get_i64();
    let estimated_seconds_remaining = buf.get_i64();

    Ok(StatusResponse {
        task_id,
        status,
        format,
        filename,
        records_processed,
        progress_percent,
        oss_url,
        file_size_bytes,
        error_code,
        error_message,
        started_at,
        completed_at,
        estimated_seconds_remaining,
    })
}

// =============================================================================
// Primitive helpers
// =============================================================================

/// Check that at least `n` bytes remain in the buffer
#[inline]
fn ensure(buf: &Bytes, n: usize) -> Result<()> {
    if buf.remaining() < n {
        return Err(ProtocolError::too_short(n, buf.remaining()));
    }
    Ok(())
}

/// Write a length-prefixed UTF-8 string
#[inline]
fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

/// Read a length-prefixed UTF-8 string
fn get_string(buf: &mut Bytes) -> Result<String> {
    ensure(buf, 4)?;
    let len = buf.get_u32() as usize;
    ensure(buf, len)?;
    let bytes = buf.split_to(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

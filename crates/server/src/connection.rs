//! Per-connection frame handling
//!
//! Reads the first frame to decide what the connection is: an export
//! stream (handed to the ingester) or a unary status query.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use fluxo_protocol::{frame_length, ErrorCode, ErrorFrame, Frame, LENGTH_PREFIX_SIZE};

use crate::error::{Result, ServerError};
use crate::ingest;
use crate::ServerContext;

/// Handle one accepted connection
pub(crate) async fn handle(
    context: Arc<ServerContext>,
    stream: TcpStream,
    peer_addr: SocketAddr,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = BytesMut::with_capacity(context.config.read_buffer_size);

    let first = match read_frame(&mut reader, &mut buf, context.config.max_frame_size).await? {
        Some(frame) => frame,
        // Connected and closed without sending anything
        None => return Ok(()),
    };

    match first {
        Frame::Metadata(meta) => {
            context.metrics.stream_started();
            ingest::run_export_stream(context, reader, writer, buf, meta, peer_addr).await
        }
        Frame::StatusRequest(request) => {
            context.metrics.status_query();
            tracing::info!(
                event = "StatusQueried",
                task_id = %request.task_id,
                peer = %peer_addr,
                "task status query received"
            );

            let frame = match context.controller.registry().project(&request.task_id) {
                Some(status) => Frame::StatusResponse(status),
                None => Frame::Error(
                    ErrorFrame::new(
                        ErrorCode::NotFound,
                        format!("task not found: {}", request.task_id),
                    )
                    .with_task_id(request.task_id),
                ),
            };
            write_frame(&mut writer, &frame).await
        }
        _ => {
            write_frame(
                &mut writer,
                &Frame::Error(ErrorFrame::new(
                    ErrorCode::InvalidMetadata,
                    "first frame must carry export metadata or a status request",
                )),
            )
            .await
        }
    }
}

/// Read one complete frame from the connection
///
/// Returns `Ok(None)` on a clean close at a frame boundary. A close in
/// the middle of a frame is a transport error.
pub(crate) async fn read_frame(
    reader: &mut OwnedReadHalf,
    buf: &mut BytesMut,
    max_frame_size: usize,
) -> Result<Option<Frame>> {
    loop {
        if let Some(len) = frame_length(buf, max_frame_size)? {
            let mut frame_bytes = buf.split_to(LENGTH_PREFIX_SIZE + len);
            frame_bytes.advance(LENGTH_PREFIX_SIZE);
            return Ok(Some(Frame::decode(frame_bytes.freeze())?));
        }

        if reader.read_buf(buf).await? == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(ServerError::TruncatedFrame {
                buffered: buf.len(),
            });
        }
    }
}

/// Write one frame to the connection
pub(crate) async fn write_frame(writer: &mut OwnedWriteHalf, frame: &Frame) -> Result<()> {
    writer.write_all(&frame.encode()).await?;
    writer.flush().await?;
    Ok(())
}

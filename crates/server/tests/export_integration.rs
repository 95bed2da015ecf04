//! End-to-end export server tests over localhost TCP
//!
//! Full stack: TCP transport, ingester, worker pool, real writers and a
//! filesystem object store.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use fluxo_protocol::{
    frame_length, ColumnSpec, DataBatch, DataType, ErrorCode, ExportFormat, ExportMetadata,
    Frame, FormatOptions, Record, StatusRequest, TaskState, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE,
};
use fluxo_server::{ExportServer, ExportServerConfig};
use fluxo_storage::ArtifactStore;
use fluxo_store::{FsObjectStore, ObjectStore, UploadConfig, Uploader};
use fluxo_task::{
    task_queue, LifecycleController, TaskMetrics, TaskRegistry, WorkerContext, WorkerPool,
};

struct TestServer {
    addr: SocketAddr,
    objects_root: PathBuf,
    cancel: CancellationToken,
    _artifact_dir: TempDir,
    _objects_dir: TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn start_server(workers: usize, queue_size: usize) -> TestServer {
    let artifact_dir = TempDir::new().unwrap();
    let objects_dir = TempDir::new().unwrap();

    let registry = Arc::new(TaskRegistry::new());
    let artifacts = Arc::new(ArtifactStore::new(artifact_dir.path()).unwrap());
    let metrics = Arc::new(TaskMetrics::new());
    let controller = Arc::new(LifecycleController::new(
        Arc::clone(&registry),
        Arc::clone(&artifacts),
        Arc::clone(&metrics),
    ));

    let store = Arc::new(FsObjectStore::new(objects_dir.path(), "https://files.test/dl").unwrap());
    let uploader = Arc::new(Uploader::new(
        store as Arc<dyn ObjectStore>,
        UploadConfig::default(),
    ));

    let (queue, receiver) = task_queue(queue_size);
    let cancel = CancellationToken::new();

    let _pool = WorkerPool::spawn(
        workers,
        receiver,
        WorkerContext {
            controller: Arc::clone(&controller),
            artifacts,
            uploader,
            metrics,
        },
        cancel.clone(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ExportServerConfig {
        address: "127.0.0.1".into(),
        port: 0,
        queue_timeout: Duration::from_secs(5),
        ..ExportServerConfig::default()
    };
    let server = ExportServer::new(config, controller, queue);
    tokio::spawn(server.run_on(listener, cancel.clone()));

    TestServer {
        addr,
        objects_root: objects_dir.path().to_path_buf(),
        cancel,
        _artifact_dir: artifact_dir,
        _objects_dir: objects_dir,
    }
}

/// Send frames, half-close, and collect every response frame
async fn roundtrip(addr: SocketAddr, frames: &[Frame]) -> Vec<Frame> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    for frame in frames {
        stream.write_all(&frame.encode()).await.unwrap();
    }
    stream.shutdown().await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();

    let mut responses = Vec::new();
    let mut rest = raw.as_slice();
    while let Some(len) = frame_length(rest, MAX_FRAME_SIZE).unwrap() {
        let payload = &rest[LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + len];
        responses.push(Frame::decode(bytes::Bytes::copy_from_slice(payload)).unwrap());
        rest = &rest[LENGTH_PREFIX_SIZE + len..];
    }
    responses
}

fn csv_metadata(columns: Vec<ColumnSpec>, options: FormatOptions) -> ExportMetadata {
    ExportMetadata {
        request_id: "it-req".into(),
        format: ExportFormat::Csv,
        filename: "users.csv".into(),
        columns,
        options,
    }
}

/// Find the single published object under `exports/` in the store root
fn find_published(root: &Path) -> Option<PathBuf> {
    fn walk(dir: &Path, found: &mut Vec<PathBuf>) {
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, found);
                } else {
                    found.push(path);
                }
            }
        }
    }

    let mut found = Vec::new();
    walk(&root.join("exports"), &mut found);
    assert!(found.len() <= 1, "expected at most one object, got {found:?}");
    found.pop()
}

#[tokio::test]
async fn test_small_csv_export() {
    let server = start_server(2, 4).await;

    let meta = csv_metadata(
        vec![
            ColumnSpec::new("ID", DataType::Number),
            ColumnSpec::new("Name", DataType::String),
            ColumnSpec::new("Email", DataType::String),
        ],
        FormatOptions::default(),
    );
    let batch = DataBatch::new(
        1,
        vec![
            Record::from(vec!["1", "Alice", "alice@example.com"]),
            Record::from(vec!["2", "Bob", "bob@example.com"]),
            Record::from(vec!["3", "Charlie", "charlie@example.com"]),
        ],
    );

    let responses = roundtrip(
        server.addr,
        &[Frame::Metadata(meta), Frame::Batch(batch)],
    )
    .await;

    assert_eq!(responses.len(), 1);
    let Frame::ExportResponse(response) = &responses[0] else {
        panic!("unexpected frame: {:?}", responses[0]);
    };

    assert_eq!(response.status, TaskState::Completed);
    assert_eq!(response.record_count, 4);
    assert_eq!(response.progress_percent, 100.0);
    assert!(!response.oss_url.is_empty());
    assert_eq!(response.checksum_sha256.len(), 64);
    assert!(response.error_code.is_empty());

    let object = find_published(&server.objects_root).expect("object published");
    assert_eq!(
        std::fs::read(object).unwrap(),
        b"ID,Name,Email\n1,Alice,alice@example.com\n2,Bob,bob@example.com\n3,Charlie,charlie@example.com\n"
    );
}

#[tokio::test]
async fn test_tab_delimiter() {
    let server = start_server(1, 4).await;

    let meta = csv_metadata(
        vec![
            ColumnSpec::new("Col1", DataType::String),
            ColumnSpec::new("Col2", DataType::String),
        ],
        FormatOptions {
            csv_delimiter: "\t".into(),
            ..FormatOptions::default()
        },
    );
    let batch = DataBatch::new(1, vec![Record::from(vec!["A", "B"])]);

    let responses = roundtrip(
        server.addr,
        &[Frame::Metadata(meta), Frame::Batch(batch)],
    )
    .await;

    let Frame::ExportResponse(response) = &responses[0] else {
        panic!("unexpected frame: {:?}", responses[0]);
    };
    assert_eq!(response.status, TaskState::Completed);

    let object = find_published(&server.objects_root).expect("object published");
    assert_eq!(std::fs::read(object).unwrap(), b"Col1\tCol2\nA\tB\n");
}

#[tokio::test]
async fn test_rfc4180_escaping_roundtrip() {
    let server = start_server(1, 4).await;

    let inputs = ["Hello, World", "Text with \"quotes\"", "Text\nwith\nnewlines"];

    let meta = csv_metadata(
        vec![ColumnSpec::new("Text", DataType::String)],
        FormatOptions::default(),
    );
    let batch = DataBatch::new(
        1,
        inputs.iter().map(|s| Record::from(vec![*s])).collect(),
    );

    let responses = roundtrip(
        server.addr,
        &[Frame::Metadata(meta), Frame::Batch(batch)],
    )
    .await;
    let Frame::ExportResponse(response) = &responses[0] else {
        panic!("unexpected frame: {:?}", responses[0]);
    };
    assert_eq!(response.status, TaskState::Completed);

    let object = find_published(&server.objects_root).expect("object published");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(object)
        .unwrap();
    let parsed: Vec<String> = reader
        .records()
        .map(|r| r.unwrap().get(0).unwrap().to_string())
        .collect();
    assert_eq!(parsed, inputs);
}

#[tokio::test]
async fn test_status_query_unknown_task() {
    let server = start_server(1, 4).await;

    let responses = roundtrip(
        server.addr,
        &[Frame::StatusRequest(StatusRequest {
            task_id: "no-such-task".into(),
        })],
    )
    .await;

    let Frame::Error(error) = &responses[0] else {
        panic!("unexpected frame: {:?}", responses[0]);
    };
    assert_eq!(error.code, ErrorCode::NotFound);
    assert_eq!(error.task_id, "no-such-task");
}

#[tokio::test]
async fn test_status_query_after_completion() {
    let server = start_server(1, 4).await;

    let meta = csv_metadata(
        vec![ColumnSpec::new("A", DataType::String)],
        FormatOptions::default(),
    );
    let batch = DataBatch::new(1, vec![Record::from(vec!["x"])]);

    let responses = roundtrip(
        server.addr,
        &[Frame::Metadata(meta), Frame::Batch(batch)],
    )
    .await;
    let Frame::ExportResponse(response) = &responses[0] else {
        panic!("unexpected frame: {:?}", responses[0]);
    };
    let task_id = response.task_id.clone();

    let responses = roundtrip(
        server.addr,
        &[Frame::StatusRequest(StatusRequest {
            task_id: task_id.clone(),
        })],
    )
    .await;
    let Frame::StatusResponse(status) = &responses[0] else {
        panic!("unexpected frame: {:?}", responses[0]);
    };

    assert_eq!(status.task_id, task_id);
    assert_eq!(status.status, TaskState::Completed);
    assert_eq!(status.format, ExportFormat::Csv);
    assert_eq!(status.filename, "users.csv");
    assert_eq!(status.records_processed, 2);
    assert_eq!(status.progress_percent, 100.0);
    assert!(!status.oss_url.is_empty());
    assert!(status.error_code.is_empty());
    assert!(status.completed_at >= status.started_at);
    assert_eq!(status.estimated_seconds_remaining, -1);
}

#[tokio::test]
async fn test_invalid_metadata_creates_no_task() {
    let server = start_server(1, 4).await;

    // No columns: rejected before any task exists
    let meta = csv_metadata(Vec::new(), FormatOptions::default());
    let responses = roundtrip(server.addr, &[Frame::Metadata(meta)]).await;

    let Frame::Error(error) = &responses[0] else {
        panic!("unexpected frame: {:?}", responses[0]);
    };
    assert_eq!(error.code, ErrorCode::ValidationError);
    assert!(error.task_id.is_empty());
}

#[tokio::test]
async fn test_first_frame_must_be_metadata() {
    let server = start_server(1, 4).await;

    let batch = DataBatch::new(1, vec![Record::from(vec!["x"])]);
    let responses = roundtrip(server.addr, &[Frame::Batch(batch)]).await;

    let Frame::Error(error) = &responses[0] else {
        panic!("unexpected frame: {:?}", responses[0]);
    };
    assert_eq!(error.code, ErrorCode::InvalidMetadata);
}

#[tokio::test]
async fn test_metadata_mid_stream_fails_task() {
    let server = start_server(1, 4).await;

    let meta = csv_metadata(
        vec![ColumnSpec::new("A", DataType::String)],
        FormatOptions::default(),
    );
    let second_meta = meta.clone();
    let batch = DataBatch::new(1, vec![Record::from(vec!["x"])]);

    let responses = roundtrip(
        server.addr,
        &[
            Frame::Metadata(meta),
            Frame::Batch(batch),
            Frame::Metadata(second_meta),
        ],
    )
    .await;

    let Frame::ExportResponse(response) = &responses[0] else {
        panic!("unexpected frame: {:?}", responses[0]);
    };
    assert_eq!(response.status, TaskState::Failed);
    assert_eq!(response.error_code, "STREAM_ERROR");
    assert!(response.oss_url.is_empty());

    // Nothing published
    assert!(find_published(&server.objects_root).is_none());
}

#[tokio::test]
async fn test_multiple_batches_accumulate() {
    let server = start_server(2, 4).await;

    let meta = csv_metadata(
        vec![ColumnSpec::new("N", DataType::Number)],
        FormatOptions::default(),
    );

    let mut frames = vec![Frame::Metadata(meta)];
    for seq in 0..10 {
        let records = (0..100)
            .map(|i| Record::from(vec![format!("{}", seq * 100 + i)]))
            .collect();
        frames.push(Frame::Batch(DataBatch::new(seq, records)));
    }

    let responses = roundtrip(server.addr, &frames).await;
    let Frame::ExportResponse(response) = &responses[0] else {
        panic!("unexpected frame: {:?}", responses[0]);
    };

    assert_eq!(response.status, TaskState::Completed);
    assert_eq!(response.record_count, 1001);

    let object = find_published(&server.objects_root).expect("object published");
    let content = std::fs::read_to_string(object).unwrap();
    assert_eq!(content.lines().count(), 1001);
    assert!(content.starts_with("N\n0\n1\n"));
    assert!(content.ends_with("999\n"));
}

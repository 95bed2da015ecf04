//! Fluxo - Export server
//!
//! TCP transport façade and the per-stream ingester.
//!
//! # Protocol
//!
//! Frames are length-prefixed (`[u32 BE length][u8 type][payload]`, see
//! `fluxo-protocol`). A connection is either:
//!
//! - an **export stream**: one `Metadata` frame, then `Batch` frames,
//!   then a clean write-side close; the server answers with a single
//!   terminal `ExportResponse` (or `Error`) frame
//! - a **status query**: one `StatusRequest` frame, answered with a
//!   `StatusResponse` or `Error` frame
//!
//! # Design
//!
//! - **Accept loop on a cancellation token**: shutdown stops accepting
//!   immediately; per-connection tasks wind down through the pipeline
//! - **The ingester is a pump**: it validates the stream header, creates
//!   and enqueues the task, then forwards batches into the job's bounded
//!   frame channel. Back-pressure propagates to the client through the
//!   channel and the socket
//! - **Workers own tasks end-to-end**: the terminal response travels
//!   back over the job's oneshot and is written by the connection task

mod connection;
mod error;
mod ingest;
mod metrics;

pub use error::{Result, ServerError};
pub use metrics::{ServerMetrics, ServerMetricsSnapshot};

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use fluxo_task::{LifecycleController, TaskQueue};

/// Export server configuration
#[derive(Debug, Clone)]
pub struct ExportServerConfig {
    /// Bind address
    pub address: String,

    /// Listen port (0 binds an ephemeral port)
    pub port: u16,

    /// Maximum accepted frame size
    pub max_frame_size: usize,

    /// Per-connection read buffer size
    pub read_buffer_size: usize,

    /// How long a stream waits for a queue slot
    pub queue_timeout: Duration,
}

impl Default for ExportServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".into(),
            port: 9090,
            max_frame_size: fluxo_protocol::MAX_FRAME_SIZE,
            read_buffer_size: 256 * 1024,
            queue_timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl ExportServerConfig {
    /// Get the socket address to bind to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Shared per-connection context
pub(crate) struct ServerContext {
    pub(crate) config: ExportServerConfig,
    pub(crate) controller: Arc<LifecycleController>,
    pub(crate) queue: TaskQueue,
    pub(crate) metrics: Arc<ServerMetrics>,
}

/// The export stream server
pub struct ExportServer {
    context: Arc<ServerContext>,
}

impl ExportServer {
    /// Create a server over the task pipeline
    pub fn new(
        config: ExportServerConfig,
        controller: Arc<LifecycleController>,
        queue: TaskQueue,
    ) -> Self {
        Self {
            context: Arc::new(ServerContext {
                config,
                controller,
                queue,
                metrics: Arc::new(ServerMetrics::new()),
            }),
        }
    }

    /// Get a metrics handle for reporting
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        Arc::clone(&self.context.metrics)
    }

    /// Bind the configured address and serve until cancelled
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let bind_addr = self.context.config.bind_address();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ServerError::Bind {
                address: bind_addr,
                source: e,
            })?;
        self.run_on(listener, cancel).await
    }

    /// Serve on an existing listener until cancelled
    pub async fn run_on(self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let context = self.context;

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "export server listening");
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            context.metrics.connection_opened();

                            let context = Arc::clone(&context);
                            tokio::spawn(async move {
                                if let Err(e) = connection::handle(Arc::clone(&context), stream, peer_addr).await {
                                    context.metrics.error();
                                    tracing::debug!(peer = %peer_addr, error = %e, "connection error");
                                }
                                context.metrics.connection_closed();
                            });
                        }
                        Err(e) => {
                            // Transient accept errors - log and continue
                            tracing::warn!(error = %e, "accept error");
                            context.metrics.error();
                        }
                    }
                }
            }
        }

        tracing::info!("export server stopped");
        Ok(())
    }
}

//! Serve command - Run the export middleware
//!
//! Wires the subsystems together: artifact storage and its reaper, the
//! object store and uploader, the task core, and the stream server; then
//! waits for a shutdown signal and winds everything down within the
//! configured timeout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use fluxo_config::Config;
use fluxo_server::{ExportServer, ExportServerConfig};
use fluxo_storage::{spawn_reaper, ArtifactStore, ReaperConfig, TaskGuard};
use fluxo_store::{FsObjectStore, ObjectStore, UploadConfig, Uploader};
use fluxo_task::{
    task_queue, LifecycleController, TaskMetrics, TaskRegistry, WorkerContext, WorkerPool,
};

/// Serve command arguments
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file (defaults to configs/config.toml if not specified)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        "fluxo starting"
    );

    // Load configuration
    let mut config = match args.config {
        Some(path) if path.exists() => {
            info!(config = %path.display(), "using config file");
            Config::from_file(&path).context("failed to load configuration")?
        }
        Some(path) => {
            // The default CLI value may simply not exist yet; an
            // explicitly given path that is missing is still an error
            if path == PathBuf::from("configs/config.toml") {
                info!("no config file found, using defaults");
                Config::default()
            } else {
                return Err(anyhow::anyhow!(
                    "config file not found: {}",
                    path.display()
                ));
            }
        }
        None => {
            info!("no config file specified, using defaults");
            Config::default()
        }
    };
    config.apply_env_overrides();
    config.validate().context("invalid configuration")?;

    if let Err(e) = run_server(config).await {
        error!(error = %e, "server error");
        return Err(e);
    }

    info!("fluxo shutdown complete");
    Ok(())
}

/// Main server run loop
async fn run_server(config: Config) -> Result<()> {
    // Create cancellation token for coordinated shutdown
    let cancel = CancellationToken::new();

    // Artifact storage
    let artifacts = Arc::new(
        ArtifactStore::new(&config.storage.temp_dir)
            .context("failed to initialize artifact storage")?,
    );
    info!(temp_dir = %config.storage.temp_dir, "artifact storage initialized");

    // Object store and uploader
    let store: Arc<dyn ObjectStore> = Arc::new(
        FsObjectStore::new(&config.object_store.root, &config.object_store.base_url)
            .context("failed to initialize object store")?,
    );
    let uploader = Arc::new(Uploader::new(
        store,
        UploadConfig {
            part_size: config.object_store.part_size,
            max_retries: config.object_store.max_retries,
            parallel_parts: config.object_store.parallel_parts,
            signed_url_expiry: config.object_store.signed_url_expiry(),
        },
    ));
    info!(
        root = %config.object_store.root,
        base_url = %config.object_store.base_url,
        "object store initialized"
    );

    // Task core
    let registry = Arc::new(TaskRegistry::new());
    let metrics = Arc::new(TaskMetrics::new());
    let controller = Arc::new(LifecycleController::new(
        Arc::clone(&registry),
        Arc::clone(&artifacts),
        Arc::clone(&metrics),
    ));

    let (queue, receiver) = task_queue(config.concurrency.task_queue_size);
    let pool = WorkerPool::spawn(
        config.concurrency.max_concurrent_tasks,
        receiver,
        WorkerContext {
            controller: Arc::clone(&controller),
            artifacts: Arc::clone(&artifacts),
            uploader,
            metrics: Arc::clone(&metrics),
        },
        cancel.clone(),
    );
    info!(
        workers = pool.len(),
        queue_size = config.concurrency.task_queue_size,
        "worker pool started"
    );

    // Artifact reaper
    let reaper_task = if config.storage.cleanup_enabled {
        Some(spawn_reaper(
            Arc::clone(&artifacts),
            Arc::clone(&registry) as Arc<dyn TaskGuard>,
            ReaperConfig {
                interval: config.storage.reap_interval(),
                retention: config.storage.retention(),
            },
            cancel.clone(),
        ))
    } else {
        info!("artifact reaper disabled");
        None
    };

    // Stream server
    let server = ExportServer::new(
        ExportServerConfig {
            address: config.server.address.clone(),
            port: config.server.port,
            max_frame_size: config.server.max_frame_size,
            read_buffer_size: config.server.read_buffer_size,
            queue_timeout: config.concurrency.queue_timeout(),
        },
        Arc::clone(&controller),
        queue,
    );
    let server_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { server.run(cancel).await })
    };

    info!(
        address = %config.server.bind_address(),
        max_concurrent = config.concurrency.max_concurrent_tasks,
        queue_size = config.concurrency.task_queue_size,
        "fluxo server running, ready to accept export requests"
    );

    // Wait for shutdown signal
    wait_for_shutdown().await;

    info!("shutdown signal received, stopping server...");

    // Signal all components to stop via cancellation token
    cancel.cancel();

    let shutdown_timeout = config.concurrency.shutdown_timeout();

    // Server stops accepting as soon as the token fires
    match tokio::time::timeout(shutdown_timeout, server_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!(error = %e, "server exited with error"),
        Ok(Err(e)) => warn!(error = %e, "server task panicked"),
        Err(_) => warn!("server did not stop within timeout"),
    }

    // In-flight tasks get the rest of the timeout; stragglers are
    // aborted and their tasks are not resumed
    info!("waiting for workers to finish in-flight tasks...");
    pool.join(shutdown_timeout).await;

    if let Some(task) = reaper_task {
        task.abort();
    }

    let totals = metrics.snapshot();
    info!(
        tasks_created = totals.tasks_created,
        tasks_completed = totals.tasks_completed,
        tasks_failed = totals.tasks_failed,
        records_written = totals.records_written,
        "final task totals"
    );

    Ok(())
}

/// Block until Ctrl-C or SIGTERM
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                let _ = signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}

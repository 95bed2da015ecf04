//! Background artifact reaper
//!
//! Runs on a fixed interval and collects artifacts whose tasks finished
//! (or vanished) without releasing them, bounded by the retention window.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{ArtifactStore, TaskGuard};

/// Reaper timing configuration
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// How often to scan for expired artifacts
    pub interval: Duration,

    /// How old an unclaimed artifact must be before deletion
    pub retention: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10 * 60),
            retention: Duration::from_secs(60 * 60),
        }
    }
}

/// Spawn the reaper task
///
/// Runs until the cancellation token fires. Each tick deletes entries
/// older than the retention window whose task the guard does not report
/// as active.
pub fn spawn_reaper(
    store: Arc<ArtifactStore>,
    guard: Arc<dyn TaskGuard>,
    config: ReaperConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let retention = chrono::Duration::from_std(config.retention)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let mut ticker = tokio::time::interval(config.interval);
        // The first tick fires immediately; skip it so a fresh start
        // doesn't scan an empty store
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("artifact reaper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let reaped = store.reap_expired(retention, guard.as_ref());
                    if reaped > 0 {
                        tracing::info!(reaped, tracked = store.len(), "artifact reaper pass complete");
                    }
                }
            }
        }
    })
}

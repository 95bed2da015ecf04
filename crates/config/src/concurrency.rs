//! Worker pool and admission queue settings

use std::time::Duration;

use serde::Deserialize;

/// Task concurrency configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Pipeline workers (tasks processed in parallel)
    pub max_concurrent_tasks: usize,

    /// Admission queue capacity
    pub task_queue_size: usize,

    /// How long a stream waits for a queue slot before failing
    pub queue_timeout_secs: u64,

    /// How long shutdown waits for in-flight tasks
    pub shutdown_timeout_secs: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 10,
            task_queue_size: 100,
            queue_timeout_secs: 5 * 60,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ConcurrencyConfig {
    /// Queue timeout as a Duration
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }

    /// Shutdown timeout as a Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

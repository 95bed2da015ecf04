//! Temporary artifact storage settings

use std::time::Duration;

use serde::Deserialize;

/// Artifact storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for in-flight export artifacts
    pub temp_dir: String,

    /// Whether the background reaper runs
    pub cleanup_enabled: bool,

    /// Age after which an unclaimed artifact is reaped
    pub retention_secs: u64,

    /// Reaper scan interval
    pub reap_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            temp_dir: "/tmp/fluxo-exports".into(),
            cleanup_enabled: true,
            retention_secs: 60 * 60,
            reap_interval_secs: 10 * 60,
        }
    }
}

impl StorageConfig {
    /// Retention as a Duration
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Reap interval as a Duration
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert!(config.cleanup_enabled);
        assert_eq!(config.retention(), Duration::from_secs(3600));
        assert_eq!(config.reap_interval(), Duration::from_secs(600));
    }
}

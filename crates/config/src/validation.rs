//! Configuration validation
//!
//! Rejects values the runtime cannot work with; everything else is the
//! operator's judgment call.

use crate::error::{ConfigError, Result};
use crate::Config;

impl Config {
    /// Check the loaded configuration for unusable values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("server.port must be non-zero"));
        }
        if self.server.max_frame_size < 1024 {
            return Err(invalid("server.max_frame_size must be at least 1024 bytes"));
        }
        if self.concurrency.max_concurrent_tasks == 0 {
            return Err(invalid("concurrency.max_concurrent_tasks must be positive"));
        }
        if self.concurrency.task_queue_size == 0 {
            return Err(invalid("concurrency.task_queue_size must be positive"));
        }
        if self.storage.temp_dir.is_empty() {
            return Err(invalid("storage.temp_dir must not be empty"));
        }
        if self.object_store.root.is_empty() {
            return Err(invalid("object_store.root must not be empty"));
        }
        if self.object_store.part_size == 0 {
            return Err(invalid("object_store.part_size must be positive"));
        }
        if self.object_store.parallel_parts == 0 {
            return Err(invalid("object_store.parallel_parts must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

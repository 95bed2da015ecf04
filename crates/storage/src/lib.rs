//! Fluxo - Artifact storage
//!
//! Scoped temporary files for in-flight exports, keyed by task id.
//!
//! # Design
//!
//! - One root directory, created at startup
//! - Per-task unique names: `<task_id>_<YYYYMMDD-HHMMSS>_<sanitized-name>`
//!   so concurrent tasks can never collide
//! - A single mutex guards the entry map; every operation is one map
//!   access plus at most one filesystem call
//! - A background reaper deletes entries past the retention window,
//!   skipping any task the [`TaskGuard`] reports as active

mod artifact;
mod error;
mod reaper;

pub use artifact::{sanitize_filename, ArtifactStore};
pub use error::{Result, StorageError};
pub use reaper::{spawn_reaper, ReaperConfig};

/// Tells the reaper which tasks are still using their artifact
///
/// Implemented by the task registry: a task in `Processing` or
/// `Uploading` is active and its artifact must never be reaped.
pub trait TaskGuard: Send + Sync {
    /// Whether the task currently owns its artifact
    fn is_active(&self, task_id: &str) -> bool;
}

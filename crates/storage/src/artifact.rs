//! Artifact store
//!
//! Tracks one temporary file per task. All mutation goes through a single
//! mutex; operations are short so contention is not a concern at the
//! target worker counts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::{Result, StorageError};
use crate::TaskGuard;

/// A tracked temporary file
#[derive(Debug, Clone)]
struct ArtifactEntry {
    path: PathBuf,
    created_at: DateTime<Utc>,
}

/// Scoped temporary file store, keyed by task id
pub struct ArtifactStore {
    root: PathBuf,
    entries: Mutex<HashMap<String, ArtifactEntry>>,
}

impl ArtifactStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StorageError::Root {
            path: root.display().to_string(),
            source: e,
        })?;

        Ok(Self {
            root,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of tracked artifacts
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no artifacts are tracked
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Allocate a unique path for a task's artifact
    ///
    /// `desired_name` is reduced to its leaf component; uniqueness comes
    /// from embedding the task id and a timestamp. The file itself is
    /// created by the writer, not here.
    pub fn allocate(&self, task_id: &str, desired_name: &str) -> Result<PathBuf> {
        let name = sanitize_filename(desired_name);
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let path = self.root.join(format!("{task_id}_{stamp}_{name}"));

        self.entries.lock().insert(
            task_id.to_string(),
            ArtifactEntry {
                path: path.clone(),
                created_at: Utc::now(),
            },
        );

        tracing::debug!(
            event = "TempFileCreated",
            task_id = %task_id,
            path = %path.display(),
            "temporary file allocated"
        );

        Ok(path)
    }

    /// Look up the artifact path for a task
    pub fn path(&self, task_id: &str) -> Result<PathBuf> {
        self.entries
            .lock()
            .get(task_id)
            .map(|e| e.path.clone())
            .ok_or_else(|| StorageError::not_found(task_id))
    }

    /// Drop the tracked entry and delete the file
    ///
    /// A missing file is not an error; an unknown task id is.
    pub fn release(&self, task_id: &str) -> Result<()> {
        let entry = self
            .entries
            .lock()
            .remove(task_id)
            .ok_or_else(|| StorageError::not_found(task_id))?;

        remove_if_exists(&entry.path)?;

        tracing::debug!(
            event = "TempFileCleanup",
            task_id = %task_id,
            path = %entry.path.display(),
            "temporary file released"
        );

        Ok(())
    }

    /// Best-effort check that the root is writable
    ///
    /// Performs a small write probe; the filesystem may still fill up
    /// later, so this only rejects roots that are already unusable.
    pub fn preflight_space(&self, _min_bytes: u64) -> Result<()> {
        let probe = self.root.join(".preflight");
        let result = std::fs::write(&probe, [0u8; 4096]);
        let _ = std::fs::remove_file(&probe);
        result.map_err(StorageError::Preflight)
    }

    /// Delete entries older than `retention`, skipping active tasks
    ///
    /// Returns the number of entries reaped.
    pub fn reap_expired(&self, retention: Duration, guard: &dyn TaskGuard) -> usize {
        let now = Utc::now();
        let expired: Vec<(String, ArtifactEntry)> = {
            let entries = self.entries.lock();
            entries
                .iter()
                .filter(|(task_id, entry)| {
                    now - entry.created_at > retention && !guard.is_active(task_id)
                })
                .map(|(id, entry)| (id.clone(), entry.clone()))
                .collect()
        };

        let mut reaped = 0;
        for (task_id, entry) in expired {
            if remove_if_exists(&entry.path).is_ok() {
                self.entries.lock().remove(&task_id);
                reaped += 1;
                tracing::info!(
                    event = "TempFileCleanup",
                    task_id = %task_id,
                    path = %entry.path.display(),
                    age_secs = (now - entry.created_at).num_seconds(),
                    "expired temporary file reaped"
                );
            }
        }
        reaped
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, task_id: &str, by: Duration) {
        if let Some(entry) = self.entries.lock().get_mut(task_id) {
            entry.created_at -= by;
        }
    }
}

/// Reduce a client-supplied filename to a safe leaf component
///
/// Strips every path separator (both kinds) and rejects traversal and
/// empty names, falling back to `export`.
pub fn sanitize_filename(name: &str) -> String {
    let leaf = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if leaf.is_empty() || leaf == "." || leaf == ".." {
        "export".to_string()
    } else {
        leaf.to_string()
    }
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

//! Artifact uploader
//!
//! Drives a finished artifact into the object store and mints the signed
//! download URL.
//!
//! # Strategy
//!
//! Files at or below the part threshold go up in a single put; larger
//! files use multipart with fixed-size slices uploaded in bounded
//! parallel windows. Any part failure aborts the whole multipart session
//! before surfacing to the retry loop, so the store never holds orphaned
//! sessions. Retries wrap the entire chosen strategy with a linear
//! backoff (attempt-index seconds); non-retryable error kinds skip the
//! remaining attempts.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{StoreError, UploadError};
use crate::object_store::{CompletedPart, ObjectStore};

/// Uploader tuning
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Files larger than this use multipart; also the slice size (10 MiB)
    pub part_size: u64,

    /// Additional attempts after the first failure
    pub max_retries: u32,

    /// Concurrent part uploads per task
    pub parallel_parts: usize,

    /// Lifetime of minted download URLs
    pub signed_url_expiry: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            part_size: 10 * 1024 * 1024,
            max_retries: 3,
            parallel_parts: 5,
            signed_url_expiry: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Key the object was stored under
    pub object_key: String,

    /// Time-limited download URL
    pub signed_url: String,

    /// Bytes uploaded
    pub size_bytes: u64,

    /// Wall-clock time spent, retries included
    pub elapsed: Duration,
}

/// Uploads artifacts through an [`ObjectStore`]
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    config: UploadConfig,
}

impl Uploader {
    /// Create an uploader over the given store
    pub fn new(store: Arc<dyn ObjectStore>, config: UploadConfig) -> Self {
        Self { store, config }
    }

    /// Upload a local artifact and mint its signed URL
    pub async fn upload(&self, task_id: &str, local_path: &Path) -> Result<UploadOutcome, UploadError> {
        let started = Instant::now();
        let size_bytes = tokio::fs::metadata(local_path).await?.len();
        let key = object_key(local_path, Utc::now());

        tracing::info!(
            event = "OssUploadStarted",
            task_id = %task_id,
            object_key = %key,
            file_size = size_bytes,
            local_path = %local_path.display(),
            "starting object-store upload"
        );

        let attempts = self.config.max_retries + 1;
        let mut last_err: Option<StoreError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let wait = Duration::from_secs(attempt as u64);
                tracing::warn!(
                    task_id = %task_id,
                    object_key = %key,
                    attempt = attempt + 1,
                    attempts,
                    wait_secs = wait.as_secs(),
                    "retrying upload"
                );
                tokio::time::sleep(wait).await;
            }

            let result = if size_bytes > self.config.part_size {
                self.multipart_upload(task_id, &key, local_path, size_bytes).await
            } else {
                self.single_put(&key, local_path).await
            };

            match result {
                Ok(()) => {
                    last_err = None;
                    break;
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        task_id = %task_id,
                        object_key = %key,
                        attempt = attempt + 1,
                        error = %e,
                        "upload attempt failed"
                    );
                    last_err = Some(e);
                }
                Err(e) => {
                    tracing::error!(
                        event = "OssUploadFailed",
                        task_id = %task_id,
                        object_key = %key,
                        error = %e,
                        "upload failed with non-retryable error"
                    );
                    return Err(UploadError::Terminal(e));
                }
            }
        }

        if let Some(source) = last_err {
            tracing::error!(
                event = "OssUploadFailed",
                task_id = %task_id,
                object_key = %key,
                attempts,
                error = %source,
                "upload failed after retries"
            );
            return Err(UploadError::RetriesExhausted { attempts, source });
        }

        let signed_url = self
            .store
            .sign_url(&key, self.config.signed_url_expiry)
            .await
            .map_err(UploadError::Terminal)?;

        let elapsed = started.elapsed();
        tracing::info!(
            event = "OssUploadCompleted",
            task_id = %task_id,
            object_key = %key,
            file_size = size_bytes,
            duration_ms = elapsed.as_millis() as u64,
            "object-store upload completed"
        );

        Ok(UploadOutcome {
            object_key: key,
            signed_url,
            size_bytes,
            elapsed,
        })
    }

    /// Upload the whole file in one request
    async fn single_put(&self, key: &str, local_path: &Path) -> Result<(), StoreError> {
        let data = tokio::fs::read(local_path).await?;
        self.store.put_object(key, Bytes::from(data)).await
    }

    /// Three-phase multipart upload with bounded part parallelism
    async fn multipart_upload(
        &self,
        task_id: &str,
        key: &str,
        local_path: &Path,
        size_bytes: u64,
    ) -> Result<(), StoreError> {
        let upload_id = self.store.initiate_multipart(key).await?;

        let parts = match self
            .upload_parts(task_id, key, &upload_id, local_path, size_bytes)
            .await
        {
            Ok(parts) => parts,
            Err(e) => {
                let _ = self.store.abort_multipart(key, &upload_id).await;
                return Err(e);
            }
        };

        if let Err(e) = self.store.complete_multipart(key, &upload_id, &parts).await {
            let _ = self.store.abort_multipart(key, &upload_id).await;
            return Err(e);
        }

        Ok(())
    }

    /// Upload every slice of the file, `parallel_parts` at a time
    async fn upload_parts(
        &self,
        task_id: &str,
        key: &str,
        upload_id: &str,
        local_path: &Path,
        size_bytes: u64,
    ) -> Result<Vec<CompletedPart>, StoreError> {
        let part_size = self.config.part_size;
        let part_count = size_bytes.div_ceil(part_size);

        // (part_number, offset, length); part numbers are 1-based
        let slices: Vec<(u32, u64, u64)> = (0..part_count)
            .map(|i| {
                let offset = i * part_size;
                let length = part_size.min(size_bytes - offset);
                ((i + 1) as u32, offset, length)
            })
            .collect();

        let mut parts = Vec::with_capacity(slices.len());
        for window in slices.chunks(self.config.parallel_parts.max(1)) {
            let uploads = window.iter().map(|&(number, offset, length)| {
                self.upload_one_part(task_id, key, upload_id, local_path, number, offset, length)
            });
            parts.extend(try_join_all(uploads).await?);
        }

        Ok(parts)
    }

    #[allow(clippy::too_many_arguments)]
    async fn upload_one_part(
        &self,
        task_id: &str,
        key: &str,
        upload_id: &str,
        local_path: &Path,
        part_number: u32,
        offset: u64,
        length: u64,
    ) -> Result<CompletedPart, StoreError> {
        let data = read_slice(local_path, offset, length)
            .await
            .map_err(|e| StoreError::transport(format!("read part {part_number}: {e}")))?;

        let etag = self
            .store
            .upload_part(key, upload_id, part_number, data)
            .await?;

        tracing::debug!(
            event = "OssPartUploaded",
            task_id = %task_id,
            part_number,
            part_size = length,
            "part uploaded"
        );

        Ok(CompletedPart { part_number, etag })
    }
}

/// Build the object key for a local artifact
///
/// `exports/YYYY/MM/DD/<basename>`, deterministic from the path and date.
pub fn object_key(local_path: &Path, date: DateTime<Utc>) -> String {
    let basename = local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string());
    format!("exports/{}/{}", date.format("%Y/%m/%d"), basename)
}

/// Read one slice of a file into memory
async fn read_slice(path: &Path, offset: u64, length: u64) -> std::io::Result<Bytes> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(std::io::SeekFrom::Start(offset)).await?;

    let mut buf = vec![0u8; length as usize];
    file.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

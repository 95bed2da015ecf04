//! Filesystem-backed object store
//!
//! Local implementation of [`ObjectStore`] for development deployments
//! and integration tests. Multipart uploads stage their parts in a
//! per-upload directory under `.multipart/` and publish atomically on
//! complete by concatenating into the final key path and renaming.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::StoreError;
use crate::object_store::{CompletedPart, ObjectStore};

/// Staging directory name under the store root
const MULTIPART_DIR: &str = ".multipart";

/// Local filesystem object store
pub struct FsObjectStore {
    root: PathBuf,

    /// Base of minted URLs, e.g. `https://files.internal/exports`
    base_url: String,

    /// upload_id → object key, for open multipart sessions
    sessions: Mutex<HashMap<String, String>>,
}

impl FsObjectStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(root.join(MULTIPART_DIR))
            .map_err(|e| StoreError::transport(format!("create store root: {e}")))?;

        Ok(Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        // Keys are server-generated but cheap to double-check
        if key.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(StoreError::invalid_request(format!("bad object key: {key}")));
        }
        Ok(self.root.join(key))
    }

    fn session_dir(&self, upload_id: &str) -> PathBuf {
        self.root.join(MULTIPART_DIR).join(upload_id)
    }

    fn session_key(&self, upload_id: &str) -> Result<String, StoreError> {
        self.sessions
            .lock()
            .get(upload_id)
            .cloned()
            .ok_or_else(|| StoreError::invalid_request(format!("unknown upload id: {upload_id}")))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        Ok(())
    }

    async fn initiate_multipart(&self, key: &str) -> Result<String, StoreError> {
        self.object_path(key)?;
        let upload_id = Uuid::new_v4().to_string();
        tokio::fs::create_dir_all(self.session_dir(&upload_id)).await?;
        self.sessions
            .lock()
            .insert(upload_id.clone(), key.to_string());
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> Result<String, StoreError> {
        self.session_key(upload_id)?;
        if part_number == 0 {
            return Err(StoreError::invalid_request("part numbers are 1-based"));
        }

        let part_path = self.session_dir(upload_id).join(format!("{part_number:05}"));
        tokio::fs::write(&part_path, &data).await?;

        Ok(hex::encode(&Sha256::digest(&data)[..16]))
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StoreError> {
        let session_key = self.session_key(upload_id)?;
        if session_key != key {
            return Err(StoreError::invalid_request(format!(
                "upload id {upload_id} belongs to key {session_key}, not {key}"
            )));
        }
        for (i, part) in parts.iter().enumerate() {
            if part.part_number != (i + 1) as u32 {
                return Err(StoreError::invalid_request(format!(
                    "part list not contiguous at index {i}"
                )));
            }
        }

        let dir = self.session_dir(upload_id);
        let staged = dir.join(".assembled");
        let mut out = tokio::fs::File::create(&staged).await?;
        for part in parts {
            let part_path = dir.join(format!("{:05}", part.part_number));
            let data = tokio::fs::read(&part_path).await.map_err(|e| {
                StoreError::invalid_request(format!("missing part {}: {e}", part.part_number))
            })?;
            out.write_all(&data).await?;
        }
        out.flush().await?;
        drop(out);

        let final_path = self.object_path(key)?;
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // The rename is the atomic publish
        tokio::fs::rename(&staged, &final_path).await?;

        self.sessions.lock().remove(upload_id);
        tokio::fs::remove_dir_all(&dir).await?;
        Ok(())
    }

    async fn abort_multipart(&self, _key: &str, upload_id: &str) -> Result<(), StoreError> {
        self.sessions.lock().remove(upload_id);
        match tokio::fs::remove_dir_all(self.session_dir(upload_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn sign_url(&self, key: &str, expiry: Duration) -> Result<String, StoreError> {
        self.object_path(key)?;
        let expires = Utc::now().timestamp() + expiry.as_secs() as i64;
        Ok(format!("{}/{key}?expires={expires}", self.base_url))
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreErrorKind;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path(), "https://files.test/dl").unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_and_sign() {
        let (_dir, store) = store();

        store
            .put_object("exports/2026/08/02/a.csv", Bytes::from_static(b"a,b\n"))
            .await
            .unwrap();

        let url = store
            .sign_url("exports/2026/08/02/a.csv", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("https://files.test/dl/exports/2026/08/02/a.csv?expires="));
    }

    #[tokio::test]
    async fn test_multipart_publishes_atomically() {
        let (dir, store) = store();
        let key = "exports/2026/08/02/big.csv";

        let upload_id = store.initiate_multipart(key).await.unwrap();
        let mut parts = Vec::new();
        for (n, chunk) in [b"aaaa".as_slice(), b"bbbb", b"cc"].iter().enumerate() {
            let etag = store
                .upload_part(key, &upload_id, (n + 1) as u32, Bytes::copy_from_slice(chunk))
                .await
                .unwrap();
            parts.push(CompletedPart {
                part_number: (n + 1) as u32,
                etag,
            });
        }

        // Nothing visible until complete
        assert!(!dir.path().join(key).exists());

        store.complete_multipart(key, &upload_id, &parts).await.unwrap();

        assert_eq!(std::fs::read(dir.path().join(key)).unwrap(), b"aaaabbbbcc");
        // Staging directory is gone
        assert!(!dir.path().join(MULTIPART_DIR).join(&upload_id).exists());
    }

    #[tokio::test]
    async fn test_abort_discards_parts() {
        let (dir, store) = store();
        let key = "exports/x.csv";

        let upload_id = store.initiate_multipart(key).await.unwrap();
        store
            .upload_part(key, &upload_id, 1, Bytes::from_static(b"zz"))
            .await
            .unwrap();
        store.abort_multipart(key, &upload_id).await.unwrap();

        assert!(!dir.path().join(key).exists());
        assert!(!dir.path().join(MULTIPART_DIR).join(&upload_id).exists());

        // The session is closed: further parts are rejected
        let err = store
            .upload_part(key, &upload_id, 2, Bytes::from_static(b"zz"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_non_contiguous_parts_rejected() {
        let (_dir, store) = store();
        let key = "exports/y.csv";

        let upload_id = store.initiate_multipart(key).await.unwrap();
        let etag = store
            .upload_part(key, &upload_id, 1, Bytes::from_static(b"zz"))
            .await
            .unwrap();

        let err = store
            .complete_multipart(
                key,
                &upload_id,
                &[CompletedPart {
                    part_number: 2,
                    etag,
                }],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let (_dir, store) = store();
        let err = store
            .put_object("exports/../../etc/cron", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_delete_object_idempotent() {
        let (_dir, store) = store();
        store
            .put_object("exports/z.csv", Bytes::from_static(b"x"))
            .await
            .unwrap();
        store.delete_object("exports/z.csv").await.unwrap();
        store.delete_object("exports/z.csv").await.unwrap();
    }
}

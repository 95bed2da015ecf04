//! In-memory object store for tests
//!
//! Supports scripted failures per operation and an optional artificial
//! put delay, so uploader retry behavior and queue back-pressure can be
//! exercised without a network.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::object_store::{CompletedPart, ObjectStore};

/// Operation counters observed by assertions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCounters {
    pub puts: u64,
    pub parts: u64,
    pub initiated: u64,
    pub completed: u64,
    pub aborted: u64,
    pub signed: u64,
}

#[derive(Default)]
struct Scripted {
    remaining: u32,
    error: Option<StoreError>,
}

impl Scripted {
    fn take(&mut self) -> Option<StoreError> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.error.clone()
    }
}

struct MockSession {
    key: String,
    parts: HashMap<u32, Vec<u8>>,
}

#[derive(Default)]
struct MockState {
    objects: HashMap<String, Vec<u8>>,
    sessions: HashMap<String, MockSession>,
    next_upload_id: u64,
    counters: MockCounters,
    fail_puts: Scripted,
    fail_parts: Scripted,
    fail_completes: Scripted,
}

/// Scriptable in-memory [`ObjectStore`]
#[derive(Default)]
pub struct MockObjectStore {
    state: Mutex<MockState>,
    put_delay: Option<Duration>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `put_object` call sleep first (back-pressure tests)
    #[must_use]
    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = Some(delay);
        self
    }

    /// Fail the next `n` `put_object` calls with `error`
    pub fn fail_next_puts(&self, n: u32, error: StoreError) {
        self.state.lock().fail_puts = Scripted {
            remaining: n,
            error: Some(error),
        };
    }

    /// Fail the next `n` `upload_part` calls with `error`
    pub fn fail_next_parts(&self, n: u32, error: StoreError) {
        self.state.lock().fail_parts = Scripted {
            remaining: n,
            error: Some(error),
        };
    }

    /// Fail the next `n` `complete_multipart` calls with `error`
    pub fn fail_next_completes(&self, n: u32, error: StoreError) {
        self.state.lock().fail_completes = Scripted {
            remaining: n,
            error: Some(error),
        };
    }

    /// Bytes stored under `key`, if the object was published
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.state.lock().objects.get(key).cloned()
    }

    /// Number of published objects
    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Multipart sessions that were neither completed nor aborted
    pub fn open_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Snapshot of operation counters
    pub fn counters(&self) -> MockCounters {
        self.state.lock().counters
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.counters.puts += 1;
        if let Some(err) = state.fail_puts.take() {
            return Err(err);
        }
        state.objects.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn initiate_multipart(&self, key: &str) -> Result<String, StoreError> {
        let mut state = self.state.lock();
        state.counters.initiated += 1;
        state.next_upload_id += 1;
        let upload_id = format!("upload-{}", state.next_upload_id);
        state.sessions.insert(
            upload_id.clone(),
            MockSession {
                key: key.to_string(),
                parts: HashMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> Result<String, StoreError> {
        let mut state = self.state.lock();
        state.counters.parts += 1;
        if let Some(err) = state.fail_parts.take() {
            return Err(err);
        }
        let session = state
            .sessions
            .get_mut(upload_id)
            .ok_or_else(|| StoreError::invalid_request(format!("unknown upload id: {upload_id}")))?;
        session.parts.insert(part_number, data.to_vec());
        Ok(format!("etag-{part_number}"))
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.counters.completed += 1;
        if let Some(err) = state.fail_completes.take() {
            return Err(err);
        }

        let session = state
            .sessions
            .remove(upload_id)
            .ok_or_else(|| StoreError::invalid_request(format!("unknown upload id: {upload_id}")))?;
        if session.key != key {
            return Err(StoreError::invalid_request("key mismatch"));
        }

        let mut assembled = Vec::new();
        for (i, part) in parts.iter().enumerate() {
            if part.part_number != (i + 1) as u32 {
                return Err(StoreError::invalid_request(format!(
                    "part list not contiguous at index {i}"
                )));
            }
            let data = session.parts.get(&part.part_number).ok_or_else(|| {
                StoreError::invalid_request(format!("missing part {}", part.part_number))
            })?;
            assembled.extend_from_slice(data);
        }

        state.objects.insert(key.to_string(), assembled);
        Ok(())
    }

    async fn abort_multipart(&self, _key: &str, upload_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.counters.aborted += 1;
        state.sessions.remove(upload_id);
        Ok(())
    }

    async fn sign_url(&self, key: &str, expiry: Duration) -> Result<String, StoreError> {
        let mut state = self.state.lock();
        state.counters.signed += 1;
        if !state.objects.contains_key(key) {
            return Err(StoreError::invalid_request(format!("no such object: {key}")));
        }
        Ok(format!("https://mock.store/{key}?expires={}", expiry.as_secs()))
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        self.state.lock().objects.remove(key);
        Ok(())
    }
}

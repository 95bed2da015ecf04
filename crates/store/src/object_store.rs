//! Object-store interface
//!
//! The seam between the pipeline and whatever actually holds the bytes.
//! Multipart follows the usual three-phase protocol: initiate, upload
//! 1-based contiguous parts, then complete (the atomic publish) or abort.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

/// A finished part of a multipart upload
///
/// The entity tag returned by the store must be echoed back verbatim in
/// `complete_multipart`, paired with its part number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// 1-based part number
    pub part_number: u32,

    /// Entity tag returned by the store for this part
    pub etag: String,
}

/// Remote object store operations used by the uploader
///
/// Implementations must be safe for concurrent use: the uploader issues
/// several `upload_part` calls in parallel for one upload id.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object in a single request
    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Begin a multipart upload, returning the upload id
    async fn initiate_multipart(&self, key: &str) -> Result<String, StoreError>;

    /// Upload one part, returning its entity tag
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> Result<String, StoreError>;

    /// Atomically publish a multipart upload from its parts
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StoreError>;

    /// Discard a multipart upload and any parts received so far
    async fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<(), StoreError>;

    /// Mint a time-limited GET URL for an object
    async fn sign_url(&self, key: &str, expiry: Duration) -> Result<String, StoreError>;

    /// Remove an object
    async fn delete_object(&self, key: &str) -> Result<(), StoreError>;
}

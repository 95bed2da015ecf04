//! Object store and uploader settings

use std::time::Duration;

use serde::Deserialize;

/// Object store configuration
///
/// The bundled backend is filesystem-based; `root` is where published
/// objects land and `base_url` is the prefix of minted download URLs.
/// A cloud backend plugs in behind the same uploader settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    /// Backend root directory
    pub root: String,

    /// Base of minted download URLs
    pub base_url: String,

    /// Multipart threshold and slice size in bytes
    pub part_size: u64,

    /// Additional upload attempts after the first failure
    pub max_retries: u32,

    /// Concurrent part uploads per task
    pub parallel_parts: usize,

    /// Signed URL lifetime
    pub signed_url_expiry_secs: u64,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            root: "/tmp/fluxo-objects".into(),
            base_url: "http://localhost:9090/exports".into(),
            part_size: 10 * 1024 * 1024,
            max_retries: 3,
            parallel_parts: 5,
            signed_url_expiry_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl ObjectStoreConfig {
    /// Signed URL expiry as a Duration
    pub fn signed_url_expiry(&self) -> Duration {
        Duration::from_secs(self.signed_url_expiry_secs)
    }
}

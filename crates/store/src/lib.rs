//! Fluxo - Object store
//!
//! Uploads finished artifacts to a remote object store and mints
//! time-limited download URLs.
//!
//! # Architecture
//!
//! ```text
//! [Worker] ──path──> [Uploader] ──trait──> [ObjectStore]
//!                        │                      ├── FsObjectStore (local)
//!                        │                      └── MockObjectStore (tests)
//!                        └── strategy: single put | multipart (parallel parts)
//! ```
//!
//! The cloud SDK stays behind the [`ObjectStore`] trait; the uploader owns
//! strategy selection, bounded part parallelism, abort-on-failure and the
//! retry loop. Retries wrap the entire chosen strategy, never individual
//! parts, and only for error kinds classified as retryable.

mod error;
mod fs;
pub mod mock;
mod object_store;
mod uploader;

pub use error::{StoreError, StoreErrorKind, UploadError};
pub use fs::FsObjectStore;
pub use object_store::{CompletedPart, ObjectStore};
pub use uploader::{object_key, UploadConfig, Uploader, UploadOutcome};

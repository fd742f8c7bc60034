//! Object storage abstraction.
//!
//! The upload controller and the result poller only need four operations from a
//! backend: a resumable upload that reports progress, a prefix listing, an
//! existence check and a way to turn a key into a retrievable URL.

mod memory;
mod s3;

pub use memory::MemoryStorage;
pub use s3::S3Storage;

use crate::error::LandShapeError;
use crate::types::{ObjectEntry, TransferProgress};
use async_trait::async_trait;
use std::path::Path;

/// Callback invoked by a backend whenever more bytes have been stored.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(TransferProgress) + Send);

/// Operations a storage backend must provide.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Uploads the file at `path` to `key`, calling `progress` as the transfer advances.
    ///
    /// Reported byte counts never decrease. An existing object at `key` is replaced.
    async fn put_resumable(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
        progress: ProgressFn<'_>,
    ) -> Result<(), LandShapeError>;

    /// Lists the objects directly under `prefix`, in key order.
    ///
    /// Keys with another `/` after the prefix belong to nested folders and are left out.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, LandShapeError>;

    /// Checks whether an object exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool, LandShapeError>;

    /// Resolves a URL the object at `key` can be fetched from.
    async fn download_url(&self, key: &str) -> Result<String, LandShapeError>;
}

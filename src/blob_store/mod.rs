//! Storage of uploaded media files.

mod fs_blob_store;

pub use fs_blob_store::FsBlobStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("Invalid media name: {0}")]
    InvalidName(String),

    #[error("Uploaded file is empty")]
    Empty,

    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A flat collection of named media files.
///
/// Names are single path components, see [`crate::names::is_safe_name`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `data` under `name`, replacing any previous content.
    /// Returns the stored name.
    async fn put(&self, name: &str, data: &[u8]) -> Result<String, BlobStoreError>;

    /// All stored names, sorted.
    async fn list(&self) -> Result<Vec<String>, BlobStoreError>;

    /// Removes `name`. Fails with `NotFound` if nothing was stored under it.
    async fn delete(&self, name: &str) -> Result<(), BlobStoreError>;
}

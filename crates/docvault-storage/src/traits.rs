//! Object storage abstraction trait
//!
//! Document bytes are addressed by `(bucket, key)`. The bucket is chosen by the
//! document type, the key is the document UUID.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use docvault_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => {
                AppError::FileContentNotFound(format!("Stored content missing for '{}'", key))
            }
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Object storage abstraction
///
/// All storage backends implement this trait so document services never
/// couple to a specific provider.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `key` in `bucket`, replacing any previous object.
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> StorageResult<()>;

    /// Fetch an object. Missing objects yield [`StorageError::NotFound`].
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

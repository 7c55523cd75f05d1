//! Host file-system access used by the pipelines
//!
//! Only existence checks are needed by the core; converters do their own I/O.

use async_trait::async_trait;
use std::path::Path;

/// Error type for storage backend operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(String),
}

/// Host storage backend
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Whether a file or directory exists at `path`
    async fn exists(&self, path: &Path) -> Result<bool, StorageError>;
}

/// Storage backend over the local file system
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorageBackend;

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    async fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        tokio::fs::try_exists(path)
            .await
            .map_err(|e| StorageError::IoError(format!("{}: {}", path.display(), e)))
    }
}

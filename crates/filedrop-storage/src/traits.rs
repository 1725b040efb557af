//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::keys::StoragePath;
use crate::StorageBackend;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Metadata update failed: {0}")]
    MetadataFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StorageError::AlreadyExists(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte sink returned by [`Storage::open_write`]. Callers must `shutdown()` it once the
/// content is complete.
pub type StorageWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// Byte source returned by [`Storage::open_read`].
pub type StorageReader = Pin<Box<dyn AsyncRead + Send>>;

/// Flat string metadata attached to a stored object.
pub type Metadata = BTreeMap<String, String>;

/// Storage abstraction trait
///
/// The upload pipeline only needs a path-addressable byte-stream provider: open for
/// write (never overwriting), open for read, metadata get/set, delete, and an external
/// URL for a path. All backends implement this trait so the pipeline can run against
/// any of them.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Qualify a relative key with this backend's scheme.
    fn qualify(&self, key: &str) -> StorageResult<StoragePath> {
        StoragePath::new(self.backend_type().scheme(), key)
    }

    /// Open a new object for writing.
    ///
    /// Fails with [`StorageError::AlreadyExists`] if something is already stored at
    /// `path`; existing content is never overwritten.
    async fn open_write(&self, path: &StoragePath) -> StorageResult<StorageWriter>;

    /// Open an existing object for reading.
    async fn open_read(&self, path: &StoragePath) -> StorageResult<StorageReader>;

    /// Read the metadata of an object. Objects without metadata yield an empty map.
    async fn get_metadata(&self, path: &StoragePath) -> StorageResult<Metadata>;

    /// Replace the metadata of an existing object.
    async fn set_metadata(&self, path: &StoragePath, metadata: &Metadata) -> StorageResult<()>;

    /// Delete an object and its metadata. Deleting a missing object succeeds.
    async fn delete(&self, path: &StoragePath) -> StorageResult<()>;

    /// External URL under which the object is served.
    fn url(&self, path: &StoragePath) -> StorageResult<String>;
}

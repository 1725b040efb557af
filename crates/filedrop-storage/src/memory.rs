//! In-process storage backend.
//!
//! Objects live in a shared map for the lifetime of the process. Used for tests and
//! for running the service without touching the filesystem.

use crate::keys::StoragePath;
use crate::traits::{Metadata, Storage, StorageError, StorageReader, StorageResult, StorageWriter};
use crate::StorageBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

#[derive(Debug, Default, Clone)]
struct MemoryObject {
    data: Vec<u8>,
    metadata: Metadata,
}

type ObjectMap = HashMap<String, MemoryObject>;

#[derive(Clone)]
pub struct MemoryStorage {
    objects: Arc<Mutex<ObjectMap>>,
    base_url: String,
}

impl MemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            base_url: base_url.into(),
        }
    }

    fn check_scheme(path: &StoragePath) -> StorageResult<()> {
        if path.scheme() != StorageBackend::Memory.scheme() {
            return Err(StorageError::InvalidKey(format!(
                "Path {} does not belong to memory storage",
                path
            )));
        }
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, ObjectMap>> {
        lock_objects(&self.objects)
            .map_err(|e| StorageError::ConfigError(e.to_string()))
    }

    /// Store `data` under `key`, replacing anything there. Seeds fixtures; uploads go
    /// through [`Storage::open_write`] instead.
    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>) -> StorageResult<StoragePath> {
        let path = self.qualify(key)?;
        self.lock()?.insert(
            key.to_string(),
            MemoryObject {
                data: data.into(),
                metadata: Metadata::new(),
            },
        );
        Ok(path)
    }

    /// Snapshot of an object's content.
    pub fn contents(&self, path: &StoragePath) -> Option<Vec<u8>> {
        self.lock()
            .ok()?
            .get(path.key())
            .map(|object| object.data.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_objects(objects: &Mutex<ObjectMap>) -> io::Result<MutexGuard<'_, ObjectMap>> {
    objects
        .lock()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory storage lock poisoned"))
}

/// Appends written bytes straight into the shared object entry reserved by `open_write`.
struct MemoryWriter {
    objects: Arc<Mutex<ObjectMap>>,
    key: String,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut objects = lock_objects(&self.objects)?;
        match objects.get_mut(&self.key) {
            Some(object) => {
                object.data.extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("object {} was deleted while being written", self.key),
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }

    async fn open_write(&self, path: &StoragePath) -> StorageResult<StorageWriter> {
        Self::check_scheme(path)?;
        let mut objects = self.lock()?;
        if objects.contains_key(path.key()) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }
        objects.insert(path.key().to_string(), MemoryObject::default());

        Ok(Box::pin(MemoryWriter {
            objects: Arc::clone(&self.objects),
            key: path.key().to_string(),
        }))
    }

    async fn open_read(&self, path: &StoragePath) -> StorageResult<StorageReader> {
        Self::check_scheme(path)?;
        let data = self
            .lock()?
            .get(path.key())
            .map(|object| object.data.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        Ok(Box::pin(io::Cursor::new(data)))
    }

    async fn get_metadata(&self, path: &StoragePath) -> StorageResult<Metadata> {
        Self::check_scheme(path)?;
        self.lock()?
            .get(path.key())
            .map(|object| object.metadata.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn set_metadata(&self, path: &StoragePath, metadata: &Metadata) -> StorageResult<()> {
        Self::check_scheme(path)?;
        let mut objects = self.lock()?;
        let object = objects
            .get_mut(path.key())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        object.metadata = metadata.clone();
        Ok(())
    }

    async fn delete(&self, path: &StoragePath) -> StorageResult<()> {
        Self::check_scheme(path)?;
        self.lock()?.remove(path.key());
        Ok(())
    }

    fn url(&self, path: &StoragePath) -> StorageResult<String> {
        Self::check_scheme(path)?;
        Ok(format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.key()
        ))
    }
}

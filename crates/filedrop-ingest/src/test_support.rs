//! Storage doubles shared by the unit tests.

use async_trait::async_trait;
use filedrop_storage::{
    MemoryStorage, Metadata, Storage, StorageBackend, StorageError, StoragePath, StorageReader,
    StorageResult, StorageWriter,
};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// Wraps [`MemoryStorage`] and injects failures for selected keys.
pub struct FaultyStorage {
    inner: MemoryStorage,
    reject_metadata: Vec<String>,
    break_writes: Vec<String>,
    live_writers: Arc<AtomicUsize>,
    opened_writers: Arc<AtomicUsize>,
}

impl FaultyStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            reject_metadata: Vec::new(),
            break_writes: Vec::new(),
            live_writers: Arc::new(AtomicUsize::new(0)),
            opened_writers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of writers handed out and not yet dropped.
    pub fn live_writers(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live_writers)
    }

    /// Number of writers handed out in total.
    pub fn opened_writers(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opened_writers)
    }

    /// `set_metadata` fails for objects whose key ends with `suffix`.
    pub fn reject_metadata_for(mut self, suffix: &str) -> Self {
        self.reject_metadata.push(suffix.to_string());
        self
    }

    /// Writes fail mid-stream for objects whose key ends with `suffix`.
    pub fn break_writes_for(mut self, suffix: &str) -> Self {
        self.break_writes.push(suffix.to_string());
        self
    }
}

struct BrokenWriter;

impl AsyncWrite for BrokenWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "disk quota exceeded")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Keeps the live-writer count of its [`FaultyStorage`] honest.
struct TrackedWriter {
    inner: StorageWriter,
    live: Arc<AtomicUsize>,
}

impl Drop for TrackedWriter {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AsyncWrite for TrackedWriter {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.get_mut().inner.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().inner.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().inner.as_mut().poll_shutdown(cx)
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }

    async fn open_write(&self, path: &StoragePath) -> StorageResult<StorageWriter> {
        let writer = self.inner.open_write(path).await?;
        let writer: StorageWriter = if self.break_writes.iter().any(|s| path.key().ends_with(s.as_str())) {
            Box::pin(BrokenWriter)
        } else {
            writer
        };
        self.live_writers.fetch_add(1, Ordering::SeqCst);
        self.opened_writers.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(TrackedWriter {
            inner: writer,
            live: Arc::clone(&self.live_writers),
        }))
    }

    async fn open_read(&self, path: &StoragePath) -> StorageResult<StorageReader> {
        self.inner.open_read(path).await
    }

    async fn get_metadata(&self, path: &StoragePath) -> StorageResult<Metadata> {
        self.inner.get_metadata(path).await
    }

    async fn set_metadata(&self, path: &StoragePath, metadata: &Metadata) -> StorageResult<()> {
        if self.reject_metadata.iter().any(|s| path.key().ends_with(s.as_str())) {
            return Err(StorageError::MetadataFailed("read-only object".to_string()));
        }
        self.inner.set_metadata(path, metadata).await
    }

    async fn delete(&self, path: &StoragePath) -> StorageResult<()> {
        self.inner.delete(path).await
    }

    fn url(&self, path: &StoragePath) -> StorageResult<String> {
        self.inner.url(path)
    }
}

/// Builds raw `multipart/form-data` bodies.
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "filedrop-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn field(mut self, name: &str, value: &str) -> Self {
        let head = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
            self.boundary, name
        );
        self.body.extend_from_slice(head.as_bytes());
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn file(self, name: &str, file_name: &str, data: &[u8]) -> Self {
        self.file_with_disposition(
            &format!("form-data; name=\"{}\"; filename=\"{}\"", name, file_name),
            data,
        )
    }

    pub fn file_with_disposition(mut self, disposition: &str, data: &[u8]) -> Self {
        let head = format!(
            "--{}\r\nContent-Disposition: {}\r\nContent-Type: application/octet-stream\r\n\r\n",
            self.boundary, disposition
        );
        self.body.extend_from_slice(head.as_bytes());
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}

/// Split a body into small chunks so parts straddle chunk boundaries.
pub fn chunked(
    body: Vec<u8>,
    chunk_size: usize,
) -> impl futures::Stream<Item = Result<bytes::Bytes, io::Error>> + Send + 'static {
    let chunks: Vec<Result<bytes::Bytes, io::Error>> = body
        .chunks(chunk_size)
        .map(|c| Ok(bytes::Bytes::copy_from_slice(c)))
        .collect();
    futures::stream::iter(chunks)
}

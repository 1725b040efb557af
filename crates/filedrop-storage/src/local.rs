use crate::keys::StoragePath;
use crate::traits::{Metadata, Storage, StorageError, StorageReader, StorageResult, StorageWriter};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Directory under the storage root holding JSON metadata sidecars.
const METADATA_DIR: &str = ".metadata";

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/filedrop/files")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:3000/files")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    fn check_scheme(&self, path: &StoragePath) -> StorageResult<()> {
        if path.scheme() != StorageBackend::Local.scheme() {
            return Err(StorageError::InvalidKey(format!(
                "Path {} does not belong to local storage",
                path
            )));
        }
        Ok(())
    }

    /// Convert storage path to filesystem path
    ///
    /// Keys are already validated by `StoragePath`; this additionally keeps callers
    /// out of the metadata directory and verifies the path resolves under the base
    /// directory. Objects that do not exist yet are checked through their nearest
    /// existing ancestor, so a symlinked subdirectory cannot redirect new writes.
    fn object_path(&self, path: &StoragePath) -> StorageResult<PathBuf> {
        self.check_scheme(path)?;
        if path.key() == METADATA_DIR || path.key().starts_with(&format!("{}/", METADATA_DIR)) {
            return Err(StorageError::InvalidKey(
                "Storage key addresses a reserved directory".to_string(),
            ));
        }

        let full = self.base_path.join(path.key());

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        let mut existing = full.as_path();
        let resolved = loop {
            match existing.canonicalize() {
                Ok(canonical) => break canonical,
                Err(_) => match existing.parent() {
                    Some(parent) => existing = parent,
                    None => {
                        return Err(StorageError::InvalidKey(
                            "Storage key resolves outside storage directory".to_string(),
                        ))
                    }
                },
            }
        };

        if resolved.strip_prefix(&base_canonical).is_err() {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(full)
    }

    fn metadata_path(&self, path: &StoragePath) -> PathBuf {
        self.base_path
            .join(METADATA_DIR)
            .join(format!("{}.json", path.key()))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    async fn open_write(&self, path: &StoragePath) -> StorageResult<StorageWriter> {
        let full = self.object_path(path)?;
        self.ensure_parent_dir(&full).await?;

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    StorageError::AlreadyExists(path.to_string())
                } else {
                    StorageError::WriteFailed(format!(
                        "Failed to create file {}: {}",
                        full.display(),
                        e
                    ))
                }
            })?;

        tracing::debug!(path = %full.display(), key = %path.key(), "Local storage opened for write");

        Ok(Box::pin(file))
    }

    async fn open_read(&self, path: &StoragePath) -> StorageResult<StorageReader> {
        let full = self.object_path(path)?;

        let file = fs::File::open(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(path.to_string())
            } else {
                StorageError::ReadFailed(format!("Failed to open file {}: {}", full.display(), e))
            }
        })?;

        Ok(Box::pin(file))
    }

    async fn get_metadata(&self, path: &StoragePath) -> StorageResult<Metadata> {
        let full = self.object_path(path)?;
        if !fs::try_exists(&full).await.unwrap_or(false) {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let sidecar = self.metadata_path(path);
        match fs::read(&sidecar).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                StorageError::MetadataFailed(format!(
                    "Corrupt metadata {}: {}",
                    sidecar.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Metadata::new()),
            Err(e) => Err(StorageError::MetadataFailed(format!(
                "Failed to read metadata {}: {}",
                sidecar.display(),
                e
            ))),
        }
    }

    async fn set_metadata(&self, path: &StoragePath, metadata: &Metadata) -> StorageResult<()> {
        let full = self.object_path(path)?;
        if !fs::try_exists(&full).await.unwrap_or(false) {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let sidecar = self.metadata_path(path);
        self.ensure_parent_dir(&sidecar).await?;

        let raw = serde_json::to_vec_pretty(metadata)
            .map_err(|e| StorageError::MetadataFailed(e.to_string()))?;
        fs::write(&sidecar, raw).await.map_err(|e| {
            StorageError::MetadataFailed(format!(
                "Failed to write metadata {}: {}",
                sidecar.display(),
                e
            ))
        })?;

        tracing::debug!(
            key = %path.key(),
            properties = metadata.len(),
            "Local storage metadata updated"
        );

        Ok(())
    }

    async fn delete(&self, path: &StoragePath) -> StorageResult<()> {
        let full = self.object_path(path)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&full).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&full).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", full.display(), e))
        })?;

        let sidecar = self.metadata_path(path);
        if fs::try_exists(&sidecar).await.unwrap_or(false) {
            fs::remove_file(&sidecar).await?;
        }

        tracing::info!(
            path = %full.display(),
            key = %path.key(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    fn url(&self, path: &StoragePath) -> StorageResult<String> {
        self.check_scheme(path)?;
        let encoded: Vec<String> = path
            .key()
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        Ok(format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            encoded.join("/")
        ))
    }
}

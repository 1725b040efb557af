//! Shared key handling for storage backends.
//!
//! A key is a relative, `/`-separated path. Keys must not be absolute, must not contain
//! `.`/`..` or empty segments, and must not contain backslashes or NUL bytes.

use crate::traits::{StorageError, StorageResult};
use std::fmt::{Display, Formatter, Result as FmtResult};

const SCHEME_SEPARATOR: &str = "://";

/// Scheme-qualified storage address (`local://avatars/me.png`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoragePath {
    scheme: String,
    key: String,
}

impl StoragePath {
    pub fn new(scheme: &str, key: &str) -> StorageResult<Self> {
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(StorageError::InvalidKey(format!(
                "Invalid storage scheme: {}",
                scheme
            )));
        }
        validate_key(key)?;
        Ok(Self {
            scheme: scheme.to_string(),
            key: key.to_string(),
        })
    }

    /// Parse a qualified address such as `memory://docs/a.txt`.
    pub fn parse(qualified: &str) -> StorageResult<Self> {
        let (scheme, key) = qualified.split_once(SCHEME_SEPARATOR).ok_or_else(|| {
            StorageError::InvalidKey(format!("Missing scheme in storage path: {}", qualified))
        })?;
        Self::new(scheme, key)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl Display for StoragePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}{}{}", self.scheme, SCHEME_SEPARATOR, self.key)
    }
}

/// Validate a full object key.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Storage key must be relative".to_string(),
        ));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains an invalid segment: {}",
            key
        )));
    }
    Ok(())
}

/// Normalize a caller-supplied target directory. Surrounding slashes are dropped; the
/// empty string designates the storage root.
pub fn normalize_directory(dir: &str) -> StorageResult<String> {
    let trimmed = dir.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    validate_key(trimmed)?;
    Ok(trimmed.to_string())
}

/// Join a normalized directory and a single file name into an object key.
pub fn join_key(dir: &str, file_name: &str) -> StorageResult<String> {
    if file_name.is_empty() || file_name.contains('/') {
        return Err(StorageError::InvalidKey(format!(
            "Invalid file name: {}",
            file_name
        )));
    }
    let key = if dir.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", dir, file_name)
    };
    validate_key(&key)?;
    Ok(key)
}

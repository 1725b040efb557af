use filedrop_storage::keys;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::HeaderMap;

use crate::error::IngestError;

/// The non-body half of an upload: request headers, target directory and the caller
/// identity handed over by the authorization layer.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub headers: HeaderMap,
    pub target_dir: String,
    pub identity: Option<String>,
}

impl UploadRequest {
    pub fn new(headers: HeaderMap, target_dir: impl Into<String>) -> Self {
        Self {
            headers,
            target_dir: target_dir.into(),
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Multipart boundary from the Content-Type header. Anything that is not
    /// `multipart/form-data` is rejected before the body is touched.
    pub fn boundary(&self) -> Result<String, IngestError> {
        let content_type = self
            .headers
            .get(CONTENT_TYPE)
            .ok_or_else(|| IngestError::UnsupportedMediaType("no Content-Type".to_string()))?
            .to_str()
            .map_err(|_| IngestError::UnsupportedMediaType("unreadable Content-Type".to_string()))?;

        multer::parse_boundary(content_type).map_err(|e| match e {
            multer::Error::NoBoundary => IngestError::MalformedMultipart(e.to_string()),
            _ => IngestError::UnsupportedMediaType(content_type.to_string()),
        })
    }

    /// Refuse a body whose declared Content-Length is already over `limit`. Bodies
    /// without a length are bounded while streaming.
    pub fn check_declared_length(&self, limit: u64) -> Result<(), IngestError> {
        let declared = self
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        match declared {
            Some(length) if length > limit => Err(IngestError::PayloadTooLarge(format!(
                "body of {} bytes exceeds limit of {} bytes",
                length, limit
            ))),
            _ => Ok(()),
        }
    }

    pub fn directory(&self) -> Result<String, IngestError> {
        keys::normalize_directory(&self.target_dir)
            .map_err(|e| IngestError::InvalidTarget(e.to_string()))
    }
}

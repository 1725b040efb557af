//! Request-fatal ingestion errors.
//!
//! Anything that makes the whole upload unusable ends up here. Problems confined to a
//! single part are recorded as [`PartFailure`](filedrop_core::PartFailure) instead.

use filedrop_core::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Expected multipart/form-data, got {0}")]
    UnsupportedMediaType(String),

    #[error("Malformed multipart body: {0}")]
    MalformedMultipart(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Invalid target directory: {0}")]
    InvalidTarget(String),
}

impl From<multer::Error> for IngestError {
    fn from(err: multer::Error) -> Self {
        match err {
            multer::Error::FieldSizeExceeded { .. } | multer::Error::StreamSizeExceeded { .. } => {
                IngestError::PayloadTooLarge(err.to_string())
            }
            multer::Error::NoMultipart | multer::Error::DecodeContentType(_) => {
                IngestError::UnsupportedMediaType(err.to_string())
            }
            _ => IngestError::MalformedMultipart(err.to_string()),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::UnsupportedMediaType(msg) => {
                AppError::UnsupportedMediaType(format!("Expected multipart/form-data, got {}", msg))
            }
            IngestError::MalformedMultipart(msg) => AppError::MalformedMultipart(msg),
            IngestError::PayloadTooLarge(msg) => AppError::PayloadTooLarge(msg),
            IngestError::InvalidTarget(msg) => {
                AppError::InvalidInput(format!("Invalid target directory: {}", msg))
            }
        }
    }
}

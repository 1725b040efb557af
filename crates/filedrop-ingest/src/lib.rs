//! filedrop ingestion library
//!
//! Streams `multipart/form-data` uploads into a [`Storage`](filedrop_storage::Storage)
//! backend. Each part is classified as it arrives; file bytes go straight to a storage
//! write-stream, form fields are buffered, and per-file properties are correlated once
//! the whole body has been read.

pub mod classifier;
pub mod coordinator;
pub mod error;
pub mod naming;
pub mod properties;
pub mod request;
pub mod service;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use coordinator::{IngestState, IngestionCoordinator};
pub use error::IngestError;
pub use naming::{NamingResolver, PlaceholderTemplate, TemplateContext, TemplateEngine, TemplateError};
pub use properties::{PropertyCollector, RegisteredFile};
pub use request::UploadRequest;
pub use service::{IngestOptions, IngestService};

//! Part classification and byte routing.
//!
//! Every multipart part is classified once, from its headers alone: a part whose
//! Content-Disposition carries a `filename` is a file upload, anything else is a form
//! field. Form fields are buffered in memory (they are small); file bytes are copied
//! chunk by chunk into a storage write-stream as they arrive.

use bytes::{Bytes, BytesMut};
use filedrop_storage::StorageWriter;
use http::header::CONTENT_DISPOSITION;
use http::HeaderMap;
use multer::Field;
use tokio::io::AsyncWriteExt;

use crate::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    FormField,
    FileUpload,
}

/// Everything known about a part before its body is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartHead {
    pub index: usize,
    pub name: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    /// `size=` parameter of the Content-Disposition header, if the client sent one.
    pub declared_size: Option<u64>,
}

impl PartHead {
    pub fn from_field(field: &Field<'_>) -> Self {
        Self {
            index: field.index(),
            name: field.name().filter(|n| !n.is_empty()).map(str::to_string),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(|m| m.to_string()),
            declared_size: declared_size(field.headers()),
        }
    }

    /// Name used in logs and failure records.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.file_name.clone())
            .unwrap_or_else(|| format!("part #{}", self.index))
    }
}

/// Browsers send `filename=""` for an empty file input; that is not a file.
pub fn classify(head: &PartHead) -> PartKind {
    match head.file_name.as_deref() {
        Some(name) if !name.is_empty() => PartKind::FileUpload,
        _ => PartKind::FormField,
    }
}

/// Extract the `size` parameter from a part's Content-Disposition header.
pub fn declared_size(headers: &HeaderMap) -> Option<u64> {
    let disposition = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    disposition.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("size") {
            return None;
        }
        value.trim().trim_matches('"').parse::<u64>().ok()
    })
}

/// Why copying a file part into storage stopped.
#[derive(Debug)]
pub enum StreamError {
    /// The request body failed; the whole request is unusable.
    Source(IngestError),
    /// The storage write-stream failed; only this part is affected.
    Sink(std::io::Error),
}

/// Buffer a form field, refusing anything larger than `limit` bytes.
pub async fn buffer_field(field: &mut Field<'_>, limit: usize) -> Result<Bytes, IngestError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        if buf.len() + chunk.len() > limit {
            return Err(IngestError::PayloadTooLarge(format!(
                "form field exceeds {} bytes",
                limit
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Copy a file part into `writer` and close it. Returns the number of bytes written.
pub async fn stream_into(field: &mut Field<'_>, writer: &mut StorageWriter) -> Result<u64, StreamError> {
    let mut written = 0u64;
    loop {
        let chunk = field
            .chunk()
            .await
            .map_err(|e| StreamError::Source(e.into()))?;
        let Some(chunk) = chunk else { break };
        writer.write_all(&chunk).await.map_err(StreamError::Sink)?;
        written += chunk.len() as u64;
    }
    writer.shutdown().await.map_err(StreamError::Sink)?;
    Ok(written)
}

/// Discard the rest of a part so the next one can be read.
pub async fn drain(field: &mut Field<'_>) -> Result<(), IngestError> {
    while field.chunk().await?.is_some() {}
    Ok(())
}

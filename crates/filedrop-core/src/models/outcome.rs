use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::FileDescriptor;

/// Why a single part did not make it into (or was only partially finalised in) the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The caller's naming template could not be evaluated; the file was skipped.
    NamingTemplateFailure,
    /// The write-stream could not be opened or failed mid-stream; the file was skipped.
    StorageWriteFailure,
    /// Properties could not be persisted; the file itself is still reported as stored.
    MetadataCorrelationFailure,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FailureKind::NamingTemplateFailure => write!(f, "naming_template_failure"),
            FailureKind::StorageWriteFailure => write!(f, "storage_write_failure"),
            FailureKind::MetadataCorrelationFailure => write!(f, "metadata_correlation_failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartFailure {
    /// Disposition name, file name, or descriptor key identifying the part.
    pub part: String,
    pub kind: FailureKind,
    pub message: String,
}

impl PartFailure {
    pub fn new(part: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            part: part.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Result of one multipart ingestion.
///
/// `files` keeps arrival order and serializes as an object keyed by descriptor key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestOutcome {
    #[serde(serialize_with = "serialize_files_by_key")]
    pub files: Vec<FileDescriptor>,
    pub failures: Vec<PartFailure>,
}

impl IngestOutcome {
    pub fn file(&self, key: &str) -> Option<&FileDescriptor> {
        self.files.iter().find(|f| f.key == key)
    }

    pub fn failures_of(&self, kind: FailureKind) -> impl Iterator<Item = &PartFailure> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }
}

fn serialize_files_by_key<S>(files: &[FileDescriptor], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(files.len()))?;
    for file in files {
        map.serialize_entry(&file.key, file)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyBag;
    use chrono::Utc;

    fn descriptor(key: &str) -> FileDescriptor {
        FileDescriptor {
            key: key.to_string(),
            path: format!("memory://{}.bin", key),
            size: 3,
            created_at: Utc::now(),
            url: format!("memory://{}.bin", key),
            content_type: None,
            properties: PropertyBag::new(),
        }
    }

    #[test]
    fn files_serialize_keyed_by_descriptor_key() {
        let outcome = IngestOutcome {
            files: vec![descriptor("avatar"), descriptor("banner")],
            failures: vec![PartFailure::new(
                "cv",
                FailureKind::StorageWriteFailure,
                "already exists",
            )],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["files"]["avatar"]["path"], "memory://avatar.bin");
        assert_eq!(json["files"]["banner"]["size"], 3);
        assert_eq!(json["failures"][0]["kind"], "storage_write_failure");
    }

    #[test]
    fn lookup_by_key_and_kind() {
        let outcome = IngestOutcome {
            files: vec![descriptor("avatar")],
            failures: vec![
                PartFailure::new("a", FailureKind::NamingTemplateFailure, "x"),
                PartFailure::new("b", FailureKind::MetadataCorrelationFailure, "y"),
            ],
        };
        assert!(outcome.file("avatar").is_some());
        assert!(outcome.file("missing").is_none());
        assert_eq!(
            outcome
                .failures_of(FailureKind::MetadataCorrelationFailure)
                .count(),
            1
        );
    }
}

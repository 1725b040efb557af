use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PropertyBag;

/// One accepted, durably stored upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Disposition name of the part, or the generated file name when the part had none
    /// (or its name was already taken by an earlier file in the same request).
    pub key: String,
    /// Scheme-qualified storage address, e.g. `local://avatars/20240101120000-42.png`.
    pub path: String,
    /// Bytes written; replaced by the part's declared size when it carried one.
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub properties: PropertyBag,
}

//! Shared constants

/// Reserved prefix for caller-supplied naming templates and per-file properties.
pub const DEFAULT_CUSTOM_HEADER_PREFIX: &str = "x-custom-";

/// Suffix of the header carrying a per-field naming template (`<prefix><field>.name`).
pub const NAME_TEMPLATE_SUFFIX: &str = ".name";

/// Identity reported for callers when no API keys are configured.
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

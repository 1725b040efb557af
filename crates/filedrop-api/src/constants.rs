//! API constants

/// Versioned API prefix used by every upload route
pub const API_PREFIX: &str = "/api/v0";

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

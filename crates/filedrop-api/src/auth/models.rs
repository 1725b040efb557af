use crate::error::HttpAppError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use filedrop_core::AppError;

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub identity: Option<String>,
    /// Why access was denied; shown to the caller.
    pub reason: Option<String>,
}

impl AccessDecision {
    pub fn allow(identity: impl Into<String>) -> Self {
        Self {
            allowed: true,
            identity: Some(identity.into()),
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            identity: None,
            reason: Some(reason.into()),
        }
    }
}

/// Decides whether a request may upload, from its headers alone.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, headers: &HeaderMap) -> AccessDecision;
}

/// Identity of an authorized caller, stored in request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity(pub String);

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing caller identity".to_string(),
                ))
            })
    }
}

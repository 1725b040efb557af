use super::models::{Authorizer, CallerIdentity};
use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use filedrop_core::AppError;
use std::sync::Arc;

/// Reject unauthorized callers before any part of the body is read.
pub async fn auth_middleware(
    State(authorizer): State<Arc<dyn Authorizer>>,
    mut request: Request,
    next: Next,
) -> Response {
    let decision = authorizer.authorize(request.headers()).await;

    if !decision.allowed {
        let reason = decision
            .reason
            .unwrap_or_else(|| "Access denied".to_string());
        tracing::debug!(reason = %reason, path = %request.uri().path(), "Rejected caller");
        return HttpAppError(AppError::Unauthorized(reason)).into_response();
    }

    let identity = decision
        .identity
        .unwrap_or_else(|| filedrop_core::constants::ANONYMOUS_IDENTITY.to_string());
    tracing::debug!(identity = %identity, "Caller authorized");
    request.extensions_mut().insert(CallerIdentity(identity));
    next.run(request).await
}

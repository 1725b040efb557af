//! Multipart upload endpoints.
//!
//! The body is handed to the ingestion service as a byte stream; nothing is buffered
//! here. The target directory comes from `?dir=` or from the path tail.

use crate::auth::CallerIdentity;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, Request, State},
    Json,
};
use filedrop_core::IngestOutcome;
use filedrop_ingest::UploadRequest;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub dir: Option<String>,
}

pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Query(query): Query<UploadQuery>,
    request: Request,
) -> Result<Json<IngestOutcome>, HttpAppError> {
    ingest(&state, caller, query.dir.unwrap_or_default(), request).await
}

pub async fn upload_files_to(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Path(dir): Path<String>,
    request: Request,
) -> Result<Json<IngestOutcome>, HttpAppError> {
    ingest(&state, caller, dir, request).await
}

async fn ingest(
    state: &AppState,
    caller: CallerIdentity,
    dir: String,
    request: Request,
) -> Result<Json<IngestOutcome>, HttpAppError> {
    let (parts, body) = request.into_parts();
    let upload = UploadRequest::new(parts.headers, dir).with_identity(caller.0);

    let outcome = state
        .ingest
        .ingest(&upload, body.into_data_stream())
        .await?;

    Ok(Json(outcome))
}

use crate::auth::CallerIdentity;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

/// Stream a stored object back by key. This is what descriptor URLs point at when the
/// configured base URL is this server's `/files`.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    _caller: CallerIdentity,
    Path(key): Path<String>,
) -> Result<Response, HttpAppError> {
    let path = state.storage.qualify(&key)?;
    let reader = state.storage.open_read(&path).await?;

    tracing::debug!(path = %path, "Serving stored file");

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response())
}

use std::io;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use futures::TryStreamExt;
use serde::Serialize;
use stow_store::{StorageBackend, StoreError, StoreOutcome};
use stow_types::{MetadataDocument, VirtualPath};
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::info;

use crate::error::ServerResult;

/// Response header carrying the digest of the returned blob.
pub const DIGEST_HEADER: HeaderName = HeaderName::from_static("x-stow-digest");

/// Shared handler state: the store handle built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn StorageBackend>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HashExistsResponse {
    pub exists: bool,
}

fn parse_path(raw: &str) -> ServerResult<VirtualPath> {
    Ok(VirtualPath::parse(raw).map_err(StoreError::from)?)
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /store/*path`: stream the request body into the store.
pub async fn store_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Body,
) -> ServerResult<Json<StoreOutcome>> {
    let path = parse_path(&raw)?;
    let stream = body.into_data_stream().map_err(io::Error::other);
    let mut reader = StreamReader::new(stream);

    let outcome = state.backend.store_data(&path, &mut reader).await?;
    if outcome.updated {
        info!(path = %path, sha512 = %outcome.strong_digest, new_file = outcome.new_file, "updated");
    } else {
        info!(path = %path, sha512 = %outcome.strong_digest, "unchanged");
    }
    Ok(Json(outcome))
}

/// `GET /store/*path`: stream the latest version, or 404 with no body.
pub async fn retrieve_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ServerResult<Response> {
    let path = parse_path(&raw)?;
    let Some((digest, reader)) = state.backend.open_latest(&path).await? else {
        info!(path = %path, "does not exist");
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    info!(path = %path, sha512 = %digest, "retrieving");
    let mut response = Body::from_stream(ReaderStream::new(reader)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(value) = HeaderValue::from_str(digest.as_hex()) {
        headers.insert(DIGEST_HEADER, value);
    }
    Ok(response)
}

/// `GET /meta/*path`: the full version history (empty when never written).
pub async fn meta_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ServerResult<Json<MetadataDocument>> {
    let path = parse_path(&raw)?;
    Ok(Json(state.backend.retrieve_meta(&path).await?))
}

/// `GET /hash/:digest`: whether a blob with this digest is stored.
pub async fn hash_handler(
    State(state): State<AppState>,
    Path(digest): Path<String>,
) -> ServerResult<Json<HashExistsResponse>> {
    let exists = state.backend.hash_exists(&digest).await?;
    Ok(Json(HashExistsResponse { exists }))
}

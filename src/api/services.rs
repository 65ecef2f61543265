use axum::{Json, body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, info};

use super::{
    error::ApiError,
    models::{BatchAccepted, HealthResponse, ImageLoadRequest, ImageLoadResponse, StatusResponse},
    state::AppState,
};
use crate::catalog::parse_catalog;

/// Health check endpoint (GET /health)
///
/// Always 200 while the process can answer; `running` reports whether the
/// background triggers are active.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        running: state.service.is_running().await,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}

/// Published cache state, connectivity and counters (GET /status)
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let service = &state.service;
    let snapshot = service.snapshot();
    let response = StatusResponse::build(
        &snapshot,
        service.is_running().await,
        service.connectivity(),
        service.metrics(),
    );

    (StatusCode::OK, Json(response))
}

/// Force a full refresh of every tracked image (POST /refresh)
///
/// Returns as soon as the fetches are issued; progress is visible on `/status`.
pub async fn refresh(State(state): State<AppState>) -> impl IntoResponse {
    let batch = state.service.request_refresh().await;
    info!(fetching = batch.len(), "Full refresh requested");

    let response = BatchAccepted {
        tracked: state.service.snapshot().catalog.len(),
        fetching: batch.len(),
    };
    (StatusCode::ACCEPTED, Json(response))
}

/// Retry or immediately load one identity (POST /images/load)
pub async fn load_image(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, ApiError> {
    let request: ImageLoadRequest = serde_json::from_slice(&body)?;
    let url = request.url.trim().to_string();
    if url.is_empty() {
        return Err(ApiError::InvalidPayload("url must not be empty".to_string()));
    }

    let service = &state.service;
    let tracked = service
        .snapshot()
        .catalog
        .iter()
        .any(|descriptor| descriptor.url == url && descriptor.is_image());
    if !tracked {
        return Err(ApiError::NotFound(format!("image {url}")));
    }

    service.record_access(&url).await;
    let scheduled = service.request_image(&url).await.is_some();
    debug!(url = %url, scheduled, "Image load requested");

    let status = if scheduled {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ImageLoadResponse { url, scheduled })))
}

/// Preload a catalog supplied by the caller (POST /catalog)
///
/// Accepts any catalog shape the collection endpoints may return.
pub async fn supply_catalog(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, ApiError> {
    let descriptors = parse_catalog(&body)?;
    let tracked = descriptors.len();
    let batch = state.service.supply_catalog(descriptors).await;
    info!(tracked, fetching = batch.len(), "Catalog supplied");

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchAccepted {
            tracked,
            fetching: batch.len(),
        }),
    ))
}

//! Administrative routes: cache control and session-store maintenance.
//!
//! Instances do not invalidate each other; `POST /admin/cache/reload` is
//! the operator's escape hatch when cross-instance drift is suspected.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::info;

use crate::application::error::AppError;

use crate::infra::http::{AppState, db_health_response};

pub async fn reload_cache(State(state): State<AppState>) -> Response {
    info!("administrative cache reload requested");
    state.cache.reload().await;
    StatusCode::NO_CONTENT.into_response()
}

pub async fn invalidate_cache_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Response {
    // Trailing `*` selects prefix invalidation, mirroring how compound
    // writes clear derived views.
    if let Some(prefix) = key.strip_suffix('*') {
        state.cache.invalidate_pattern(prefix);
    } else {
        state.cache.invalidate(&key);
    }
    StatusCode::NO_CONTENT.into_response()
}

pub async fn count_http_sessions(State(state): State<AppState>) -> Result<Response, AppError> {
    let durable = state.sessions.len().await?;
    let resident = state.sessions.resident_len();
    Ok(Json(json!({ "durable": durable, "resident": resident })).into_response())
}

pub async fn clear_http_sessions(State(state): State<AppState>) -> Result<Response, AppError> {
    state.sessions.clear().await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn sweep_http_sessions(State(state): State<AppState>) -> Response {
    let removed = state.sessions.sweep();
    Json(json!({ "removed": removed })).into_response()
}

pub async fn db_health(State(state): State<AppState>) -> Response {
    db_health_response(state.db.health_check().await)
}

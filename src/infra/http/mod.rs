//! HTTP surface: the JSON API, admin routes, and health checks.

pub mod api;
mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use sqlx::Error as SqlxError;

use crate::cache::{SessionStore, StudioCache};
use crate::infra::db::PostgresGateway;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<StudioCache>,
    pub sessions: Arc<SessionStore>,
    pub db: PostgresGateway,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .merge(api::api_routes())
        .merge(api::admin_routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::session_context,
        ))
        .layer(axum::middleware::from_fn(middleware::log_responses))
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> Response {
    db_health_response(state.db.health_check().await)
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "database health check failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

//! Request middleware: response logging and session resolution.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::middleware::Next;
use axum::response::Response;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::domain::entities::StoredSession;

use super::AppState;

const SESSION_COOKIE: &str = "sid";
const SESSION_LIFETIME: Duration = Duration::hours(24);

pub async fn log_responses(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    debug!(
        %method,
        path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "handled request"
    );
    response
}

/// Resolve the `sid` cookie into a [`StoredSession`] request extension and
/// slide the in-memory expiry forward. Requests without a session pass
/// through untouched.
pub async fn session_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(sid) = session_cookie(&request) {
        match state.sessions.get(&sid).await {
            Ok(Some(session)) => {
                state
                    .sessions
                    .touch(&sid, OffsetDateTime::now_utc() + SESSION_LIFETIME);
                request.extensions_mut().insert::<StoredSession>(session);
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "session lookup failed"),
        }
    }
    next.run(request).await
}

fn session_cookie(request: &Request) -> Option<String> {
    let header = request.headers().get(COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

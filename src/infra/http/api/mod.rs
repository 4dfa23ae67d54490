pub mod handlers;
pub mod models;

mod admin;

use axum::{
    Router,
    routing::{delete, get, post},
};

use super::AppState;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/songs",
            get(handlers::list_songs).post(handlers::create_song),
        )
        .route(
            "/api/v1/songs/{id}",
            get(handlers::get_song)
                .patch(handlers::update_song)
                .delete(handlers::delete_song),
        )
        .route("/api/v1/songs/{id}/pitches", get(handlers::list_song_pitches))
        .route(
            "/api/v1/singers",
            get(handlers::list_singers).post(handlers::create_singer),
        )
        .route(
            "/api/v1/singers/{id}",
            get(handlers::get_singer)
                .patch(handlers::update_singer)
                .delete(handlers::delete_singer),
        )
        .route(
            "/api/v1/singers/{target}/merge/{source}",
            post(handlers::merge_singers),
        )
        .route(
            "/api/v1/pitches",
            get(handlers::list_pitches).post(handlers::create_pitch),
        )
        .route(
            "/api/v1/pitches/{id}",
            get(handlers::get_pitch)
                .patch(handlers::update_pitch)
                .delete(handlers::delete_pitch),
        )
        .route(
            "/api/v1/templates",
            get(handlers::list_templates).post(handlers::create_template),
        )
        .route(
            "/api/v1/templates/{id}",
            get(handlers::get_template)
                .patch(handlers::update_template)
                .delete(handlers::delete_template),
        )
        .route(
            "/api/v1/templates/{id}/default",
            post(handlers::set_default_template),
        )
        .route(
            "/api/v1/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/api/v1/sessions/{id}",
            get(handlers::get_session)
                .patch(handlers::rename_session)
                .delete(handlers::delete_session),
        )
        .route(
            "/api/v1/sessions/{id}/items",
            get(handlers::list_session_items).put(handlers::replace_session_items),
        )
        .route(
            "/api/v1/centers",
            get(handlers::list_centers).post(handlers::create_center),
        )
        .route(
            "/api/v1/centers/{id}",
            get(handlers::get_center)
                .patch(handlers::update_center)
                .delete(handlers::delete_center),
        )
        .route(
            "/api/v1/feedback",
            get(handlers::list_feedback).post(handlers::create_feedback),
        )
        .route("/api/v1/feedback/{id}", delete(handlers::delete_feedback))
        .route("/api/v1/export/{entity}", get(handlers::download_export))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/cache/reload", post(admin::reload_cache))
        .route(
            "/admin/cache/invalidate/{key}",
            post(admin::invalidate_cache_key),
        )
        .route(
            "/admin/sessions",
            get(admin::count_http_sessions).delete(admin::clear_http_sessions),
        )
        .route("/admin/sessions/sweep", post(admin::sweep_http_sessions))
        .route("/admin/db/health", get(admin::db_health))
}

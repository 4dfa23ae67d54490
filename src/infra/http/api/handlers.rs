//! JSON API handlers. Every handler is a thin shim: decode the request,
//! call the cache, map the error. The cache owns all consistency rules.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::domain::types::EntityKind;

use super::models::{
    CreateCenterRequest, CreateFeedbackRequest, CreatePitchRequest, CreateSessionRequest,
    CreateSingerRequest, CreateSongRequest, CreateTemplateRequest, RenameSessionRequest,
    ReplaceSessionItemsRequest, UpdateCenterRequest, UpdatePitchRequest, UpdateSingerRequest,
    UpdateSongRequest, UpdateTemplateRequest,
};
use crate::infra::http::AppState;

type ApiResult = Result<Response, AppError>;

/// List endpoints degrade to an empty collection when the storage read
/// fails, keeping read paths available through database hiccups.
fn list_or_empty<T: Serialize + Clone>(
    result: Result<Arc<Vec<T>>, RepoError>,
    entity: &'static str,
) -> Response {
    match result {
        Ok(rows) => Json(rows.as_ref().clone()).into_response(),
        Err(err) => {
            warn!(error = %err, entity, "list read failed; serving empty collection");
            Json(Vec::<T>::new()).into_response()
        }
    }
}

// ============================================================================
// Songs
// ============================================================================

pub async fn list_songs(State(state): State<AppState>) -> Response {
    list_or_empty(state.cache.songs_light().await, "songs")
}

pub async fn get_song(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let song = state
        .cache
        .song_full(id)
        .await?
        .ok_or(DomainError::not_found("song"))?;
    Ok(Json(song).into_response())
}

pub async fn create_song(
    State(state): State<AppState>,
    Json(request): Json<CreateSongRequest>,
) -> ApiResult {
    if request.name.trim().is_empty() {
        return Err(DomainError::validation("song name must not be empty").into());
    }
    let song = state.cache.create_song(request.into()).await?;
    Ok((StatusCode::CREATED, Json(song)).into_response())
}

pub async fn update_song(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSongRequest>,
) -> ApiResult {
    let song = state.cache.update_song(id, request.into()).await?;
    Ok(Json(song).into_response())
}

pub async fn delete_song(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    state.cache.delete_song(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_song_pitches(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    list_or_empty(state.cache.pitches_for_song(id).await, "pitches")
}

// ============================================================================
// Singers
// ============================================================================

pub async fn list_singers(State(state): State<AppState>) -> Response {
    list_or_empty(state.cache.singers().await, "singers")
}

pub async fn get_singer(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let singer = state
        .cache
        .singer_by_id(id)
        .await?
        .ok_or(DomainError::not_found("singer"))?;
    Ok(Json(singer).into_response())
}

pub async fn create_singer(
    State(state): State<AppState>,
    Json(request): Json<CreateSingerRequest>,
) -> ApiResult {
    if request.name.trim().is_empty() {
        return Err(DomainError::validation("singer name must not be empty").into());
    }
    let singer = state.cache.create_singer(request.into()).await?;
    Ok((StatusCode::CREATED, Json(singer)).into_response())
}

pub async fn update_singer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSingerRequest>,
) -> ApiResult {
    let singer = state.cache.update_singer(id, request.into()).await?;
    Ok(Json(singer).into_response())
}

pub async fn delete_singer(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    state.cache.delete_singer(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn merge_singers(
    State(state): State<AppState>,
    Path((target, source)): Path<(Uuid, Uuid)>,
) -> ApiResult {
    if target == source {
        return Err(DomainError::validation("cannot merge a singer into itself").into());
    }
    let merged = state.cache.merge_singers(target, source).await?;
    Ok(Json(merged).into_response())
}

// ============================================================================
// Pitches
// ============================================================================

pub async fn list_pitches(State(state): State<AppState>) -> Response {
    list_or_empty(state.cache.pitches().await, "pitches")
}

pub async fn get_pitch(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let pitch = state
        .cache
        .pitch_by_id(id)
        .await?
        .ok_or(DomainError::not_found("pitch"))?;
    Ok(Json(pitch).into_response())
}

pub async fn create_pitch(
    State(state): State<AppState>,
    Json(request): Json<CreatePitchRequest>,
) -> ApiResult {
    if request.value.trim().is_empty() {
        return Err(DomainError::validation("pitch value must not be empty").into());
    }
    let pitch = state.cache.create_pitch(request.into()).await?;
    Ok((StatusCode::CREATED, Json(pitch)).into_response())
}

pub async fn update_pitch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePitchRequest>,
) -> ApiResult {
    let pitch = state.cache.update_pitch_value(id, &request.value).await?;
    Ok(Json(pitch).into_response())
}

pub async fn delete_pitch(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    state.cache.delete_pitch(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ============================================================================
// Templates
// ============================================================================

pub async fn list_templates(State(state): State<AppState>) -> Response {
    list_or_empty(state.cache.templates().await, "templates")
}

pub async fn get_template(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let template = state
        .cache
        .template_by_id(id)
        .await?
        .ok_or(DomainError::not_found("template"))?;
    Ok(Json(template).into_response())
}

pub async fn create_template(
    State(state): State<AppState>,
    Json(request): Json<CreateTemplateRequest>,
) -> ApiResult {
    if request.name.trim().is_empty() {
        return Err(DomainError::validation("template name must not be empty").into());
    }
    let template = state.cache.create_template(request.into()).await?;
    Ok((StatusCode::CREATED, Json(template)).into_response())
}

pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTemplateRequest>,
) -> ApiResult {
    let template = state.cache.update_template(id, request.into()).await?;
    Ok(Json(template).into_response())
}

pub async fn delete_template(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    state.cache.delete_template(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn set_default_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult {
    let template = state.cache.set_default_template(id).await?;
    Ok(Json(template).into_response())
}

// ============================================================================
// Sessions
// ============================================================================

pub async fn list_sessions(State(state): State<AppState>) -> Response {
    list_or_empty(state.cache.sessions().await, "sessions")
}

pub async fn get_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let session = state
        .cache
        .session_by_id(id)
        .await?
        .ok_or(DomainError::not_found("session"))?;
    Ok(Json(session).into_response())
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult {
    if request.name.trim().is_empty() {
        return Err(DomainError::validation("session name must not be empty").into());
    }
    let session = state.cache.create_session(request.into()).await?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

pub async fn rename_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RenameSessionRequest>,
) -> ApiResult {
    if request.name.trim().is_empty() {
        return Err(DomainError::validation("session name must not be empty").into());
    }
    let session = state.cache.rename_session(id, &request.name).await?;
    Ok(Json(session).into_response())
}

pub async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    state.cache.delete_session(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_session_items(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    state
        .cache
        .session_by_id(id)
        .await?
        .ok_or(DomainError::not_found("session"))?;
    let items = state.cache.session_items(id).await?;
    Ok(Json(items.as_ref().clone()).into_response())
}

pub async fn replace_session_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReplaceSessionItemsRequest>,
) -> ApiResult {
    let items: Vec<_> = request.items.into_iter().map(Into::into).collect();
    let items = state.cache.replace_session_items(id, &items).await?;
    Ok(Json(items).into_response())
}

// ============================================================================
// Centers
// ============================================================================

pub async fn list_centers(State(state): State<AppState>) -> Response {
    list_or_empty(state.cache.centers().await, "centers")
}

pub async fn get_center(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let center = state
        .cache
        .center_by_id(id)
        .await?
        .ok_or(DomainError::not_found("center"))?;
    Ok(Json(center).into_response())
}

pub async fn create_center(
    State(state): State<AppState>,
    Json(request): Json<CreateCenterRequest>,
) -> ApiResult {
    if request.name.trim().is_empty() {
        return Err(DomainError::validation("center name must not be empty").into());
    }
    let center = state.cache.create_center(request.into()).await?;
    Ok((StatusCode::CREATED, Json(center)).into_response())
}

pub async fn update_center(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCenterRequest>,
) -> ApiResult {
    let center = state.cache.update_center(id, request.into()).await?;
    Ok(Json(center).into_response())
}

pub async fn delete_center(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    state.cache.delete_center(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ============================================================================
// Feedback
// ============================================================================

pub async fn list_feedback(State(state): State<AppState>) -> Response {
    list_or_empty(state.cache.feedback().await, "feedback")
}

pub async fn create_feedback(
    State(state): State<AppState>,
    Json(request): Json<CreateFeedbackRequest>,
) -> ApiResult {
    if request.message.trim().is_empty() {
        return Err(DomainError::validation("feedback message must not be empty").into());
    }
    let feedback = state.cache.create_feedback(request.into()).await?;
    Ok((StatusCode::CREATED, Json(feedback)).into_response())
}

pub async fn delete_feedback(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    state.cache.delete_feedback(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ============================================================================
// Export downloads
// ============================================================================

/// `GET /api/v1/export/{entity}` where `{entity}` is `songs.zip`,
/// `singers.zip`, and so on. The bare family name is accepted too.
pub async fn download_export(State(state): State<AppState>, Path(entity): Path<String>) -> ApiResult {
    let name = entity.strip_suffix(".zip").unwrap_or(&entity);
    let kind =
        EntityKind::from_str(name).map_err(|_| DomainError::validation("unknown export family"))?;

    let bundle = state
        .cache
        .export_bundle(kind)
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.zip\"", kind.as_str()),
        ),
    ];
    Ok((headers, bundle).into_response())
}

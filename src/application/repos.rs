//! Gateway traits describing persistence adapters.
//!
//! The cache layer treats these traits as the sole source of truth: every
//! durable write goes through them before any in-memory state changes.
//! `Duplicate` and `NotFound` are the only driver conditions interpreted
//! above the gateway; everything else propagates as `Persistence`.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{
    CenterRecord, FeedbackRecord, PitchRecord, SessionItemRecord, SessionRecord, SingerRecord,
    SongContent, SongRecord, StoredSession, TemplateRecord,
};
use crate::domain::types::{AspectRatio, Gender};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn duplicate(constraint: impl Into<String>) -> Self {
        Self::Duplicate {
            constraint: constraint.into(),
        }
    }

    /// True for the unique-constraint condition that the create paths
    /// recover from by returning the pre-existing record.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateSongParams {
    pub name: String,
    pub language: Option<String>,
    pub deity: Option<String>,
    pub tempo: Option<String>,
    pub beat: Option<String>,
    pub raga: Option<String>,
    pub level: Option<String>,
    pub reference_url: Option<String>,
    pub reference_pitches: Option<String>,
    pub lyrics: Option<String>,
    pub meaning: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSongParams {
    pub name: Option<String>,
    pub language: Option<String>,
    pub deity: Option<String>,
    pub tempo: Option<String>,
    pub beat: Option<String>,
    pub raga: Option<String>,
    pub level: Option<String>,
    pub reference_url: Option<String>,
    pub reference_pitches: Option<String>,
    pub lyrics: Option<String>,
    pub meaning: Option<String>,
    pub tags: Option<String>,
}

#[async_trait]
pub trait SongsRepo: Send + Sync {
    /// Metadata-only rows; large-object columns are not selected.
    async fn list_songs(&self) -> Result<Vec<SongRecord>, RepoError>;

    /// The three large-object columns for one song, fetched as a unit.
    async fn fetch_song_content(&self, id: Uuid) -> Result<Option<SongContent>, RepoError>;

    /// Bulk content fetch used only by the offline-export path.
    async fn fetch_all_song_content(&self) -> Result<Vec<(Uuid, SongContent)>, RepoError>;

    async fn create_song(&self, params: CreateSongParams) -> Result<SongRecord, RepoError>;

    async fn update_song(&self, id: Uuid, params: UpdateSongParams)
    -> Result<SongRecord, RepoError>;

    async fn delete_song(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateSingerParams {
    pub name: String,
    pub gender: Gender,
    pub email: Option<String>,
    pub center_ids: Vec<Uuid>,
    pub is_admin: bool,
    pub editor_for: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSingerParams {
    pub name: Option<String>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub center_ids: Option<Vec<Uuid>>,
    pub is_admin: Option<bool>,
    pub editor_for: Option<Vec<Uuid>>,
}

#[async_trait]
pub trait SingersRepo: Send + Sync {
    async fn list_singers(&self) -> Result<Vec<SingerRecord>, RepoError>;

    async fn find_singer(&self, id: Uuid) -> Result<Option<SingerRecord>, RepoError>;

    /// Case-insensitive natural-key lookup, used to resolve duplicate
    /// creates to the record that won the race.
    async fn find_singer_by_name(&self, name: &str) -> Result<Option<SingerRecord>, RepoError>;

    async fn create_singer(&self, params: CreateSingerParams) -> Result<SingerRecord, RepoError>;

    async fn update_singer(
        &self,
        id: Uuid,
        params: UpdateSingerParams,
    ) -> Result<SingerRecord, RepoError>;

    async fn delete_singer(&self, id: Uuid) -> Result<(), RepoError>;

    /// Move every pitch owned by `source` to `target`, dropping pitches
    /// whose (song, target) pair already exists. Returns moved count.
    async fn reassign_pitches(&self, source: Uuid, target: Uuid) -> Result<u64, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreatePitchParams {
    pub song_id: Uuid,
    pub singer_id: Uuid,
    pub value: String,
}

#[async_trait]
pub trait PitchesRepo: Send + Sync {
    async fn list_pitches(&self) -> Result<Vec<PitchRecord>, RepoError>;

    async fn find_pitch(&self, id: Uuid) -> Result<Option<PitchRecord>, RepoError>;

    async fn find_pitch_by_pair(
        &self,
        song_id: Uuid,
        singer_id: Uuid,
    ) -> Result<Option<PitchRecord>, RepoError>;

    async fn create_pitch(&self, params: CreatePitchParams) -> Result<PitchRecord, RepoError>;

    async fn update_pitch_value(&self, id: Uuid, value: &str) -> Result<PitchRecord, RepoError>;

    async fn delete_pitch(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateTemplateParams {
    pub name: String,
    pub description: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub slides: JsonValue,
    pub reference_slide: i32,
    pub center_id: Option<Uuid>,
    pub is_default: bool,
    pub yaml: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTemplateParams {
    pub name: Option<String>,
    pub description: Option<String>,
    pub aspect_ratio: Option<AspectRatio>,
    pub slides: Option<JsonValue>,
    pub reference_slide: Option<i32>,
    pub center_id: Option<Uuid>,
    pub yaml: Option<String>,
}

#[async_trait]
pub trait TemplatesRepo: Send + Sync {
    async fn list_templates(&self) -> Result<Vec<TemplateRecord>, RepoError>;

    async fn create_template(
        &self,
        params: CreateTemplateParams,
    ) -> Result<TemplateRecord, RepoError>;

    async fn update_template(
        &self,
        id: Uuid,
        params: UpdateTemplateParams,
    ) -> Result<TemplateRecord, RepoError>;

    async fn delete_template(&self, id: Uuid) -> Result<(), RepoError>;

    /// Transactionally clear `is_default` within the template's scope and
    /// set it on `id`, so exactly one default survives.
    async fn set_default_template(&self, id: Uuid) -> Result<TemplateRecord, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub name: String,
    pub center_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct SessionItemParams {
    pub song_id: Uuid,
    pub singer_id: Option<Uuid>,
    pub pitch_id: Option<Uuid>,
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, RepoError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError>;

    async fn list_session_items(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<SessionItemRecord>, RepoError>;

    async fn create_session(&self, params: CreateSessionParams)
    -> Result<SessionRecord, RepoError>;

    async fn rename_session(&self, id: Uuid, name: &str) -> Result<SessionRecord, RepoError>;

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError>;

    /// Transactionally replace every item; positions are assigned `1..=N`
    /// in the order given.
    async fn replace_session_items(
        &self,
        session_id: Uuid,
        items: &[SessionItemParams],
    ) -> Result<Vec<SessionItemRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateCenterParams {
    pub name: String,
    pub badge_color: String,
    pub editor_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateCenterParams {
    pub name: Option<String>,
    pub badge_color: Option<String>,
    pub editor_ids: Option<Vec<Uuid>>,
}

#[async_trait]
pub trait CentersRepo: Send + Sync {
    async fn list_centers(&self) -> Result<Vec<CenterRecord>, RepoError>;

    async fn create_center(&self, params: CreateCenterParams) -> Result<CenterRecord, RepoError>;

    async fn update_center(
        &self,
        id: Uuid,
        params: UpdateCenterParams,
    ) -> Result<CenterRecord, RepoError>;

    async fn delete_center(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateFeedbackParams {
    pub song_id: Option<Uuid>,
    pub author: Option<String>,
    pub message: String,
}

#[async_trait]
pub trait FeedbackRepo: Send + Sync {
    async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>, RepoError>;

    async fn create_feedback(
        &self,
        params: CreateFeedbackParams,
    ) -> Result<FeedbackRecord, RepoError>;

    async fn delete_feedback(&self, id: Uuid) -> Result<(), RepoError>;
}

/// Persistence behind the HTTP session store adapter.
#[async_trait]
pub trait SessionStoreRepo: Send + Sync {
    /// Idempotent bootstrap of the session table.
    async fn ensure_schema(&self) -> Result<(), RepoError>;

    async fn load_session(&self, sid: &str) -> Result<Option<StoredSession>, RepoError>;

    /// Atomic insert-or-update keyed by session id. Two concurrent
    /// upserts for a new sid must both succeed (last write wins).
    async fn upsert_session(
        &self,
        sid: &str,
        payload: &JsonValue,
        expires_at: OffsetDateTime,
    ) -> Result<(), RepoError>;

    async fn purge_session(&self, sid: &str) -> Result<(), RepoError>;

    async fn count_sessions(&self) -> Result<u64, RepoError>;

    async fn clear_sessions(&self) -> Result<(), RepoError>;
}

/// The full persistence surface consumed by [`crate::cache::StudioCache`].
pub trait StudioGateway:
    SongsRepo
    + SingersRepo
    + PitchesRepo
    + TemplatesRepo
    + SessionsRepo
    + CentersRepo
    + FeedbackRepo
    + SessionStoreRepo
{
}

impl<T> StudioGateway for T where
    T: SongsRepo
        + SingersRepo
        + PitchesRepo
        + TemplatesRepo
        + SessionsRepo
        + CentersRepo
        + FeedbackRepo
        + SessionStoreRepo
{
}

//! The write-through entity cache.
//!
//! `StudioCache` sits between the HTTP routes and the persistence
//! gateway. Reads serve resident collections and fall back to coalesced
//! gateway loads; every mutation persists through the gateway first and
//! only then touches memory, so the cache is always a shadow of storage,
//! never ahead of it. A failed durable write leaves memory untouched.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::repos::{
    CreateCenterParams, CreateFeedbackParams, CreatePitchParams, CreateSessionParams,
    CreateSingerParams, CreateSongParams, CreateTemplateParams, RepoError, SessionItemParams,
    StudioGateway, UpdateCenterParams, UpdateSingerParams, UpdateSongParams, UpdateTemplateParams,
};
use crate::domain::entities::{
    CenterRecord, FeedbackRecord, FullSong, PitchRecord, SessionItemRecord, SessionRecord,
    SingerRecord, SongContent, SongRecord, TemplateRecord,
};
use crate::domain::types::EntityKind;

use super::config::CacheConfig;
use super::export::{ExportCache, ExportError};
use super::store::{EntityStore, pitches_by_song_key, session_items_key};

const HIT: &str = "songstudio_cache_hit_total";
const MISS: &str = "songstudio_cache_miss_total";

/// Canonical export payload for a session: the record plus its ordered
/// items, so an offline client needs no second lookup.
#[derive(Debug, Clone, Serialize)]
pub struct SessionExport {
    #[serde(flatten)]
    pub session: SessionRecord,
    pub items: Vec<SessionItemRecord>,
}

/// One async gate per collection so a cold-miss burst issues a single
/// gateway load instead of one per caller.
#[derive(Default)]
struct LoadGates {
    songs: AsyncMutex<()>,
    singers: AsyncMutex<()>,
    pitches: AsyncMutex<()>,
    templates: AsyncMutex<()>,
    sessions: AsyncMutex<()>,
    centers: AsyncMutex<()>,
    feedback: AsyncMutex<()>,
}

pub struct StudioCache {
    gateway: Arc<dyn StudioGateway>,
    store: EntityStore,
    export: ExportCache,
    gates: LoadGates,
}

impl StudioCache {
    pub fn new(config: &CacheConfig, gateway: Arc<dyn StudioGateway>) -> Self {
        Self {
            gateway,
            store: EntityStore::new(config),
            export: ExportCache::new(config.bundle_ttl()),
            gates: LoadGates::default(),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn StudioGateway> {
        &self.gateway
    }

    // ========================================================================
    // Songs (light/full split)
    // ========================================================================

    /// Every song's metadata-only projection; resident after warmup.
    pub async fn songs_light(&self) -> Result<Arc<Vec<SongRecord>>, RepoError> {
        if let Some(rows) = self.store.songs() {
            counter!(HIT, "entity" => "songs").increment(1);
            return Ok(rows);
        }
        counter!(MISS, "entity" => "songs").increment(1);
        let _gate = self.gates.songs.lock().await;
        if let Some(rows) = self.store.songs() {
            return Ok(rows);
        }
        let rows = self.gateway.list_songs().await?;
        Ok(self.store.set_songs(rows))
    }

    pub async fn song_by_id(&self, id: Uuid) -> Result<Option<SongRecord>, RepoError> {
        let songs = self.songs_light().await?;
        Ok(songs.iter().find(|s| s.id == id).cloned())
    }

    /// Metadata merged with large-object content, hydrating on first use.
    pub async fn song_full(&self, id: Uuid) -> Result<Option<FullSong>, RepoError> {
        let Some(song) = self.song_by_id(id).await? else {
            return Ok(None);
        };
        if let Some(content) = self.store.song_content(id) {
            counter!(HIT, "entity" => "song_content").increment(1);
            return Ok(Some(FullSong { song, content }));
        }
        counter!(MISS, "entity" => "song_content").increment(1);
        let Some(content) = self.gateway.fetch_song_content(id).await? else {
            return Ok(None);
        };
        self.store.set_song_content(id, content.clone());
        Ok(Some(FullSong { song, content }))
    }

    /// Every song fully hydrated. Bulk-export path only: it pays the
    /// latency and memory cost of materializing all content at once.
    pub async fn songs_full(&self) -> Result<Vec<FullSong>, RepoError> {
        let songs = self.songs_light().await?;
        let content = self.gateway.fetch_all_song_content().await?;
        let mut by_id: std::collections::HashMap<Uuid, SongContent> = content.into_iter().collect();
        Ok(songs
            .iter()
            .map(|song| FullSong {
                song: song.clone(),
                content: by_id.remove(&song.id).unwrap_or(SongContent {
                    lyrics: None,
                    meaning: None,
                    tags: None,
                }),
            })
            .collect())
    }

    pub async fn create_song(&self, params: CreateSongParams) -> Result<FullSong, RepoError> {
        let content = SongContent {
            lyrics: params.lyrics.clone(),
            meaning: params.meaning.clone(),
            tags: params.tags.clone(),
        };
        let song = self.gateway.create_song(params).await?;
        self.store.upsert_song(song.clone());
        self.store.set_song_content(song.id, content.clone());
        let full = FullSong { song, content };
        self.refresh_song_export(&full)?;
        Ok(full)
    }

    pub async fn update_song(
        &self,
        id: Uuid,
        params: UpdateSongParams,
    ) -> Result<FullSong, RepoError> {
        let song = self.gateway.update_song(id, params).await?;
        self.store.upsert_song(song.clone());
        // Content may have changed; refetch as a unit rather than patch a
        // single large field.
        self.store.drop_song_content(id);
        let content = self
            .gateway
            .fetch_song_content(id)
            .await?
            .ok_or(RepoError::NotFound)?;
        self.store.set_song_content(id, content.clone());
        let full = FullSong { song, content };
        self.refresh_song_export(&full)?;
        Ok(full)
    }

    pub async fn delete_song(&self, id: Uuid) -> Result<(), RepoError> {
        self.gateway.delete_song(id).await?;
        self.store.remove_song(id);
        self.export.delete(EntityKind::Songs, id);
        // Pitches of a deleted song go with it; drop every derived pitch
        // view and rebuild the pitch export blobs from storage.
        self.store.invalidate_pattern("pitches");
        self.refresh_pitch_exports().await?;
        Ok(())
    }

    // ========================================================================
    // Singers
    // ========================================================================

    pub async fn singers(&self) -> Result<Arc<Vec<SingerRecord>>, RepoError> {
        if let Some(rows) = self.store.singers() {
            counter!(HIT, "entity" => "singers").increment(1);
            return Ok(rows);
        }
        counter!(MISS, "entity" => "singers").increment(1);
        let _gate = self.gates.singers.lock().await;
        if let Some(rows) = self.store.singers() {
            return Ok(rows);
        }
        let rows = self.gateway.list_singers().await?;
        Ok(self.store.set_singers(rows))
    }

    pub async fn singer_by_id(&self, id: Uuid) -> Result<Option<SingerRecord>, RepoError> {
        let singers = self.singers().await?;
        Ok(singers.iter().find(|s| s.id == id).cloned())
    }

    /// Create a singer, idempotently. The resident-collection name scan
    /// is advisory (it races with concurrent creates); the storage
    /// constraint is authoritative, and a duplicate resolves to whichever
    /// record won.
    pub async fn create_singer(
        &self,
        params: CreateSingerParams,
    ) -> Result<SingerRecord, RepoError> {
        if let Some(existing) = self
            .singers()
            .await?
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(&params.name))
        {
            debug!(singer = %existing.id, "create resolved to resident singer");
            return Ok(existing.clone());
        }

        let name = params.name.clone();
        match self.gateway.create_singer(params).await {
            Ok(singer) => {
                self.store.upsert_singer(singer.clone());
                self.export
                    .set(EntityKind::Singers, singer.id, &singer)
                    .map_err(export_to_repo)?;
                Ok(singer)
            }
            Err(err) if err.is_duplicate() => {
                // Someone else created it between the scan and the insert.
                let existing = self
                    .gateway
                    .find_singer_by_name(&name)
                    .await?
                    .ok_or(err)?;
                self.store.upsert_singer(existing.clone());
                Ok(existing)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn update_singer(
        &self,
        id: Uuid,
        params: UpdateSingerParams,
    ) -> Result<SingerRecord, RepoError> {
        let singer = self.gateway.update_singer(id, params).await?;
        self.store.upsert_singer(singer.clone());
        self.export
            .set(EntityKind::Singers, id, &singer)
            .map_err(export_to_repo)?;
        Ok(singer)
    }

    pub async fn delete_singer(&self, id: Uuid) -> Result<(), RepoError> {
        self.gateway.delete_singer(id).await?;
        self.store.remove_singer(id);
        self.export.delete(EntityKind::Singers, id);
        self.store.invalidate_pattern("pitches");
        self.refresh_pitch_exports().await?;
        Ok(())
    }

    /// Merge `source` into `target`: reassign pitches (deduplicated),
    /// delete the source, and drop every view that could still reference
    /// it. Collection-level invalidation keeps this correct without
    /// per-row dependency tracking.
    pub async fn merge_singers(
        &self,
        target: Uuid,
        source: Uuid,
    ) -> Result<SingerRecord, RepoError> {
        let moved = self.gateway.reassign_pitches(source, target).await?;
        self.gateway.delete_singer(source).await?;
        debug!(%target, %source, moved, "merged singers");

        self.store.invalidate("singers");
        self.store.invalidate_pattern("pitches");
        self.export.delete(EntityKind::Singers, source);
        self.refresh_pitch_exports().await?;

        let merged = self
            .gateway
            .find_singer(target)
            .await?
            .ok_or(RepoError::NotFound)?;
        self.export
            .set(EntityKind::Singers, target, &merged)
            .map_err(export_to_repo)?;
        Ok(merged)
    }

    // ========================================================================
    // Pitches
    // ========================================================================

    pub async fn pitches(&self) -> Result<Arc<Vec<PitchRecord>>, RepoError> {
        if let Some(rows) = self.store.pitches() {
            counter!(HIT, "entity" => "pitches").increment(1);
            return Ok(rows);
        }
        counter!(MISS, "entity" => "pitches").increment(1);
        let _gate = self.gates.pitches.lock().await;
        if let Some(rows) = self.store.pitches() {
            return Ok(rows);
        }
        let rows = self.gateway.list_pitches().await?;
        Ok(self.store.set_pitches(rows))
    }

    pub async fn pitch_by_id(&self, id: Uuid) -> Result<Option<PitchRecord>, RepoError> {
        let pitches = self.pitches().await?;
        Ok(pitches.iter().find(|p| p.id == id).cloned())
    }

    pub async fn pitches_for_song(&self, song_id: Uuid) -> Result<Arc<Vec<PitchRecord>>, RepoError> {
        let key = pitches_by_song_key(song_id);
        if let Some(rows) = self.store.pitch_list(&key) {
            counter!(HIT, "entity" => "pitch_lists").increment(1);
            return Ok(rows);
        }
        counter!(MISS, "entity" => "pitch_lists").increment(1);
        let all = self.pitches().await?;
        let rows: Vec<_> = all
            .iter()
            .filter(|p| p.song_id == song_id)
            .cloned()
            .collect();
        Ok(self.store.set_pitch_list(key, rows))
    }

    /// Create or update the pitch for a (song, singer) pair. At most one
    /// record per pair is authoritative; a second create updates in place.
    pub async fn create_pitch(&self, params: CreatePitchParams) -> Result<PitchRecord, RepoError> {
        let existing = self
            .pitches()
            .await?
            .iter()
            .find(|p| p.song_id == params.song_id && p.singer_id == params.singer_id)
            .cloned();
        if let Some(existing) = existing {
            return self.update_pitch_value(existing.id, &params.value).await;
        }

        match self.gateway.create_pitch(params.clone()).await {
            Ok(pitch) => {
                self.store.upsert_pitch(pitch.clone());
                self.export
                    .set(EntityKind::Pitches, pitch.id, &pitch)
                    .map_err(export_to_repo)?;
                Ok(pitch)
            }
            Err(err) if err.is_duplicate() => {
                let existing = self
                    .gateway
                    .find_pitch_by_pair(params.song_id, params.singer_id)
                    .await?
                    .ok_or(err)?;
                self.update_pitch_value(existing.id, &params.value).await
            }
            Err(err) => Err(err),
        }
    }

    pub async fn update_pitch_value(
        &self,
        id: Uuid,
        value: &str,
    ) -> Result<PitchRecord, RepoError> {
        let pitch = self.gateway.update_pitch_value(id, value).await?;
        self.store.upsert_pitch(pitch.clone());
        self.export
            .set(EntityKind::Pitches, id, &pitch)
            .map_err(export_to_repo)?;
        Ok(pitch)
    }

    pub async fn delete_pitch(&self, id: Uuid) -> Result<(), RepoError> {
        self.gateway.delete_pitch(id).await?;
        self.store.remove_pitch(id);
        self.export.delete(EntityKind::Pitches, id);
        Ok(())
    }

    // ========================================================================
    // Templates
    // ========================================================================

    pub async fn templates(&self) -> Result<Arc<Vec<TemplateRecord>>, RepoError> {
        if let Some(rows) = self.store.templates() {
            counter!(HIT, "entity" => "templates").increment(1);
            return Ok(rows);
        }
        counter!(MISS, "entity" => "templates").increment(1);
        let _gate = self.gates.templates.lock().await;
        if let Some(rows) = self.store.templates() {
            return Ok(rows);
        }
        let rows = self.gateway.list_templates().await?;
        Ok(self.store.set_templates(rows))
    }

    pub async fn template_by_id(&self, id: Uuid) -> Result<Option<TemplateRecord>, RepoError> {
        let templates = self.templates().await?;
        Ok(templates.iter().find(|t| t.id == id).cloned())
    }

    pub async fn create_template(
        &self,
        params: CreateTemplateParams,
    ) -> Result<TemplateRecord, RepoError> {
        let wants_default = params.is_default;
        let template = self.gateway.create_template(params).await?;
        let template = if wants_default {
            // Route through the exclusivity path so competing defaults in
            // the same scope are unset atomically.
            return self.set_default_template(template.id).await;
        } else {
            template
        };
        self.store.upsert_template(template.clone());
        self.export
            .set(EntityKind::Templates, template.id, &template)
            .map_err(export_to_repo)?;
        Ok(template)
    }

    pub async fn update_template(
        &self,
        id: Uuid,
        params: UpdateTemplateParams,
    ) -> Result<TemplateRecord, RepoError> {
        let template = self.gateway.update_template(id, params).await?;
        self.store.upsert_template(template.clone());
        self.export
            .set(EntityKind::Templates, id, &template)
            .map_err(export_to_repo)?;
        Ok(template)
    }

    pub async fn delete_template(&self, id: Uuid) -> Result<(), RepoError> {
        self.gateway.delete_template(id).await?;
        self.store.remove_template(id);
        self.export.delete(EntityKind::Templates, id);
        Ok(())
    }

    /// Make `id` the sole default in its scope. The gateway unsets the
    /// others in the same transaction; the whole collection and the whole
    /// export family are refreshed because siblings changed too.
    pub async fn set_default_template(&self, id: Uuid) -> Result<TemplateRecord, RepoError> {
        let template = self.gateway.set_default_template(id).await?;
        let rows = self.gateway.list_templates().await?;
        let exports: Vec<_> = rows.iter().map(|t| (t.id, t.clone())).collect();
        self.store.set_templates(rows);
        self.export
            .replace_all(EntityKind::Templates, &exports)
            .map_err(export_to_repo)?;
        Ok(template)
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    pub async fn sessions(&self) -> Result<Arc<Vec<SessionRecord>>, RepoError> {
        if let Some(rows) = self.store.sessions() {
            counter!(HIT, "entity" => "sessions").increment(1);
            return Ok(rows);
        }
        counter!(MISS, "entity" => "sessions").increment(1);
        let _gate = self.gates.sessions.lock().await;
        if let Some(rows) = self.store.sessions() {
            return Ok(rows);
        }
        let rows = self.gateway.list_sessions().await?;
        Ok(self.store.set_sessions(rows))
    }

    pub async fn session_by_id(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError> {
        let sessions = self.sessions().await?;
        Ok(sessions.iter().find(|s| s.id == id).cloned())
    }

    pub async fn session_items(
        &self,
        session_id: Uuid,
    ) -> Result<Arc<Vec<SessionItemRecord>>, RepoError> {
        let key = session_items_key(session_id);
        if let Some(rows) = self.store.item_list(&key) {
            counter!(HIT, "entity" => "session_items").increment(1);
            return Ok(rows);
        }
        counter!(MISS, "entity" => "session_items").increment(1);
        let rows = self.gateway.list_session_items(session_id).await?;
        Ok(self.store.set_item_list(key, rows))
    }

    pub async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let session = self.gateway.create_session(params).await?;
        self.store.upsert_session(session.clone());
        self.refresh_session_export(&session, Vec::new())?;
        Ok(session)
    }

    pub async fn rename_session(&self, id: Uuid, name: &str) -> Result<SessionRecord, RepoError> {
        let session = self.gateway.rename_session(id, name).await?;
        self.store.upsert_session(session.clone());
        let items = self.session_items(id).await?.as_ref().clone();
        self.refresh_session_export(&session, items)?;
        Ok(session)
    }

    pub async fn delete_session(&self, id: Uuid) -> Result<(), RepoError> {
        self.gateway.delete_session(id).await?;
        self.store.remove_session(id);
        self.export.delete(EntityKind::Sessions, id);
        Ok(())
    }

    /// Replace a session's playlist wholesale. The gateway renumbers
    /// positions `1..=N` transactionally; the returned rows are the new
    /// authoritative order.
    pub async fn replace_session_items(
        &self,
        session_id: Uuid,
        items: &[SessionItemParams],
    ) -> Result<Vec<SessionItemRecord>, RepoError> {
        let rows = self
            .gateway
            .replace_session_items(session_id, items)
            .await?;
        self.store
            .set_item_list(session_items_key(session_id), rows.clone());
        let session = self
            .gateway
            .find_session(session_id)
            .await?
            .ok_or(RepoError::NotFound)?;
        self.store.upsert_session(session.clone());
        self.refresh_session_export(&session, rows.clone())?;
        Ok(rows)
    }

    // ========================================================================
    // Centers
    // ========================================================================

    pub async fn centers(&self) -> Result<Arc<Vec<CenterRecord>>, RepoError> {
        if let Some(rows) = self.store.centers() {
            counter!(HIT, "entity" => "centers").increment(1);
            return Ok(rows);
        }
        counter!(MISS, "entity" => "centers").increment(1);
        let _gate = self.gates.centers.lock().await;
        if let Some(rows) = self.store.centers() {
            return Ok(rows);
        }
        let rows = self.gateway.list_centers().await?;
        Ok(self.store.set_centers(rows))
    }

    pub async fn center_by_id(&self, id: Uuid) -> Result<Option<CenterRecord>, RepoError> {
        let centers = self.centers().await?;
        Ok(centers.iter().find(|c| c.id == id).cloned())
    }

    pub async fn create_center(&self, params: CreateCenterParams) -> Result<CenterRecord, RepoError> {
        let center = self.gateway.create_center(params).await?;
        self.store.upsert_center(center.clone());
        self.export
            .set(EntityKind::Centers, center.id, &center)
            .map_err(export_to_repo)?;
        Ok(center)
    }

    pub async fn update_center(
        &self,
        id: Uuid,
        params: UpdateCenterParams,
    ) -> Result<CenterRecord, RepoError> {
        let center = self.gateway.update_center(id, params).await?;
        self.store.upsert_center(center.clone());
        self.export
            .set(EntityKind::Centers, id, &center)
            .map_err(export_to_repo)?;
        Ok(center)
    }

    pub async fn delete_center(&self, id: Uuid) -> Result<(), RepoError> {
        self.gateway.delete_center(id).await?;
        self.store.remove_center(id);
        self.export.delete(EntityKind::Centers, id);
        Ok(())
    }

    // ========================================================================
    // Feedback
    // ========================================================================

    pub async fn feedback(&self) -> Result<Arc<Vec<FeedbackRecord>>, RepoError> {
        if let Some(rows) = self.store.feedback() {
            counter!(HIT, "entity" => "feedback").increment(1);
            return Ok(rows);
        }
        counter!(MISS, "entity" => "feedback").increment(1);
        let _gate = self.gates.feedback.lock().await;
        if let Some(rows) = self.store.feedback() {
            return Ok(rows);
        }
        let rows = self.gateway.list_feedback().await?;
        Ok(self.store.set_feedback(rows))
    }

    pub async fn create_feedback(
        &self,
        params: CreateFeedbackParams,
    ) -> Result<FeedbackRecord, RepoError> {
        let feedback = self.gateway.create_feedback(params).await?;
        self.store.push_feedback(feedback.clone());
        self.export
            .set(EntityKind::Feedback, feedback.id, &feedback)
            .map_err(export_to_repo)?;
        Ok(feedback)
    }

    pub async fn delete_feedback(&self, id: Uuid) -> Result<(), RepoError> {
        self.gateway.delete_feedback(id).await?;
        self.store.remove_feedback(id);
        self.export.delete(EntityKind::Feedback, id);
        Ok(())
    }

    // ========================================================================
    // Invalidation, warmup, export surface
    // ========================================================================

    /// Drop exactly the cache region named by `key`.
    pub fn invalidate(&self, key: &str) {
        counter!("songstudio_cache_invalidate_total", "entity" => key.to_string()).increment(1);
        self.store.invalidate(key);
    }

    /// Drop every cache region whose key starts with `prefix`. Used by
    /// compound writes whose blast radius spans entities.
    pub fn invalidate_pattern(&self, prefix: &str) {
        counter!("songstudio_cache_invalidate_total", "entity" => prefix.to_string()).increment(1);
        self.store.invalidate_pattern(prefix);
    }

    /// Eagerly load every collection except song large-object content,
    /// and seed the export blobs. A failure loading one collection logs
    /// and leaves that collection to lazy-load; warmup never aborts.
    pub async fn warmup(&self) {
        let started = std::time::Instant::now();

        match self.gateway.list_songs().await {
            Ok(rows) => {
                self.store.set_songs(rows);
                if let Err(err) = self.refresh_song_exports().await {
                    warn!(error = %err, "song export seed failed during warmup");
                }
            }
            Err(err) => warn!(error = %err, entity = "songs", "warmup load failed"),
        }
        match self.gateway.list_singers().await {
            Ok(rows) => {
                let exports: Vec<_> = rows.iter().map(|s| (s.id, s.clone())).collect();
                self.store.set_singers(rows);
                if let Err(err) = self.export.replace_all(EntityKind::Singers, &exports) {
                    warn!(error = %err, "singer export seed failed during warmup");
                }
            }
            Err(err) => warn!(error = %err, entity = "singers", "warmup load failed"),
        }
        match self.gateway.list_pitches().await {
            Ok(rows) => {
                let exports: Vec<_> = rows.iter().map(|p| (p.id, p.clone())).collect();
                self.store.set_pitches(rows);
                if let Err(err) = self.export.replace_all(EntityKind::Pitches, &exports) {
                    warn!(error = %err, "pitch export seed failed during warmup");
                }
            }
            Err(err) => warn!(error = %err, entity = "pitches", "warmup load failed"),
        }
        match self.gateway.list_templates().await {
            Ok(rows) => {
                let exports: Vec<_> = rows.iter().map(|t| (t.id, t.clone())).collect();
                self.store.set_templates(rows);
                if let Err(err) = self.export.replace_all(EntityKind::Templates, &exports) {
                    warn!(error = %err, "template export seed failed during warmup");
                }
            }
            Err(err) => warn!(error = %err, entity = "templates", "warmup load failed"),
        }
        match self.gateway.list_sessions().await {
            Ok(rows) => {
                self.store.set_sessions(rows.clone());
                if let Err(err) = self.refresh_session_exports(&rows).await {
                    warn!(error = %err, "session export seed failed during warmup");
                }
            }
            Err(err) => warn!(error = %err, entity = "sessions", "warmup load failed"),
        }
        match self.gateway.list_centers().await {
            Ok(rows) => {
                let exports: Vec<_> = rows.iter().map(|c| (c.id, c.clone())).collect();
                self.store.set_centers(rows);
                if let Err(err) = self.export.replace_all(EntityKind::Centers, &exports) {
                    warn!(error = %err, "center export seed failed during warmup");
                }
            }
            Err(err) => warn!(error = %err, entity = "centers", "warmup load failed"),
        }
        match self.gateway.list_feedback().await {
            Ok(rows) => {
                let exports: Vec<_> = rows.iter().map(|f| (f.id, f.clone())).collect();
                self.store.set_feedback(rows);
                if let Err(err) = self.export.replace_all(EntityKind::Feedback, &exports) {
                    warn!(error = %err, "feedback export seed failed during warmup");
                }
            }
            Err(err) => warn!(error = %err, entity = "feedback", "warmup load failed"),
        }

        let elapsed = started.elapsed();
        metrics::histogram!("songstudio_cache_warm_ms")
            .record(elapsed.as_secs_f64() * 1000.0);
        debug!(elapsed_ms = elapsed.as_millis() as u64, "cache warmup finished");
    }

    /// Administrative full reload: drop everything, then warm again.
    /// The escape hatch for cross-instance drift, since instances do not
    /// invalidate each other.
    pub async fn reload(&self) {
        self.store.clear();
        self.export.clear();
        self.warmup().await;
    }

    /// The compressed offline bundle for one entity family.
    pub fn export_bundle(&self, kind: EntityKind) -> Result<bytes::Bytes, ExportError> {
        self.export.bundle(kind)
    }

    #[cfg(test)]
    pub(crate) fn export_cache(&self) -> &ExportCache {
        &self.export
    }

    fn refresh_song_export(&self, full: &FullSong) -> Result<(), RepoError> {
        self.export
            .set(EntityKind::Songs, full.song.id, full)
            .map_err(export_to_repo)
    }

    async fn refresh_song_exports(&self) -> Result<(), RepoError> {
        let full = self.songs_full().await?;
        let exports: Vec<_> = full.into_iter().map(|f| (f.song.id, f)).collect();
        self.export
            .replace_all(EntityKind::Songs, &exports)
            .map_err(export_to_repo)
    }

    async fn refresh_pitch_exports(&self) -> Result<(), RepoError> {
        let rows = self.gateway.list_pitches().await?;
        let exports: Vec<_> = rows.into_iter().map(|p| (p.id, p)).collect();
        self.export
            .replace_all(EntityKind::Pitches, &exports)
            .map_err(export_to_repo)
    }

    fn refresh_session_export(
        &self,
        session: &SessionRecord,
        items: Vec<SessionItemRecord>,
    ) -> Result<(), RepoError> {
        let payload = SessionExport {
            session: session.clone(),
            items,
        };
        self.export
            .set(EntityKind::Sessions, session.id, &payload)
            .map_err(export_to_repo)
    }

    async fn refresh_session_exports(&self, rows: &[SessionRecord]) -> Result<(), RepoError> {
        let mut exports = Vec::with_capacity(rows.len());
        for session in rows {
            let items = self.gateway.list_session_items(session.id).await?;
            exports.push((
                session.id,
                SessionExport {
                    session: session.clone(),
                    items,
                },
            ));
        }
        self.export
            .replace_all(EntityKind::Sessions, &exports)
            .map_err(export_to_repo)
    }
}

fn export_to_repo(err: ExportError) -> RepoError {
    RepoError::from_persistence(err)
}

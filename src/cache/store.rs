//! Resident cache storage.
//!
//! One slot per entity collection, keyed side caches for derived lists,
//! and an LRU-bounded cache of hydrated song content. Slots hold
//! `Arc<Vec<_>>` so readers share the collection without copying; writers
//! replace the whole Arc, which keeps mapping mutation atomic with
//! respect to interleaved readers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lru::LruCache;
use uuid::Uuid;

use crate::domain::entities::{
    CenterRecord, FeedbackRecord, PitchRecord, SessionItemRecord, SessionRecord, SingerRecord,
    SongContent, SongRecord, TemplateRecord,
};
use crate::domain::types::EntityKind;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Key prefix for the per-song pitch list side cache.
pub const PITCHES_BY_SONG_PREFIX: &str = "pitches:song:";
/// Key prefix for the per-session item list side cache.
pub const SESSION_ITEMS_PREFIX: &str = "session_items:";

pub fn pitches_by_song_key(song_id: Uuid) -> String {
    format!("{PITCHES_BY_SONG_PREFIX}{song_id}")
}

pub fn session_items_key(session_id: Uuid) -> String {
    format!("{SESSION_ITEMS_PREFIX}{session_id}")
}

type Slot<T> = RwLock<Option<Arc<Vec<T>>>>;

/// Resident storage for all entity collections.
pub struct EntityStore {
    songs: Slot<SongRecord>,
    singers: Slot<SingerRecord>,
    pitches: Slot<PitchRecord>,
    templates: Slot<TemplateRecord>,
    sessions: Slot<SessionRecord>,
    centers: Slot<CenterRecord>,
    feedback: Slot<FeedbackRecord>,

    // Derived lists keyed by "pitches:song:<id>".
    pitch_lists: RwLock<HashMap<String, Arc<Vec<PitchRecord>>>>,
    // Derived lists keyed by "session_items:<id>".
    item_lists: RwLock<HashMap<String, Arc<Vec<SessionItemRecord>>>>,

    // Hydrated large-object content, bounded by LRU eviction.
    song_content: RwLock<LruCache<Uuid, SongContent>>,
}

impl EntityStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            songs: RwLock::new(None),
            singers: RwLock::new(None),
            pitches: RwLock::new(None),
            templates: RwLock::new(None),
            sessions: RwLock::new(None),
            centers: RwLock::new(None),
            feedback: RwLock::new(None),
            pitch_lists: RwLock::new(HashMap::new()),
            item_lists: RwLock::new(HashMap::new()),
            song_content: RwLock::new(LruCache::new(config.song_content_limit_non_zero())),
        }
    }

    fn slot<T>(slot: &Slot<T>, op: &'static str) -> Option<Arc<Vec<T>>> {
        rw_read(slot, SOURCE, op).clone()
    }

    fn fill<T>(slot: &Slot<T>, op: &'static str, rows: Vec<T>) -> Arc<Vec<T>> {
        let shared = Arc::new(rows);
        *rw_write(slot, SOURCE, op) = Some(shared.clone());
        shared
    }

    fn drop_slot<T>(slot: &Slot<T>, op: &'static str) {
        *rw_write(slot, SOURCE, op) = None;
    }

    /// Apply `mutate` to the resident collection, if any. Absent slots
    /// stay absent; the next read re-hydrates from the gateway.
    fn mutate<T: Clone>(slot: &Slot<T>, op: &'static str, mutate: impl FnOnce(&mut Vec<T>)) {
        let mut guard = rw_write(slot, SOURCE, op);
        if let Some(current) = guard.as_ref() {
            let mut rows = current.as_ref().clone();
            mutate(&mut rows);
            *guard = Some(Arc::new(rows));
        }
    }

    // ========================================================================
    // Collection slots
    // ========================================================================

    pub fn songs(&self) -> Option<Arc<Vec<SongRecord>>> {
        Self::slot(&self.songs, "songs.get")
    }

    pub fn set_songs(&self, rows: Vec<SongRecord>) -> Arc<Vec<SongRecord>> {
        Self::fill(&self.songs, "songs.set", rows)
    }

    pub fn upsert_song(&self, record: SongRecord) {
        Self::mutate(&self.songs, "songs.upsert", |rows| {
            match rows.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => rows.push(record),
            }
        });
    }

    pub fn remove_song(&self, id: Uuid) {
        Self::mutate(&self.songs, "songs.remove", |rows| {
            rows.retain(|r| r.id != id)
        });
        self.drop_song_content(id);
    }

    pub fn singers(&self) -> Option<Arc<Vec<SingerRecord>>> {
        Self::slot(&self.singers, "singers.get")
    }

    pub fn set_singers(&self, rows: Vec<SingerRecord>) -> Arc<Vec<SingerRecord>> {
        Self::fill(&self.singers, "singers.set", rows)
    }

    pub fn upsert_singer(&self, record: SingerRecord) {
        Self::mutate(&self.singers, "singers.upsert", |rows| {
            match rows.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => rows.push(record),
            }
        });
    }

    pub fn remove_singer(&self, id: Uuid) {
        Self::mutate(&self.singers, "singers.remove", |rows| {
            rows.retain(|r| r.id != id)
        });
    }

    pub fn pitches(&self) -> Option<Arc<Vec<PitchRecord>>> {
        Self::slot(&self.pitches, "pitches.get")
    }

    pub fn set_pitches(&self, rows: Vec<PitchRecord>) -> Arc<Vec<PitchRecord>> {
        Self::fill(&self.pitches, "pitches.set", rows)
    }

    pub fn upsert_pitch(&self, record: PitchRecord) {
        let song_id = record.song_id;
        Self::mutate(&self.pitches, "pitches.upsert", |rows| {
            match rows.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => rows.push(record),
            }
        });
        self.invalidate(&pitches_by_song_key(song_id));
    }

    pub fn remove_pitch(&self, id: Uuid) {
        let mut song_id = None;
        Self::mutate(&self.pitches, "pitches.remove", |rows| {
            song_id = rows.iter().find(|r| r.id == id).map(|r| r.song_id);
            rows.retain(|r| r.id != id);
        });
        match song_id {
            Some(song_id) => self.invalidate(&pitches_by_song_key(song_id)),
            // Collection not resident, so ownership is unknown; drop every
            // derived pitch list rather than risk a stale one.
            None => self.invalidate_pattern(PITCHES_BY_SONG_PREFIX),
        }
    }

    pub fn templates(&self) -> Option<Arc<Vec<TemplateRecord>>> {
        Self::slot(&self.templates, "templates.get")
    }

    pub fn set_templates(&self, rows: Vec<TemplateRecord>) -> Arc<Vec<TemplateRecord>> {
        Self::fill(&self.templates, "templates.set", rows)
    }

    pub fn upsert_template(&self, record: TemplateRecord) {
        Self::mutate(&self.templates, "templates.upsert", |rows| {
            match rows.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => rows.push(record),
            }
        });
    }

    pub fn remove_template(&self, id: Uuid) {
        Self::mutate(&self.templates, "templates.remove", |rows| {
            rows.retain(|r| r.id != id)
        });
    }

    pub fn sessions(&self) -> Option<Arc<Vec<SessionRecord>>> {
        Self::slot(&self.sessions, "sessions.get")
    }

    pub fn set_sessions(&self, rows: Vec<SessionRecord>) -> Arc<Vec<SessionRecord>> {
        Self::fill(&self.sessions, "sessions.set", rows)
    }

    pub fn upsert_session(&self, record: SessionRecord) {
        Self::mutate(&self.sessions, "sessions.upsert", |rows| {
            match rows.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => rows.push(record),
            }
        });
    }

    pub fn remove_session(&self, id: Uuid) {
        Self::mutate(&self.sessions, "sessions.remove", |rows| {
            rows.retain(|r| r.id != id)
        });
        self.invalidate(&session_items_key(id));
    }

    pub fn centers(&self) -> Option<Arc<Vec<CenterRecord>>> {
        Self::slot(&self.centers, "centers.get")
    }

    pub fn set_centers(&self, rows: Vec<CenterRecord>) -> Arc<Vec<CenterRecord>> {
        Self::fill(&self.centers, "centers.set", rows)
    }

    pub fn upsert_center(&self, record: CenterRecord) {
        Self::mutate(&self.centers, "centers.upsert", |rows| {
            match rows.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => rows.push(record),
            }
        });
    }

    pub fn remove_center(&self, id: Uuid) {
        Self::mutate(&self.centers, "centers.remove", |rows| {
            rows.retain(|r| r.id != id)
        });
    }

    pub fn feedback(&self) -> Option<Arc<Vec<FeedbackRecord>>> {
        Self::slot(&self.feedback, "feedback.get")
    }

    pub fn set_feedback(&self, rows: Vec<FeedbackRecord>) -> Arc<Vec<FeedbackRecord>> {
        Self::fill(&self.feedback, "feedback.set", rows)
    }

    pub fn push_feedback(&self, record: FeedbackRecord) {
        Self::mutate(&self.feedback, "feedback.push", |rows| rows.push(record));
    }

    pub fn remove_feedback(&self, id: Uuid) {
        Self::mutate(&self.feedback, "feedback.remove", |rows| {
            rows.retain(|r| r.id != id)
        });
    }

    // ========================================================================
    // Keyed side caches
    // ========================================================================

    pub fn pitch_list(&self, key: &str) -> Option<Arc<Vec<PitchRecord>>> {
        rw_read(&self.pitch_lists, SOURCE, "pitch_list.get")
            .get(key)
            .cloned()
    }

    pub fn set_pitch_list(&self, key: String, rows: Vec<PitchRecord>) -> Arc<Vec<PitchRecord>> {
        let shared = Arc::new(rows);
        rw_write(&self.pitch_lists, SOURCE, "pitch_list.set").insert(key, shared.clone());
        shared
    }

    pub fn item_list(&self, key: &str) -> Option<Arc<Vec<SessionItemRecord>>> {
        rw_read(&self.item_lists, SOURCE, "item_list.get")
            .get(key)
            .cloned()
    }

    pub fn set_item_list(
        &self,
        key: String,
        rows: Vec<SessionItemRecord>,
    ) -> Arc<Vec<SessionItemRecord>> {
        let shared = Arc::new(rows);
        rw_write(&self.item_lists, SOURCE, "item_list.set").insert(key, shared.clone());
        shared
    }

    // ========================================================================
    // Hydrated song content
    // ========================================================================

    pub fn song_content(&self, id: Uuid) -> Option<SongContent> {
        rw_write(&self.song_content, SOURCE, "song_content.get")
            .get(&id)
            .cloned()
    }

    pub fn set_song_content(&self, id: Uuid, content: SongContent) {
        rw_write(&self.song_content, SOURCE, "song_content.set").put(id, content);
    }

    pub fn drop_song_content(&self, id: Uuid) {
        rw_write(&self.song_content, SOURCE, "song_content.drop").pop(&id);
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Drop exactly the cache region named by `key`.
    pub fn invalidate(&self, key: &str) {
        match key {
            "songs" => {
                Self::drop_slot(&self.songs, "songs.invalidate");
                rw_write(&self.song_content, SOURCE, "song_content.invalidate").clear();
            }
            "singers" => Self::drop_slot(&self.singers, "singers.invalidate"),
            "pitches" => {
                Self::drop_slot(&self.pitches, "pitches.invalidate");
                rw_write(&self.pitch_lists, SOURCE, "pitch_lists.invalidate").clear();
            }
            "templates" => Self::drop_slot(&self.templates, "templates.invalidate"),
            "sessions" => {
                Self::drop_slot(&self.sessions, "sessions.invalidate");
                rw_write(&self.item_lists, SOURCE, "item_lists.invalidate").clear();
            }
            "centers" => Self::drop_slot(&self.centers, "centers.invalidate"),
            "feedback" => Self::drop_slot(&self.feedback, "feedback.invalidate"),
            keyed if keyed.starts_with(PITCHES_BY_SONG_PREFIX) => {
                rw_write(&self.pitch_lists, SOURCE, "pitch_list.invalidate").remove(keyed);
            }
            keyed if keyed.starts_with(SESSION_ITEMS_PREFIX) => {
                rw_write(&self.item_lists, SOURCE, "item_list.invalidate").remove(keyed);
            }
            _ => {}
        }
    }

    /// Drop every cache region whose key starts with `prefix`.
    ///
    /// Collection-level granularity on purpose: compound writes (singer
    /// merge, bulk reloads) invalidate by prefix instead of tracking
    /// per-row dependencies.
    pub fn invalidate_pattern(&self, prefix: &str) {
        for kind in EntityKind::ALL {
            if kind.as_str().starts_with(prefix) {
                self.invalidate(kind.as_str());
            }
        }
        rw_write(&self.pitch_lists, SOURCE, "pitch_lists.invalidate_pattern")
            .retain(|key, _| !key.starts_with(prefix));
        rw_write(&self.item_lists, SOURCE, "item_lists.invalidate_pattern")
            .retain(|key, _| !key.starts_with(prefix));
    }

    /// Clear all resident state.
    pub fn clear(&self) {
        for kind in EntityKind::ALL {
            self.invalidate(kind.as_str());
        }
    }
}

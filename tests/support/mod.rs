//! In-memory gateway double shared by the integration suites.
//!
//! Mirrors the storage semantics the cache depends on: unique-constraint
//! rejection with constraint names, transactional position renumbering,
//! and scoped default exclusivity. A `fail_writes` switch makes every
//! mutation fail before touching state, for durability ordering tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use uuid::Uuid;

use songstudio::application::repos::{
    CentersRepo, CreateCenterParams, CreateFeedbackParams, CreatePitchParams, CreateSessionParams,
    CreateSingerParams, CreateSongParams, CreateTemplateParams, FeedbackRepo, PitchesRepo,
    RepoError, SessionItemParams, SessionStoreRepo, SessionsRepo, SingersRepo, SongsRepo,
    TemplatesRepo, UpdateCenterParams, UpdateSingerParams, UpdateSongParams, UpdateTemplateParams,
};
use songstudio::domain::entities::{
    CenterRecord, FeedbackRecord, PitchRecord, SessionItemRecord, SessionRecord, SingerRecord,
    SongContent, SongRecord, StoredSession, TemplateRecord,
};

#[derive(Clone)]
struct SongRow {
    record: SongRecord,
    content: SongContent,
}

#[derive(Default)]
pub struct InMemoryGateway {
    songs: Mutex<Vec<SongRow>>,
    singers: Mutex<Vec<SingerRecord>>,
    pitches: Mutex<Vec<PitchRecord>>,
    templates: Mutex<Vec<TemplateRecord>>,
    sessions: Mutex<Vec<SessionRecord>>,
    session_items: Mutex<HashMap<Uuid, Vec<SessionItemRecord>>>,
    centers: Mutex<Vec<CenterRecord>>,
    feedback: Mutex<Vec<FeedbackRecord>>,
    http_sessions: Mutex<HashMap<String, StoredSession>>,
    pub write_calls: AtomicUsize,
    pub content_fetches: AtomicUsize,
    pub fail_writes: AtomicBool,
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn content_fetch_count(&self) -> usize {
        self.content_fetches.load(Ordering::SeqCst)
    }

    fn write_gate(&self) -> Result<(), RepoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::Persistence("injected write failure".into()));
        }
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn stored_song_count(&self) -> usize {
        self.songs.lock().unwrap().len()
    }

    pub fn stored_pitch_count(&self) -> usize {
        self.pitches.lock().unwrap().len()
    }

    pub fn stored_singer_count(&self) -> usize {
        self.singers.lock().unwrap().len()
    }

    fn with_pitch_count(&self, mut singer: SingerRecord) -> SingerRecord {
        singer.pitch_count = self
            .pitches
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.singer_id == singer.id)
            .count() as i64;
        singer
    }
}

#[async_trait]
impl SongsRepo for InMemoryGateway {
    async fn list_songs(&self) -> Result<Vec<SongRecord>, RepoError> {
        Ok(self
            .songs
            .lock()
            .unwrap()
            .iter()
            .map(|row| row.record.clone())
            .collect())
    }


    async fn fetch_song_content(&self, id: Uuid) -> Result<Option<SongContent>, RepoError> {
        self.content_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .songs
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.record.id == id)
            .map(|row| row.content.clone()))
    }

    async fn fetch_all_song_content(&self) -> Result<Vec<(Uuid, SongContent)>, RepoError> {
        Ok(self
            .songs
            .lock()
            .unwrap()
            .iter()
            .map(|row| (row.record.id, row.content.clone()))
            .collect())
    }

    async fn create_song(&self, params: CreateSongParams) -> Result<SongRecord, RepoError> {
        self.write_gate()?;
        let record = SongRecord {
            id: Uuid::new_v4(),
            name: params.name,
            language: params.language,
            deity: params.deity,
            tempo: params.tempo,
            beat: params.beat,
            raga: params.raga,
            level: params.level,
            reference_url: params.reference_url,
            reference_pitches: params.reference_pitches,
            created_at: now(),
            updated_at: now(),
        };
        let content = SongContent {
            lyrics: params.lyrics,
            meaning: params.meaning,
            tags: params.tags,
        };
        self.songs.lock().unwrap().push(SongRow {
            record: record.clone(),
            content,
        });
        Ok(record)
    }

    async fn update_song(
        &self,
        id: Uuid,
        params: UpdateSongParams,
    ) -> Result<SongRecord, RepoError> {
        self.write_gate()?;
        let mut songs = self.songs.lock().unwrap();
        let row = songs
            .iter_mut()
            .find(|row| row.record.id == id)
            .ok_or(RepoError::NotFound)?;

        let record = &mut row.record;
        if let Some(name) = params.name {
            record.name = name;
        }
        if let Some(language) = params.language {
            record.language = Some(language);
        }
        if let Some(deity) = params.deity {
            record.deity = Some(deity);
        }
        if let Some(tempo) = params.tempo {
            record.tempo = Some(tempo);
        }
        if let Some(beat) = params.beat {
            record.beat = Some(beat);
        }
        if let Some(raga) = params.raga {
            record.raga = Some(raga);
        }
        if let Some(level) = params.level {
            record.level = Some(level);
        }
        if let Some(url) = params.reference_url {
            record.reference_url = Some(url);
        }
        if let Some(rp) = params.reference_pitches {
            record.reference_pitches = Some(rp);
        }
        if let Some(lyrics) = params.lyrics {
            row.content.lyrics = Some(lyrics);
        }
        if let Some(meaning) = params.meaning {
            row.content.meaning = Some(meaning);
        }
        if let Some(tags) = params.tags {
            row.content.tags = Some(tags);
        }
        row.record.updated_at = now();
        Ok(row.record.clone())
    }

    async fn delete_song(&self, id: Uuid) -> Result<(), RepoError> {
        self.write_gate()?;
        let mut songs = self.songs.lock().unwrap();
        let before = songs.len();
        songs.retain(|row| row.record.id != id);
        if songs.len() == before {
            return Err(RepoError::NotFound);
        }
        // Cascade, like the real schema.
        self.pitches.lock().unwrap().retain(|p| p.song_id != id);
        Ok(())
    }
}

#[async_trait]
impl SingersRepo for InMemoryGateway {
    async fn list_singers(&self) -> Result<Vec<SingerRecord>, RepoError> {
        let singers = self.singers.lock().unwrap().clone();
        Ok(singers
            .into_iter()
            .map(|s| self.with_pitch_count(s))
            .collect())
    }

    async fn find_singer(&self, id: Uuid) -> Result<Option<SingerRecord>, RepoError> {
        let singer = self
            .singers
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned();
        Ok(singer.map(|s| self.with_pitch_count(s)))
    }

    async fn find_singer_by_name(&self, name: &str) -> Result<Option<SingerRecord>, RepoError> {
        let singer = self
            .singers
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .cloned();
        Ok(singer.map(|s| self.with_pitch_count(s)))
    }

    async fn create_singer(&self, params: CreateSingerParams) -> Result<SingerRecord, RepoError> {
        self.write_gate()?;
        let mut singers = self.singers.lock().unwrap();
        if singers
            .iter()
            .any(|s| s.name.eq_ignore_ascii_case(&params.name))
        {
            return Err(RepoError::duplicate("singers_name_lower_idx"));
        }
        let singer = SingerRecord {
            id: Uuid::new_v4(),
            name: params.name,
            gender: params.gender,
            email: params.email,
            center_ids: params.center_ids,
            is_admin: params.is_admin,
            editor_for: params.editor_for,
            pitch_count: 0,
            created_at: now(),
            updated_at: now(),
        };
        singers.push(singer.clone());
        Ok(singer)
    }

    async fn update_singer(
        &self,
        id: Uuid,
        params: UpdateSingerParams,
    ) -> Result<SingerRecord, RepoError> {
        self.write_gate()?;
        let mut singers = self.singers.lock().unwrap();
        let singer = singers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(name) = params.name {
            singer.name = name;
        }
        if let Some(gender) = params.gender {
            singer.gender = gender;
        }
        if let Some(email) = params.email {
            singer.email = Some(email);
        }
        if let Some(center_ids) = params.center_ids {
            singer.center_ids = center_ids;
        }
        if let Some(is_admin) = params.is_admin {
            singer.is_admin = is_admin;
        }
        if let Some(editor_for) = params.editor_for {
            singer.editor_for = editor_for;
        }
        singer.updated_at = now();
        let updated = singer.clone();
        drop(singers);
        Ok(self.with_pitch_count(updated))
    }

    async fn delete_singer(&self, id: Uuid) -> Result<(), RepoError> {
        self.write_gate()?;
        let mut singers = self.singers.lock().unwrap();
        let before = singers.len();
        singers.retain(|s| s.id != id);
        if singers.len() == before {
            return Err(RepoError::NotFound);
        }
        self.pitches.lock().unwrap().retain(|p| p.singer_id != id);
        Ok(())
    }

    async fn reassign_pitches(&self, source: Uuid, target: Uuid) -> Result<u64, RepoError> {
        self.write_gate()?;
        let target_name = self
            .singers
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == target)
            .map(|s| s.name.clone())
            .ok_or(RepoError::NotFound)?;

        let mut pitches = self.pitches.lock().unwrap();
        let taken: Vec<Uuid> = pitches
            .iter()
            .filter(|p| p.singer_id == target)
            .map(|p| p.song_id)
            .collect();
        // Conflicting source pitches are dropped; the target's value wins.
        pitches.retain(|p| !(p.singer_id == source && taken.contains(&p.song_id)));

        let mut moved = 0;
        for pitch in pitches.iter_mut().filter(|p| p.singer_id == source) {
            pitch.singer_id = target;
            pitch.singer_name = target_name.clone();
            pitch.updated_at = now();
            moved += 1;
        }
        Ok(moved)
    }
}

#[async_trait]
impl PitchesRepo for InMemoryGateway {
    async fn list_pitches(&self) -> Result<Vec<PitchRecord>, RepoError> {
        Ok(self.pitches.lock().unwrap().clone())
    }

    async fn find_pitch(&self, id: Uuid) -> Result<Option<PitchRecord>, RepoError> {
        Ok(self
            .pitches
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn find_pitch_by_pair(
        &self,
        song_id: Uuid,
        singer_id: Uuid,
    ) -> Result<Option<PitchRecord>, RepoError> {
        Ok(self
            .pitches
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.song_id == song_id && p.singer_id == singer_id)
            .cloned())
    }

    async fn create_pitch(&self, params: CreatePitchParams) -> Result<PitchRecord, RepoError> {
        self.write_gate()?;
        let song_name = self
            .songs
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.record.id == params.song_id)
            .map(|row| row.record.name.clone())
            .ok_or_else(|| RepoError::InvalidInput {
                message: "unknown song".into(),
            })?;
        let singer_name = self
            .singers
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == params.singer_id)
            .map(|s| s.name.clone())
            .ok_or_else(|| RepoError::InvalidInput {
                message: "unknown singer".into(),
            })?;

        let mut pitches = self.pitches.lock().unwrap();
        if pitches
            .iter()
            .any(|p| p.song_id == params.song_id && p.singer_id == params.singer_id)
        {
            return Err(RepoError::duplicate("pitches_song_singer_key"));
        }
        let pitch = PitchRecord {
            id: Uuid::new_v4(),
            song_id: params.song_id,
            singer_id: params.singer_id,
            value: params.value,
            song_name,
            singer_name,
            created_at: now(),
            updated_at: now(),
        };
        pitches.push(pitch.clone());
        Ok(pitch)
    }

    async fn update_pitch_value(&self, id: Uuid, value: &str) -> Result<PitchRecord, RepoError> {
        self.write_gate()?;
        let mut pitches = self.pitches.lock().unwrap();
        let pitch = pitches
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepoError::NotFound)?;
        pitch.value = value.to_string();
        pitch.updated_at = now();
        Ok(pitch.clone())
    }

    async fn delete_pitch(&self, id: Uuid) -> Result<(), RepoError> {
        self.write_gate()?;
        let mut pitches = self.pitches.lock().unwrap();
        let before = pitches.len();
        pitches.retain(|p| p.id != id);
        if pitches.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl TemplatesRepo for InMemoryGateway {
    async fn list_templates(&self) -> Result<Vec<TemplateRecord>, RepoError> {
        Ok(self.templates.lock().unwrap().clone())
    }


    async fn create_template(
        &self,
        params: CreateTemplateParams,
    ) -> Result<TemplateRecord, RepoError> {
        self.write_gate()?;
        let template = TemplateRecord {
            id: Uuid::new_v4(),
            name: params.name,
            description: params.description,
            aspect_ratio: params.aspect_ratio,
            slides: params.slides,
            reference_slide: params.reference_slide,
            center_id: params.center_id,
            is_default: false,
            yaml: params.yaml,
            created_at: now(),
            updated_at: now(),
        };
        self.templates.lock().unwrap().push(template.clone());
        Ok(template)
    }

    async fn update_template(
        &self,
        id: Uuid,
        params: UpdateTemplateParams,
    ) -> Result<TemplateRecord, RepoError> {
        self.write_gate()?;
        let mut templates = self.templates.lock().unwrap();
        let template = templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(name) = params.name {
            template.name = name;
        }
        if let Some(description) = params.description {
            template.description = Some(description);
        }
        if let Some(ratio) = params.aspect_ratio {
            template.aspect_ratio = ratio;
        }
        if let Some(slides) = params.slides {
            template.slides = slides;
        }
        if let Some(reference_slide) = params.reference_slide {
            template.reference_slide = reference_slide;
        }
        if let Some(center_id) = params.center_id {
            template.center_id = Some(center_id);
        }
        if let Some(yaml) = params.yaml {
            template.yaml = yaml;
        }
        template.updated_at = now();
        Ok(template.clone())
    }

    async fn delete_template(&self, id: Uuid) -> Result<(), RepoError> {
        self.write_gate()?;
        let mut templates = self.templates.lock().unwrap();
        let before = templates.len();
        templates.retain(|t| t.id != id);
        if templates.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn set_default_template(&self, id: Uuid) -> Result<TemplateRecord, RepoError> {
        self.write_gate()?;
        let mut templates = self.templates.lock().unwrap();
        let scope = templates
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.center_id)
            .ok_or(RepoError::NotFound)?;

        for template in templates.iter_mut() {
            if template.center_id == scope {
                let make_default = template.id == id;
                if template.is_default != make_default {
                    template.is_default = make_default;
                    template.updated_at = now();
                }
            }
        }
        Ok(templates
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .expect("template present"))
    }
}

#[async_trait]
impl SessionsRepo for InMemoryGateway {
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, RepoError> {
        Ok(self.sessions.lock().unwrap().clone())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn list_session_items(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<SessionItemRecord>, RepoError> {
        Ok(self
            .session_items
            .lock()
            .unwrap()
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        self.write_gate()?;
        let session = SessionRecord {
            id: Uuid::new_v4(),
            name: params.name,
            center_id: params.center_id,
            created_at: now(),
            updated_at: now(),
        };
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn rename_session(&self, id: Uuid, name: &str) -> Result<SessionRecord, RepoError> {
        self.write_gate()?;
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(RepoError::NotFound)?;
        session.name = name.to_string();
        session.updated_at = now();
        Ok(session.clone())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError> {
        self.write_gate()?;
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        if sessions.len() == before {
            return Err(RepoError::NotFound);
        }
        self.session_items.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn replace_session_items(
        &self,
        session_id: Uuid,
        items: &[SessionItemParams],
    ) -> Result<Vec<SessionItemRecord>, RepoError> {
        self.write_gate()?;
        if !self.sessions.lock().unwrap().iter().any(|s| s.id == session_id) {
            return Err(RepoError::NotFound);
        }
        let records: Vec<SessionItemRecord> = items
            .iter()
            .enumerate()
            .map(|(index, item)| SessionItemRecord {
                id: Uuid::new_v4(),
                session_id,
                song_id: item.song_id,
                singer_id: item.singer_id,
                pitch_id: item.pitch_id,
                position: (index + 1) as i32,
            })
            .collect();
        self.session_items
            .lock()
            .unwrap()
            .insert(session_id, records.clone());
        Ok(records)
    }
}

#[async_trait]
impl CentersRepo for InMemoryGateway {
    async fn list_centers(&self) -> Result<Vec<CenterRecord>, RepoError> {
        Ok(self.centers.lock().unwrap().clone())
    }


    async fn create_center(&self, params: CreateCenterParams) -> Result<CenterRecord, RepoError> {
        self.write_gate()?;
        let center = CenterRecord {
            id: Uuid::new_v4(),
            name: params.name,
            badge_color: params.badge_color,
            editor_ids: params.editor_ids,
            created_at: now(),
            updated_at: now(),
        };
        self.centers.lock().unwrap().push(center.clone());
        Ok(center)
    }

    async fn update_center(
        &self,
        id: Uuid,
        params: UpdateCenterParams,
    ) -> Result<CenterRecord, RepoError> {
        self.write_gate()?;
        let mut centers = self.centers.lock().unwrap();
        let center = centers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(name) = params.name {
            center.name = name;
        }
        if let Some(badge_color) = params.badge_color {
            center.badge_color = badge_color;
        }
        if let Some(editor_ids) = params.editor_ids {
            center.editor_ids = editor_ids;
        }
        center.updated_at = now();
        Ok(center.clone())
    }

    async fn delete_center(&self, id: Uuid) -> Result<(), RepoError> {
        self.write_gate()?;
        let mut centers = self.centers.lock().unwrap();
        let before = centers.len();
        centers.retain(|c| c.id != id);
        if centers.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl FeedbackRepo for InMemoryGateway {
    async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>, RepoError> {
        Ok(self.feedback.lock().unwrap().clone())
    }

    async fn create_feedback(
        &self,
        params: CreateFeedbackParams,
    ) -> Result<FeedbackRecord, RepoError> {
        self.write_gate()?;
        let feedback = FeedbackRecord {
            id: Uuid::new_v4(),
            song_id: params.song_id,
            author: params.author,
            message: params.message,
            created_at: now(),
        };
        self.feedback.lock().unwrap().push(feedback.clone());
        Ok(feedback)
    }

    async fn delete_feedback(&self, id: Uuid) -> Result<(), RepoError> {
        self.write_gate()?;
        let mut feedback = self.feedback.lock().unwrap();
        let before = feedback.len();
        feedback.retain(|f| f.id != id);
        if feedback.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStoreRepo for InMemoryGateway {
    async fn ensure_schema(&self) -> Result<(), RepoError> {
        Ok(())
    }

    async fn load_session(&self, sid: &str) -> Result<Option<StoredSession>, RepoError> {
        Ok(self.http_sessions.lock().unwrap().get(sid).cloned())
    }

    async fn upsert_session(
        &self,
        sid: &str,
        payload: &JsonValue,
        expires_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        self.write_gate()?;
        self.http_sessions.lock().unwrap().insert(
            sid.to_string(),
            StoredSession {
                sid: sid.to_string(),
                payload: payload.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn purge_session(&self, sid: &str) -> Result<(), RepoError> {
        self.write_gate()?;
        self.http_sessions.lock().unwrap().remove(sid);
        Ok(())
    }

    async fn count_sessions(&self) -> Result<u64, RepoError> {
        Ok(self.http_sessions.lock().unwrap().len() as u64)
    }

    async fn clear_sessions(&self) -> Result<(), RepoError> {
        self.write_gate()?;
        self.http_sessions.lock().unwrap().clear();
        Ok(())
    }
}

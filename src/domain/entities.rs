//! Domain entities mirrored from persistent storage.
//!
//! Every record is the canonical in-memory projection of one row; driver
//! casing quirks are normalized once at the gateway boundary so the rest
//! of the crate only ever sees these shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{AspectRatio, Gender};

/// Metadata-only song projection. Large-object content (lyrics, meaning,
/// tags) lives in [`SongContent`] and is hydrated separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub id: Uuid,
    pub name: String,
    pub language: Option<String>,
    pub deity: Option<String>,
    pub tempo: Option<String>,
    pub beat: Option<String>,
    pub raga: Option<String>,
    pub level: Option<String>,
    pub reference_url: Option<String>,
    pub reference_pitches: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// The three large-object song fields. Hydrated as a unit: a song either
/// has none of these resident or all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongContent {
    pub lyrics: Option<String>,
    pub meaning: Option<String>,
    pub tags: Option<String>,
}

/// A song with its large-object content merged in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullSong {
    #[serde(flatten)]
    pub song: SongRecord,
    #[serde(flatten)]
    pub content: SongContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingerRecord {
    pub id: Uuid,
    pub name: String,
    pub gender: Gender,
    pub email: Option<String>,
    pub center_ids: Vec<Uuid>,
    pub is_admin: bool,
    pub editor_for: Vec<Uuid>,
    pub pitch_count: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A song/singer pitch association. At most one record is authoritative
/// per (song_id, singer_id) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchRecord {
    pub id: Uuid,
    pub song_id: Uuid,
    pub singer_id: Uuid,
    pub value: String,
    pub song_name: String,
    pub singer_name: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub aspect_ratio: AspectRatio,
    /// Ordered slide compositions (backgrounds, media layers, text
    /// elements, song-content style blocks) as stored by the editor.
    pub slides: JsonValue,
    pub reference_slide: i32,
    pub center_id: Option<Uuid>,
    pub is_default: bool,
    /// Derived YAML serialization maintained by the template editor.
    pub yaml: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub name: String,
    pub center_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// One playlist entry. Positions are unique and contiguous `1..=N`
/// within a session after any replace or reorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionItemRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub song_id: Uuid,
    pub singer_id: Option<Uuid>,
    pub pitch_id: Option<Uuid>,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CenterRecord {
    pub id: Uuid,
    pub name: String,
    pub badge_color: String,
    pub editor_ids: Vec<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub song_id: Option<Uuid>,
    pub author: Option<String>,
    pub message: String,
    pub created_at: OffsetDateTime,
}

/// Serialized HTTP-session row owned by the session store adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub sid: String,
    pub payload: JsonValue,
    pub expires_at: OffsetDateTime,
}

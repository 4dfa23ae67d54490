//! Request payloads for the JSON API, converted into repo params at the
//! handler boundary.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::application::repos::{
    CreateCenterParams, CreateFeedbackParams, CreatePitchParams, CreateSessionParams,
    CreateSingerParams, CreateSongParams, CreateTemplateParams, SessionItemParams,
    UpdateCenterParams, UpdateSingerParams, UpdateSongParams, UpdateTemplateParams,
};
use crate::domain::types::{AspectRatio, Gender};

#[derive(Debug, Deserialize)]
pub struct CreateSongRequest {
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

impl From<CreateSongRequest> for CreateSongParams {
    fn from(req: CreateSongRequest) -> Self {
        Self {
            name: req.name,
            language: req.language,
            deity: req.deity,
            tempo: req.tempo,
            beat: req.beat,
            raga: req.raga,
            level: req.level,
            reference_url: req.reference_url,
            reference_pitches: req.reference_pitches,
            lyrics: req.lyrics,
            meaning: req.meaning,
            tags: req.tags,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateSongRequest {
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

impl From<UpdateSongRequest> for UpdateSongParams {
    fn from(req: UpdateSongRequest) -> Self {
        Self {
            name: req.name,
            language: req.language,
            deity: req.deity,
            tempo: req.tempo,
            beat: req.beat,
            raga: req.raga,
            level: req.level,
            reference_url: req.reference_url,
            reference_pitches: req.reference_pitches,
            lyrics: req.lyrics,
            meaning: req.meaning,
            tags: req.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSingerRequest {
    pub name: String,
    pub gender: Gender,
    pub email: Option<String>,
    #[serde(default)]
    pub center_ids: Vec<Uuid>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub editor_for: Vec<Uuid>,
}

impl From<CreateSingerRequest> for CreateSingerParams {
    fn from(req: CreateSingerRequest) -> Self {
        Self {
            name: req.name,
            gender: req.gender,
            email: req.email,
            center_ids: req.center_ids,
            is_admin: req.is_admin,
            editor_for: req.editor_for,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateSingerRequest {
    pub name: Option<String>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub center_ids: Option<Vec<Uuid>>,
    pub is_admin: Option<bool>,
    pub editor_for: Option<Vec<Uuid>>,
}

impl From<UpdateSingerRequest> for UpdateSingerParams {
    fn from(req: UpdateSingerRequest) -> Self {
        Self {
            name: req.name,
            gender: req.gender,
            email: req.email,
            center_ids: req.center_ids,
            is_admin: req.is_admin,
            editor_for: req.editor_for,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePitchRequest {
    pub song_id: Uuid,
    pub singer_id: Uuid,
    pub value: String,
}

impl From<CreatePitchRequest> for CreatePitchParams {
    fn from(req: CreatePitchRequest) -> Self {
        Self {
            song_id: req.song_id,
            singer_id: req.singer_id,
            value: req.value,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePitchRequest {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub description: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub slides: JsonValue,
    #[serde(default)]
    pub reference_slide: i32,
    pub center_id: Option<Uuid>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub yaml: String,
}

impl From<CreateTemplateRequest> for CreateTemplateParams {
    fn from(req: CreateTemplateRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            aspect_ratio: req.aspect_ratio,
            slides: req.slides,
            reference_slide: req.reference_slide,
            center_id: req.center_id,
            is_default: req.is_default,
            yaml: req.yaml,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub aspect_ratio: Option<AspectRatio>,
    pub slides: Option<JsonValue>,
    pub reference_slide: Option<i32>,
    pub center_id: Option<Uuid>,
    pub yaml: Option<String>,
}

impl From<UpdateTemplateRequest> for UpdateTemplateParams {
    fn from(req: UpdateTemplateRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            aspect_ratio: req.aspect_ratio,
            slides: req.slides,
            reference_slide: req.reference_slide,
            center_id: req.center_id,
            yaml: req.yaml,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    pub center_id: Option<Uuid>,
}

impl From<CreateSessionRequest> for CreateSessionParams {
    fn from(req: CreateSessionRequest) -> Self {
        Self {
            name: req.name,
            center_id: req.center_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RenameSessionRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionItemRequest {
    pub song_id: Uuid,
    pub singer_id: Option<Uuid>,
    pub pitch_id: Option<Uuid>,
}

impl From<SessionItemRequest> for SessionItemParams {
    fn from(req: SessionItemRequest) -> Self {
        Self {
            song_id: req.song_id,
            singer_id: req.singer_id,
            pitch_id: req.pitch_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplaceSessionItemsRequest {
    pub items: Vec<SessionItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCenterRequest {
    pub name: String,
    pub badge_color: String,
    #[serde(default)]
    pub editor_ids: Vec<Uuid>,
}

impl From<CreateCenterRequest> for CreateCenterParams {
    fn from(req: CreateCenterRequest) -> Self {
        Self {
            name: req.name,
            badge_color: req.badge_color,
            editor_ids: req.editor_ids,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateCenterRequest {
    pub name: Option<String>,
    pub badge_color: Option<String>,
    pub editor_ids: Option<Vec<Uuid>>,
}

impl From<UpdateCenterRequest> for UpdateCenterParams {
    fn from(req: UpdateCenterRequest) -> Self {
        Self {
            name: req.name,
            badge_color: req.badge_color,
            editor_ids: req.editor_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateFeedbackRequest {
    pub song_id: Option<Uuid>,
    pub author: Option<String>,
    pub message: String,
}

impl From<CreateFeedbackRequest> for CreateFeedbackParams {
    fn from(req: CreateFeedbackRequest) -> Self {
        Self {
            song_id: req.song_id,
            author: req.author,
            message: req.message,
        }
    }
}

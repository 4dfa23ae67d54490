//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "singer_gender", rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "template_aspect_ratio", rename_all = "snake_case")]
pub enum AspectRatio {
    Widescreen,
    Standard,
    Vertical,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Standard => "4:3",
            AspectRatio::Vertical => "9:16",
        }
    }
}

/// Entity families tracked by the resident caches and the export surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Songs,
    Singers,
    Pitches,
    Templates,
    Sessions,
    Centers,
    Feedback,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Songs => "songs",
            EntityKind::Singers => "singers",
            EntityKind::Pitches => "pitches",
            EntityKind::Templates => "templates",
            EntityKind::Sessions => "sessions",
            EntityKind::Centers => "centers",
            EntityKind::Feedback => "feedback",
        }
    }

    pub const ALL: [EntityKind; 7] = [
        EntityKind::Songs,
        EntityKind::Singers,
        EntityKind::Pitches,
        EntityKind::Templates,
        EntityKind::Sessions,
        EntityKind::Centers,
        EntityKind::Feedback,
    ];
}

impl std::str::FromStr for EntityKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "songs" => Ok(EntityKind::Songs),
            "singers" => Ok(EntityKind::Singers),
            "pitches" => Ok(EntityKind::Pitches),
            "templates" => Ok(EntityKind::Templates),
            "sessions" => Ok(EntityKind::Sessions),
            "centers" => Ok(EntityKind::Centers),
            "feedback" => Ok(EntityKind::Feedback),
            _ => Err(()),
        }
    }
}

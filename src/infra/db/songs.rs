//! Song persistence. The metadata projection and the large-object
//! content columns are selected by separate queries so list traffic never
//! drags lyrics over the wire.

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreateSongParams, RepoError, SongsRepo, UpdateSongParams},
    domain::entities::{SongContent, SongRecord},
};

use super::{PostgresGateway, map_sqlx_error};

const SONG_COLUMNS: &str = "id, name, language, deity, tempo, beat, raga, level, \
     reference_url, reference_pitches, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct SongRow {
    id: Uuid,
    name: String,
    language: Option<String>,
    deity: Option<String>,
    tempo: Option<String>,
    beat: Option<String>,
    raga: Option<String>,
    level: Option<String>,
    reference_url: Option<String>,
    reference_pitches: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<SongRow> for SongRecord {
    fn from(row: SongRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            language: row.language,
            deity: row.deity,
            tempo: row.tempo,
            beat: row.beat,
            raga: row.raga,
            level: row.level,
            reference_url: row.reference_url,
            reference_pitches: row.reference_pitches,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SongContentRow {
    lyrics: Option<String>,
    meaning: Option<String>,
    tags: Option<String>,
}

impl From<SongContentRow> for SongContent {
    fn from(row: SongContentRow) -> Self {
        Self {
            lyrics: row.lyrics,
            meaning: row.meaning,
            tags: row.tags,
        }
    }
}

#[async_trait]
impl SongsRepo for PostgresGateway {
    async fn list_songs(&self) -> Result<Vec<SongRecord>, RepoError> {
        let rows = sqlx::query_as::<_, SongRow>(&format!(
            "SELECT {SONG_COLUMNS} FROM songs ORDER BY LOWER(name), id"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(SongRecord::from).collect())
    }

    async fn fetch_song_content(&self, id: Uuid) -> Result<Option<SongContent>, RepoError> {
        let row = sqlx::query_as::<_, SongContentRow>(
            "SELECT lyrics, meaning, tags FROM songs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SongContent::from))
    }

    async fn fetch_all_song_content(&self) -> Result<Vec<(Uuid, SongContent)>, RepoError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: Uuid,
            lyrics: Option<String>,
            meaning: Option<String>,
            tags: Option<String>,
        }

        let rows = sqlx::query_as::<_, Row>("SELECT id, lyrics, meaning, tags FROM songs")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.id,
                    SongContent {
                        lyrics: row.lyrics,
                        meaning: row.meaning,
                        tags: row.tags,
                    },
                )
            })
            .collect())
    }

    async fn create_song(&self, params: CreateSongParams) -> Result<SongRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let row = sqlx::query_as::<_, SongRow>(&format!(
            "INSERT INTO songs (
                id, name, language, deity, tempo, beat, raga, level,
                reference_url, reference_pitches, lyrics, meaning, tags,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
            RETURNING {SONG_COLUMNS}"
        ))
        .bind(id)
        .bind(params.name)
        .bind(params.language)
        .bind(params.deity)
        .bind(params.tempo)
        .bind(params.beat)
        .bind(params.raga)
        .bind(params.level)
        .bind(params.reference_url)
        .bind(params.reference_pitches)
        .bind(params.lyrics)
        .bind(params.meaning)
        .bind(params.tags)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(SongRecord::from(row))
    }

    async fn update_song(
        &self,
        id: Uuid,
        params: UpdateSongParams,
    ) -> Result<SongRecord, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE songs SET updated_at = now()");

        push_assign(&mut qb, "name", params.name);
        push_assign(&mut qb, "language", params.language);
        push_assign(&mut qb, "deity", params.deity);
        push_assign(&mut qb, "tempo", params.tempo);
        push_assign(&mut qb, "beat", params.beat);
        push_assign(&mut qb, "raga", params.raga);
        push_assign(&mut qb, "level", params.level);
        push_assign(&mut qb, "reference_url", params.reference_url);
        push_assign(&mut qb, "reference_pitches", params.reference_pitches);
        push_assign(&mut qb, "lyrics", params.lyrics);
        push_assign(&mut qb, "meaning", params.meaning);
        push_assign(&mut qb, "tags", params.tags);

        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(format!(" RETURNING {SONG_COLUMNS}"));

        let row = qb
            .build_query_as::<SongRow>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(SongRecord::from(row))
    }

    async fn delete_song(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM songs WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

fn push_assign(qb: &mut QueryBuilder<'_, Postgres>, column: &str, value: Option<String>) {
    if let Some(value) = value {
        qb.push(format!(", {column} = "));
        qb.push_bind(value);
    }
}

//! Pitch persistence. The unique index on `(song_id, singer_id)` is the
//! authoritative duplicate check; the cache's resident scan is advisory.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreatePitchParams, PitchesRepo, RepoError},
    domain::entities::PitchRecord,
};

use super::{PostgresGateway, map_sqlx_error};

const PITCH_SELECT: &str = "SELECT p.id, p.song_id, p.singer_id, p.value, \
            so.name AS song_name, si.name AS singer_name, \
            p.created_at, p.updated_at \
     FROM pitches p \
     INNER JOIN songs so ON so.id = p.song_id \
     INNER JOIN singers si ON si.id = p.singer_id";

#[derive(sqlx::FromRow)]
struct PitchRow {
    id: Uuid,
    song_id: Uuid,
    singer_id: Uuid,
    value: String,
    song_name: String,
    singer_name: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PitchRow> for PitchRecord {
    fn from(row: PitchRow) -> Self {
        Self {
            id: row.id,
            song_id: row.song_id,
            singer_id: row.singer_id,
            value: row.value,
            song_name: row.song_name,
            singer_name: row.singer_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl PitchesRepo for PostgresGateway {
    async fn list_pitches(&self) -> Result<Vec<PitchRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PitchRow>(&format!(
            "{PITCH_SELECT} ORDER BY LOWER(so.name), LOWER(si.name), p.id"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PitchRecord::from).collect())
    }

    async fn find_pitch(&self, id: Uuid) -> Result<Option<PitchRecord>, RepoError> {
        let row = sqlx::query_as::<_, PitchRow>(&format!("{PITCH_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PitchRecord::from))
    }

    async fn find_pitch_by_pair(
        &self,
        song_id: Uuid,
        singer_id: Uuid,
    ) -> Result<Option<PitchRecord>, RepoError> {
        let row = sqlx::query_as::<_, PitchRow>(&format!(
            "{PITCH_SELECT} WHERE p.song_id = $1 AND p.singer_id = $2"
        ))
        .bind(song_id)
        .bind(singer_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PitchRecord::from))
    }

    async fn create_pitch(&self, params: CreatePitchParams) -> Result<PitchRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        sqlx::query(
            "INSERT INTO pitches (id, song_id, singer_id, value, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)",
        )
        .bind(id)
        .bind(params.song_id)
        .bind(params.singer_id)
        .bind(params.value)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.find_pitch(id).await?.ok_or(RepoError::NotFound)
    }

    async fn update_pitch_value(&self, id: Uuid, value: &str) -> Result<PitchRecord, RepoError> {
        let result = sqlx::query("UPDATE pitches SET value = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(value)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        self.find_pitch(id).await?.ok_or(RepoError::NotFound)
    }

    async fn delete_pitch(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM pitches WHERE id = $1")
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

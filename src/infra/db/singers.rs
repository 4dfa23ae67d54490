//! Singer persistence. Names are unique case-insensitively; the
//! `pitch_count` column every projection carries is computed from the
//! pitches table at read time.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreateSingerParams, RepoError, SingersRepo, UpdateSingerParams},
    domain::entities::SingerRecord,
    domain::types::Gender,
};

use super::{PostgresGateway, map_sqlx_error};

const SINGER_SELECT: &str = "SELECT s.id, s.name, s.gender, s.email, s.center_ids, \
            s.is_admin, s.editor_for, \
            (SELECT COUNT(*) FROM pitches p WHERE p.singer_id = s.id) AS pitch_count, \
            s.created_at, s.updated_at \
     FROM singers s";

#[derive(sqlx::FromRow)]
struct SingerRow {
    id: Uuid,
    name: String,
    gender: Gender,
    email: Option<String>,
    center_ids: Vec<Uuid>,
    is_admin: bool,
    editor_for: Vec<Uuid>,
    pitch_count: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<SingerRow> for SingerRecord {
    fn from(row: SingerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            gender: row.gender,
            email: row.email,
            center_ids: row.center_ids,
            is_admin: row.is_admin,
            editor_for: row.editor_for,
            pitch_count: row.pitch_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl SingersRepo for PostgresGateway {
    async fn list_singers(&self) -> Result<Vec<SingerRecord>, RepoError> {
        let rows = sqlx::query_as::<_, SingerRow>(&format!(
            "{SINGER_SELECT} ORDER BY LOWER(s.name), s.id"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(SingerRecord::from).collect())
    }

    async fn find_singer(&self, id: Uuid) -> Result<Option<SingerRecord>, RepoError> {
        let row = sqlx::query_as::<_, SingerRow>(&format!("{SINGER_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(SingerRecord::from))
    }

    async fn find_singer_by_name(&self, name: &str) -> Result<Option<SingerRecord>, RepoError> {
        let row = sqlx::query_as::<_, SingerRow>(&format!(
            "{SINGER_SELECT} WHERE LOWER(s.name) = LOWER($1)"
        ))
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SingerRecord::from))
    }

    async fn create_singer(&self, params: CreateSingerParams) -> Result<SingerRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let row = sqlx::query_as::<_, SingerRow>(
            "INSERT INTO singers (
                id, name, gender, email, center_ids, is_admin, editor_for,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING id, name, gender, email, center_ids, is_admin, editor_for,
                      0::bigint AS pitch_count, created_at, updated_at",
        )
        .bind(id)
        .bind(params.name)
        .bind(params.gender)
        .bind(params.email)
        .bind(params.center_ids)
        .bind(params.is_admin)
        .bind(params.editor_for)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(SingerRecord::from(row))
    }

    async fn update_singer(
        &self,
        id: Uuid,
        params: UpdateSingerParams,
    ) -> Result<SingerRecord, RepoError> {
        sqlx::query(
            "UPDATE singers
             SET name = COALESCE($2, name),
                 gender = COALESCE($3, gender),
                 email = COALESCE($4, email),
                 center_ids = COALESCE($5, center_ids),
                 is_admin = COALESCE($6, is_admin),
                 editor_for = COALESCE($7, editor_for),
                 updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(params.name)
        .bind(params.gender)
        .bind(params.email)
        .bind(params.center_ids)
        .bind(params.is_admin)
        .bind(params.editor_for)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.find_singer(id).await?.ok_or(RepoError::NotFound)
    }

    async fn delete_singer(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM singers WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn reassign_pitches(&self, source: Uuid, target: Uuid) -> Result<u64, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        // A pitch whose (song, target) pair already exists cannot move
        // without violating uniqueness; the target's value wins.
        sqlx::query(
            "DELETE FROM pitches p
             WHERE p.singer_id = $1
               AND EXISTS (
                   SELECT 1 FROM pitches q
                   WHERE q.singer_id = $2 AND q.song_id = p.song_id
               )",
        )
        .bind(source)
        .bind(target)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let moved = sqlx::query(
            "UPDATE pitches SET singer_id = $2, updated_at = now() WHERE singer_id = $1",
        )
        .bind(source)
        .bind(target)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(moved)
    }
}

//! Song-session persistence. Item replacement is transactional and
//! renumbers positions `1..=N`, keeping them contiguous no matter what
//! the caller sent.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateSessionParams, RepoError, SessionItemParams, SessionsRepo,
    },
    domain::entities::{SessionItemRecord, SessionRecord},
};

use super::{PostgresGateway, map_sqlx_error};

const SESSION_COLUMNS: &str = "id, name, center_id, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, session_id, song_id, singer_id, pitch_id, position";

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    name: String,
    center_id: Option<Uuid>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            center_id: row.center_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionItemRow {
    id: Uuid,
    session_id: Uuid,
    song_id: Uuid,
    singer_id: Option<Uuid>,
    pitch_id: Option<Uuid>,
    position: i32,
}

impl From<SessionItemRow> for SessionItemRecord {
    fn from(row: SessionItemRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            song_id: row.song_id,
            singer_id: row.singer_id,
            pitch_id: row.pitch_id,
            position: row.position,
        }
    }
}

#[async_trait]
impl SessionsRepo for PostgresGateway {
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, RepoError> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM song_sessions ORDER BY updated_at DESC, id"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(SessionRecord::from).collect())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM song_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SessionRecord::from))
    }

    async fn list_session_items(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<SessionItemRecord>, RepoError> {
        let rows = sqlx::query_as::<_, SessionItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM session_items WHERE session_id = $1 ORDER BY position"
        ))
        .bind(session_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(SessionItemRecord::from).collect())
    }

    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "INSERT INTO song_sessions (id, name, center_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id)
        .bind(params.name)
        .bind(params.center_id)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(SessionRecord::from(row))
    }

    async fn rename_session(&self, id: Uuid, name: &str) -> Result<SessionRecord, RepoError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "UPDATE song_sessions SET name = $2, updated_at = now()
             WHERE id = $1
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(SessionRecord::from(row))
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM song_sessions WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn replace_session_items(
        &self,
        session_id: Uuid,
        items: &[SessionItemParams],
    ) -> Result<Vec<SessionItemRecord>, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM song_sessions WHERE id = $1 FOR UPDATE")
                .bind(session_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        if exists.is_none() {
            return Err(RepoError::NotFound);
        }

        sqlx::query("DELETE FROM session_items WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let mut records = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let row = sqlx::query_as::<_, SessionItemRow>(&format!(
                "INSERT INTO session_items (
                    id, session_id, song_id, singer_id, pitch_id, position
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {ITEM_COLUMNS}"
            ))
            .bind(Uuid::new_v4())
            .bind(session_id)
            .bind(item.song_id)
            .bind(item.singer_id)
            .bind(item.pitch_id)
            .bind((index + 1) as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            records.push(SessionItemRecord::from(row));
        }

        sqlx::query("UPDATE song_sessions SET updated_at = now() WHERE id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(records)
    }
}

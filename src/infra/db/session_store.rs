//! Durable HTTP-session rows. The upsert is a single `ON CONFLICT`
//! statement, so two concurrent writes for a fresh sid both succeed and
//! the later one wins.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

use crate::{
    application::repos::{RepoError, SessionStoreRepo},
    domain::entities::StoredSession,
};

use super::{PostgresGateway, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct HttpSessionRow {
    sid: String,
    payload: JsonValue,
    expires_at: OffsetDateTime,
}

impl From<HttpSessionRow> for StoredSession {
    fn from(row: HttpSessionRow) -> Self {
        Self {
            sid: row.sid,
            payload: row.payload,
            expires_at: row.expires_at,
        }
    }
}

#[async_trait]
impl SessionStoreRepo for PostgresGateway {
    async fn ensure_schema(&self) -> Result<(), RepoError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS http_sessions (
                 sid TEXT PRIMARY KEY,
                 payload JSONB NOT NULL,
                 expires_at TIMESTAMPTZ NOT NULL
             )",
        )
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn load_session(&self, sid: &str) -> Result<Option<StoredSession>, RepoError> {
        let row = sqlx::query_as::<_, HttpSessionRow>(
            "SELECT sid, payload, expires_at FROM http_sessions WHERE sid = $1",
        )
        .bind(sid)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(StoredSession::from))
    }

    async fn upsert_session(
        &self,
        sid: &str,
        payload: &JsonValue,
        expires_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO http_sessions (sid, payload, expires_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (sid)
             DO UPDATE SET payload = EXCLUDED.payload, expires_at = EXCLUDED.expires_at",
        )
        .bind(sid)
        .bind(payload)
        .bind(expires_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn purge_session(&self, sid: &str) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM http_sessions WHERE sid = $1")
            .bind(sid)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn count_sessions(&self) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM http_sessions")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        u64::try_from(count)
            .map_err(|_| RepoError::from_persistence("session count exceeds supported range"))
    }

    async fn clear_sessions(&self) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM http_sessions")
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

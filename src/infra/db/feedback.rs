use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreateFeedbackParams, FeedbackRepo, RepoError},
    domain::entities::FeedbackRecord,
};

use super::{PostgresGateway, map_sqlx_error};

const FEEDBACK_COLUMNS: &str = "id, song_id, author, message, created_at";

#[derive(sqlx::FromRow)]
struct FeedbackRow {
    id: Uuid,
    song_id: Option<Uuid>,
    author: Option<String>,
    message: String,
    created_at: OffsetDateTime,
}

impl From<FeedbackRow> for FeedbackRecord {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: row.id,
            song_id: row.song_id,
            author: row.author,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl FeedbackRepo for PostgresGateway {
    async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>, RepoError> {
        let rows = sqlx::query_as::<_, FeedbackRow>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback ORDER BY created_at DESC, id"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(FeedbackRecord::from).collect())
    }

    async fn create_feedback(
        &self,
        params: CreateFeedbackParams,
    ) -> Result<FeedbackRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            "INSERT INTO feedback (id, song_id, author, message, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {FEEDBACK_COLUMNS}"
        ))
        .bind(id)
        .bind(params.song_id)
        .bind(params.author)
        .bind(params.message)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(FeedbackRecord::from(row))
    }

    async fn delete_feedback(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM feedback WHERE id = $1")
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

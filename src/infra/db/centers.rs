use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CentersRepo, CreateCenterParams, RepoError, UpdateCenterParams},
    domain::entities::CenterRecord,
};

use super::{PostgresGateway, map_sqlx_error};

const CENTER_COLUMNS: &str = "id, name, badge_color, editor_ids, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CenterRow {
    id: Uuid,
    name: String,
    badge_color: String,
    editor_ids: Vec<Uuid>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CenterRow> for CenterRecord {
    fn from(row: CenterRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            badge_color: row.badge_color,
            editor_ids: row.editor_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CentersRepo for PostgresGateway {
    async fn list_centers(&self) -> Result<Vec<CenterRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CenterRow>(&format!(
            "SELECT {CENTER_COLUMNS} FROM centers ORDER BY LOWER(name), id"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CenterRecord::from).collect())
    }

    async fn create_center(&self, params: CreateCenterParams) -> Result<CenterRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let row = sqlx::query_as::<_, CenterRow>(&format!(
            "INSERT INTO centers (id, name, badge_color, editor_ids, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             RETURNING {CENTER_COLUMNS}"
        ))
        .bind(id)
        .bind(params.name)
        .bind(params.badge_color)
        .bind(params.editor_ids)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CenterRecord::from(row))
    }

    async fn update_center(
        &self,
        id: Uuid,
        params: UpdateCenterParams,
    ) -> Result<CenterRecord, RepoError> {
        let row = sqlx::query_as::<_, CenterRow>(&format!(
            "UPDATE centers
             SET name = COALESCE($2, name),
                 badge_color = COALESCE($3, badge_color),
                 editor_ids = COALESCE($4, editor_ids),
                 updated_at = now()
             WHERE id = $1
             RETURNING {CENTER_COLUMNS}"
        ))
        .bind(id)
        .bind(params.name)
        .bind(params.badge_color)
        .bind(params.editor_ids)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CenterRecord::from(row))
    }

    async fn delete_center(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM centers WHERE id = $1")
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

//! Template persistence. Default exclusivity is enforced inside one
//! transaction: clearing the old default and setting the new one commit
//! together or not at all.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreateTemplateParams, RepoError, TemplatesRepo, UpdateTemplateParams},
    domain::entities::TemplateRecord,
    domain::types::AspectRatio,
};

use super::{PostgresGateway, map_sqlx_error};

const TEMPLATE_COLUMNS: &str = "id, name, description, aspect_ratio, slides, reference_slide, \
     center_id, is_default, yaml, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    aspect_ratio: AspectRatio,
    slides: JsonValue,
    reference_slide: i32,
    center_id: Option<Uuid>,
    is_default: bool,
    yaml: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<TemplateRow> for TemplateRecord {
    fn from(row: TemplateRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            aspect_ratio: row.aspect_ratio,
            slides: row.slides,
            reference_slide: row.reference_slide,
            center_id: row.center_id,
            is_default: row.is_default,
            yaml: row.yaml,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl TemplatesRepo for PostgresGateway {
    async fn list_templates(&self) -> Result<Vec<TemplateRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates ORDER BY LOWER(name), id"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TemplateRecord::from).collect())
    }

    async fn create_template(
        &self,
        params: CreateTemplateParams,
    ) -> Result<TemplateRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        // `is_default` lands false here; the caller promotes through
        // `set_default_template` so exclusivity is handled in one place.
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "INSERT INTO templates (
                id, name, description, aspect_ratio, slides, reference_slide,
                center_id, is_default, yaml, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8, $9, $9)
            RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(id)
        .bind(params.name)
        .bind(params.description)
        .bind(params.aspect_ratio)
        .bind(params.slides)
        .bind(params.reference_slide)
        .bind(params.center_id)
        .bind(params.yaml)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(TemplateRecord::from(row))
    }

    async fn update_template(
        &self,
        id: Uuid,
        params: UpdateTemplateParams,
    ) -> Result<TemplateRecord, RepoError> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "UPDATE templates
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 aspect_ratio = COALESCE($4, aspect_ratio),
                 slides = COALESCE($5, slides),
                 reference_slide = COALESCE($6, reference_slide),
                 center_id = COALESCE($7, center_id),
                 yaml = COALESCE($8, yaml),
                 updated_at = now()
             WHERE id = $1
             RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(id)
        .bind(params.name)
        .bind(params.description)
        .bind(params.aspect_ratio)
        .bind(params.slides)
        .bind(params.reference_slide)
        .bind(params.center_id)
        .bind(params.yaml)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(TemplateRecord::from(row))
    }

    async fn delete_template(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn set_default_template(&self, id: Uuid) -> Result<TemplateRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let scope: Option<Uuid> =
            sqlx::query_scalar("SELECT center_id FROM templates WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?
                .ok_or(RepoError::NotFound)?;

        // NOT DISTINCT FROM treats the global scope (NULL center) the
        // same as a concrete center.
        sqlx::query(
            "UPDATE templates
             SET is_default = FALSE, updated_at = now()
             WHERE is_default AND center_id IS NOT DISTINCT FROM $1 AND id <> $2",
        )
        .bind(scope)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "UPDATE templates
             SET is_default = TRUE, updated_at = now()
             WHERE id = $1
             RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(TemplateRecord::from(row))
    }
}

//! Media catalog repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres};
use stratus_core::models::{Media, MediaFilter, MediaStatus, MediaType};
use stratus_core::AppError;
use uuid::Uuid;

use crate::traits::MediaStore;

const COLUMNS: &str = "id, storage_account_id, folder_id, group_id, filename, \
    original_filename, storage_key, media_type, mime_type, size_bytes, width, height, \
    duration_secs, public_url, thumbnail_url, provider_id, provider_metadata, tags, uploaded_by, \
    status, access_count, download_count, created_at, updated_at, completed_at, deleted_at";

/// Database row for media table.
#[derive(Debug, sqlx::FromRow)]
pub struct MediaRow {
    pub id: Uuid,
    pub storage_account_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub filename: String,
    pub original_filename: String,
    pub storage_key: String,
    pub media_type: MediaType,
    pub mime_type: String,
    pub size_bytes: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_secs: Option<f64>,
    pub public_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub provider_id: Option<String>,
    pub provider_metadata: JsonValue,
    pub tags: Vec<String>,
    pub uploaded_by: Option<Uuid>,
    pub status: MediaStatus,
    pub access_count: i64,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MediaRow {
    pub fn to_model(self) -> Media {
        Media {
            id: self.id,
            storage_account_id: self.storage_account_id,
            folder_id: self.folder_id,
            group_id: self.group_id,
            filename: self.filename,
            original_filename: self.original_filename,
            storage_key: self.storage_key,
            media_type: self.media_type,
            mime_type: self.mime_type,
            size_bytes: self.size_bytes,
            width: self.width,
            height: self.height,
            duration_secs: self.duration_secs,
            public_url: self.public_url,
            thumbnail_url: self.thumbnail_url,
            provider_id: self.provider_id,
            provider_metadata: self.provider_metadata,
            tags: self.tags,
            uploaded_by: self.uploaded_by,
            status: self.status,
            access_count: self.access_count,
            download_count: self.download_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
}

impl MediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaStore for MediaRepository {
    #[tracing::instrument(skip(self, media), fields(db.table = "media", db.operation = "insert", db.record_id = %media.id))]
    async fn create(&self, media: &Media) -> Result<Media, AppError> {
        let row = sqlx::query_as::<Postgres, MediaRow>(&format!(
            r#"
            INSERT INTO media (
                id, storage_account_id, folder_id, group_id, filename, original_filename,
                storage_key, media_type, mime_type, size_bytes, width, height, duration_secs,
                public_url, thumbnail_url, provider_id, provider_metadata, tags, uploaded_by,
                status, created_at, updated_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $21, $22)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(media.id)
        .bind(media.storage_account_id)
        .bind(media.folder_id)
        .bind(media.group_id)
        .bind(&media.filename)
        .bind(&media.original_filename)
        .bind(&media.storage_key)
        .bind(media.media_type)
        .bind(&media.mime_type)
        .bind(media.size_bytes)
        .bind(media.width)
        .bind(media.height)
        .bind(media.duration_secs)
        .bind(&media.public_url)
        .bind(&media.thumbnail_url)
        .bind(&media.provider_id)
        .bind(&media.provider_metadata)
        .bind(&media.tags)
        .bind(media.uploaded_by)
        .bind(media.status)
        .bind(media.created_at)
        .bind(media.completed_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.to_model())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<Media>, AppError> {
        let row = sqlx::query_as::<Postgres, MediaRow>(&format!(
            "SELECT {} FROM media WHERE id = $1 AND deleted_at IS NULL",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MediaRow::to_model))
    }

    #[tracing::instrument(skip(self, media), fields(db.table = "media", db.operation = "update", db.record_id = %media.id))]
    async fn update(&self, media: &Media) -> Result<Media, AppError> {
        let row = sqlx::query_as::<Postgres, MediaRow>(&format!(
            r#"
            UPDATE media
            SET storage_account_id = $2, folder_id = $3, group_id = $4, filename = $5,
                storage_key = $6, media_type = $7, mime_type = $8, size_bytes = $9,
                width = $10, height = $11, duration_secs = $12, public_url = $13,
                thumbnail_url = $14, provider_id = $15, provider_metadata = $16, tags = $17,
                status = $18, completed_at = $19, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(media.id)
        .bind(media.storage_account_id)
        .bind(media.folder_id)
        .bind(media.group_id)
        .bind(&media.filename)
        .bind(&media.storage_key)
        .bind(media.media_type)
        .bind(&media.mime_type)
        .bind(media.size_bytes)
        .bind(media.width)
        .bind(media.height)
        .bind(media.duration_secs)
        .bind(&media.public_url)
        .bind(&media.thumbnail_url)
        .bind(&media.provider_id)
        .bind(&media.provider_metadata)
        .bind(&media.tags)
        .bind(media.status)
        .bind(media.completed_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MediaRow::to_model)
            .ok_or_else(|| AppError::MediaNotFound(media.id.to_string()))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "update", db.record_id = %id))]
    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE media SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    async fn exists_by_key(&self, account_id: Uuid, key: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM media
                WHERE storage_account_id = $1 AND storage_key = $2 AND deleted_at IS NULL
            )
            "#,
        )
        .bind(account_id)
        .bind(key)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    async fn list(&self, filter: &MediaFilter) -> Result<Vec<Media>, AppError> {
        let filter = filter.clone().normalized();
        let rows = sqlx::query_as::<Postgres, MediaRow>(&format!(
            r#"
            SELECT {} FROM media
            WHERE deleted_at IS NULL
              AND ($1::uuid IS NULL OR storage_account_id = $1)
              AND ($2::uuid IS NULL OR group_id = $2)
              AND ($3::uuid IS NULL OR folder_id = $3)
              AND ($4::media_type IS NULL OR media_type = $4)
              AND ($5::media_status IS NULL OR status = $5)
              AND ($6::uuid IS NULL OR uploaded_by = $6)
            ORDER BY created_at DESC
            LIMIT $7 OFFSET $8
            "#,
            COLUMNS
        ))
        .bind(filter.storage_account_id)
        .bind(filter.group_id)
        .bind(filter.folder_id)
        .bind(filter.media_type)
        .bind(filter.status)
        .bind(filter.uploaded_by)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MediaRow::to_model).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    async fn list_pending_older_than(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<(DateTime<Utc>, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Media>, AppError> {
        let (after_created, after_id) = after.unzip();
        let rows = sqlx::query_as::<Postgres, MediaRow>(&format!(
            r#"
            SELECT {} FROM media
            WHERE status = 'pending' AND deleted_at IS NULL AND created_at < $1
              AND ($2::timestamptz IS NULL OR (created_at, id) > ($2, $3))
            ORDER BY created_at ASC, id ASC
            LIMIT $4
            "#,
            COLUMNS
        ))
        .bind(cutoff)
        .bind(after_created)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MediaRow::to_model).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    async fn list_by_account(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Media>, AppError> {
        let rows = sqlx::query_as::<Postgres, MediaRow>(&format!(
            r#"
            SELECT {} FROM media
            WHERE storage_account_id = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
            COLUMNS
        ))
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MediaRow::to_model).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "update", db.record_id = %id))]
    async fn increment_download_count(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE media SET download_count = download_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "update", db.record_id = %id))]
    async fn increment_access_count(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE media SET access_count = access_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

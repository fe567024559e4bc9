use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use stratus_core::models::MediaGroup;
use stratus_core::AppError;
use uuid::Uuid;

use crate::traits::MediaGroupStore;

#[derive(Debug, sqlx::FromRow)]
struct MediaGroupRow {
    id: Uuid,
    name: String,
    default_storage_account_id: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl MediaGroupRow {
    fn to_model(self) -> MediaGroup {
        MediaGroup {
            id: self.id,
            name: self.name,
            default_storage_account_id: self.default_storage_account_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[derive(Clone)]
pub struct MediaGroupRepository {
    pool: PgPool,
}

impl MediaGroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaGroupStore for MediaGroupRepository {
    #[tracing::instrument(skip(self), fields(db.table = "media_groups", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<MediaGroup>, AppError> {
        let row = sqlx::query_as::<Postgres, MediaGroupRow>(
            r#"
            SELECT id, name, default_storage_account_id, created_at, updated_at, deleted_at
            FROM media_groups
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MediaGroupRow::to_model))
    }

    #[tracing::instrument(skip(self, group), fields(db.table = "media_groups", db.operation = "insert", db.record_id = %group.id))]
    async fn create(&self, group: &MediaGroup) -> Result<MediaGroup, AppError> {
        let row = sqlx::query_as::<Postgres, MediaGroupRow>(
            r#"
            INSERT INTO media_groups (id, name, default_storage_account_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, name, default_storage_account_id, created_at, updated_at, deleted_at
            "#,
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(group.default_storage_account_id)
        .bind(group.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.to_model())
    }
}

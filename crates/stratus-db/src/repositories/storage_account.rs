//! Storage account repository: CRUD for the storage_accounts table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use stratus_core::models::{MediaType, StorageAccount};
use stratus_core::{AppError, StorageProvider};
use uuid::Uuid;

use crate::traits::StorageAccountStore;

const COLUMNS: &str = "id, name, provider, encrypted_credentials, credentials_nonce, bucket, \
    region, endpoint, public_url_base, is_default, is_active, is_public, max_file_size_mb, \
    allowed_media_types, created_by, created_at, updated_at, deleted_at";

/// Row type for storage_accounts table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct StorageAccountRow {
    pub id: Uuid,
    pub name: String,
    pub provider: String,
    pub encrypted_credentials: Vec<u8>,
    pub credentials_nonce: Vec<u8>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub public_url_base: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub is_public: bool,
    pub max_file_size_mb: Option<i64>,
    pub allowed_media_types: Vec<MediaType>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StorageAccountRow {
    /// Provider tags are free text in the table; unknown values surface as
    /// `UnsupportedProvider` here.
    pub fn to_model(self) -> Result<StorageAccount, AppError> {
        let provider: StorageProvider = self.provider.parse()?;
        Ok(StorageAccount {
            id: self.id,
            name: self.name,
            provider,
            encrypted_credentials: self.encrypted_credentials,
            credentials_nonce: self.credentials_nonce,
            bucket: self.bucket,
            region: self.region,
            endpoint: self.endpoint,
            public_url_base: self.public_url_base,
            is_default: self.is_default,
            is_active: self.is_active,
            is_public: self.is_public,
            max_file_size_mb: self.max_file_size_mb,
            allowed_media_types: self.allowed_media_types,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

/// Repository for storage_accounts table.
#[derive(Clone)]
pub struct StorageAccountRepository {
    pool: PgPool,
}

impl StorageAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StorageAccountStore for StorageAccountRepository {
    #[tracing::instrument(skip(self, account), fields(db.table = "storage_accounts", db.operation = "insert", db.record_id = %account.id))]
    async fn create(&self, account: &StorageAccount) -> Result<StorageAccount, AppError> {
        let row = sqlx::query_as::<Postgres, StorageAccountRow>(&format!(
            r#"
            INSERT INTO storage_accounts (
                id, name, provider, encrypted_credentials, credentials_nonce, bucket, region,
                endpoint, public_url_base, is_default, is_active, is_public, max_file_size_mb,
                allowed_media_types, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(account.id)
        .bind(&account.name)
        .bind(account.provider.as_str())
        .bind(&account.encrypted_credentials)
        .bind(&account.credentials_nonce)
        .bind(&account.bucket)
        .bind(&account.region)
        .bind(&account.endpoint)
        .bind(&account.public_url_base)
        .bind(account.is_default)
        .bind(account.is_active)
        .bind(account.is_public)
        .bind(account.max_file_size_mb)
        .bind(&account.allowed_media_types)
        .bind(account.created_by)
        .bind(account.created_at)
        .fetch_one(&self.pool)
        .await?;

        row.to_model()
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_accounts", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<StorageAccount>, AppError> {
        let row = sqlx::query_as::<Postgres, StorageAccountRow>(&format!(
            "SELECT {} FROM storage_accounts WHERE id = $1 AND deleted_at IS NULL",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StorageAccountRow::to_model).transpose()
    }

    #[tracing::instrument(skip(self, account), fields(db.table = "storage_accounts", db.operation = "update", db.record_id = %account.id))]
    async fn update(&self, account: &StorageAccount) -> Result<StorageAccount, AppError> {
        let row = sqlx::query_as::<Postgres, StorageAccountRow>(&format!(
            r#"
            UPDATE storage_accounts
            SET name = $2, encrypted_credentials = $3, credentials_nonce = $4, bucket = $5,
                region = $6, endpoint = $7, public_url_base = $8, is_default = $9,
                is_active = $10, is_public = $11, max_file_size_mb = $12,
                allowed_media_types = $13, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.encrypted_credentials)
        .bind(&account.credentials_nonce)
        .bind(&account.bucket)
        .bind(&account.region)
        .bind(&account.endpoint)
        .bind(&account.public_url_base)
        .bind(account.is_default)
        .bind(account.is_active)
        .bind(account.is_public)
        .bind(account.max_file_size_mb)
        .bind(&account.allowed_media_types)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::StorageNotFound(account.id.to_string()))?
            .to_model()
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_accounts", db.operation = "update", db.record_id = %id))]
    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE storage_accounts
            SET deleted_at = NOW(), is_active = FALSE, is_default = FALSE, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_accounts", db.operation = "select"))]
    async fn get_default_active(&self) -> Result<Option<StorageAccount>, AppError> {
        let row = sqlx::query_as::<Postgres, StorageAccountRow>(&format!(
            r#"
            SELECT {} FROM storage_accounts
            WHERE is_default AND is_active AND deleted_at IS NULL
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
            COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.map(StorageAccountRow::to_model).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_accounts", db.operation = "update"))]
    async fn clear_default_except(&self, keep: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE storage_accounts
            SET is_default = FALSE, updated_at = NOW()
            WHERE is_default AND id <> $1
            "#,
        )
        .bind(keep)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_accounts", db.operation = "select"))]
    async fn list(&self, include_inactive: bool) -> Result<Vec<StorageAccount>, AppError> {
        let rows = sqlx::query_as::<Postgres, StorageAccountRow>(&format!(
            r#"
            SELECT {} FROM storage_accounts
            WHERE deleted_at IS NULL AND ($1 OR is_active)
            ORDER BY created_at ASC
            "#,
            COLUMNS
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StorageAccountRow::to_model).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(provider: &str) -> StorageAccountRow {
        let now = Utc::now();
        StorageAccountRow {
            id: Uuid::new_v4(),
            name: "primary".to_string(),
            provider: provider.to_string(),
            encrypted_credentials: vec![1, 2, 3],
            credentials_nonce: vec![0; 12],
            bucket: Some("media".to_string()),
            region: None,
            endpoint: None,
            public_url_base: None,
            is_default: true,
            is_active: true,
            is_public: false,
            max_file_size_mb: Some(50),
            allowed_media_types: vec![MediaType::Image],
            created_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn known_provider_tags_convert() {
        let account = row("cloudinary").to_model().unwrap();
        assert_eq!(account.provider, StorageProvider::Cloudinary);
        assert_eq!(account.credentials_nonce.len(), 12);
        assert_eq!(account.allowed_media_types, vec![MediaType::Image]);
    }

    #[test]
    fn unknown_provider_tag_is_unsupported() {
        let err = row("ftp").to_model().unwrap_err();
        assert!(matches!(err, AppError::UnsupportedProvider(_)));
    }
}

//! Routing rule repository: CRUD for the storage_routing_rules table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use stratus_core::models::{MediaType, StorageRoutingRule};
use stratus_core::AppError;
use uuid::Uuid;

use crate::traits::RoutingRuleStore;

const COLUMNS: &str = "id, name, priority, media_group_id, media_type, min_size_bytes, \
    max_size_bytes, mime_pattern, storage_account_id, folder_prefix, is_active, created_at, \
    updated_at";

#[derive(Debug, sqlx::FromRow)]
pub struct RoutingRuleRow {
    pub id: Uuid,
    pub name: String,
    pub priority: i32,
    pub media_group_id: Option<Uuid>,
    pub media_type: Option<MediaType>,
    pub min_size_bytes: Option<i64>,
    pub max_size_bytes: Option<i64>,
    pub mime_pattern: Option<String>,
    pub storage_account_id: Uuid,
    pub folder_prefix: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoutingRuleRow {
    pub fn to_model(self) -> StorageRoutingRule {
        StorageRoutingRule {
            id: self.id,
            name: self.name,
            priority: self.priority,
            media_group_id: self.media_group_id,
            media_type: self.media_type,
            min_size_bytes: self.min_size_bytes,
            max_size_bytes: self.max_size_bytes,
            mime_pattern: self.mime_pattern,
            storage_account_id: self.storage_account_id,
            folder_prefix: self.folder_prefix,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct RoutingRuleRepository {
    pool: PgPool,
}

impl RoutingRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoutingRuleStore for RoutingRuleRepository {
    #[tracing::instrument(skip(self), fields(db.table = "storage_routing_rules", db.operation = "select"))]
    async fn list_active(&self) -> Result<Vec<StorageRoutingRule>, AppError> {
        let rows = sqlx::query_as::<Postgres, RoutingRuleRow>(&format!(
            r#"
            SELECT {} FROM storage_routing_rules
            WHERE is_active
            ORDER BY priority DESC, created_at ASC
            "#,
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RoutingRuleRow::to_model).collect())
    }

    #[tracing::instrument(skip(self, rule), fields(db.table = "storage_routing_rules", db.operation = "insert", db.record_id = %rule.id))]
    async fn create(&self, rule: &StorageRoutingRule) -> Result<StorageRoutingRule, AppError> {
        let row = sqlx::query_as::<Postgres, RoutingRuleRow>(&format!(
            r#"
            INSERT INTO storage_routing_rules (
                id, name, priority, media_group_id, media_type, min_size_bytes, max_size_bytes,
                mime_pattern, storage_account_id, folder_prefix, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(rule.id)
        .bind(&rule.name)
        .bind(rule.priority)
        .bind(rule.media_group_id)
        .bind(rule.media_type)
        .bind(rule.min_size_bytes)
        .bind(rule.max_size_bytes)
        .bind(&rule.mime_pattern)
        .bind(rule.storage_account_id)
        .bind(&rule.folder_prefix)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.to_model())
    }

    #[tracing::instrument(skip(self, rule), fields(db.table = "storage_routing_rules", db.operation = "update", db.record_id = %rule.id))]
    async fn update(&self, rule: &StorageRoutingRule) -> Result<StorageRoutingRule, AppError> {
        let row = sqlx::query_as::<Postgres, RoutingRuleRow>(&format!(
            r#"
            UPDATE storage_routing_rules
            SET name = $2, priority = $3, media_group_id = $4, media_type = $5,
                min_size_bytes = $6, max_size_bytes = $7, mime_pattern = $8,
                storage_account_id = $9, folder_prefix = $10, is_active = $11,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(rule.id)
        .bind(&rule.name)
        .bind(rule.priority)
        .bind(rule.media_group_id)
        .bind(rule.media_type)
        .bind(rule.min_size_bytes)
        .bind(rule.max_size_bytes)
        .bind(&rule.mime_pattern)
        .bind(rule.storage_account_id)
        .bind(&rule.folder_prefix)
        .bind(rule.is_active)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RoutingRuleRow::to_model)
            .ok_or_else(|| AppError::InvalidInput(format!("Routing rule {} not found", rule.id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_routing_rules", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM storage_routing_rules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

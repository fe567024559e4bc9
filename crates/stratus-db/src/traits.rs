//! Persistence contracts the services depend on.
//!
//! Postgres implementations live in `repositories`; the services crate also ships in-memory
//! versions for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stratus_core::models::{Media, MediaFilter, MediaGroup, StorageAccount, StorageRoutingRule};
use stratus_core::AppError;
use uuid::Uuid;

#[async_trait]
pub trait StorageAccountStore: Send + Sync {
    async fn create(&self, account: &StorageAccount) -> Result<StorageAccount, AppError>;

    /// Non-deleted account by id.
    async fn get(&self, id: Uuid) -> Result<Option<StorageAccount>, AppError>;

    /// Full-row update; bumps `updated_at`.
    async fn update(&self, account: &StorageAccount) -> Result<StorageAccount, AppError>;

    /// Returns false when the account was already gone.
    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// Most recently updated active default account.
    async fn get_default_active(&self) -> Result<Option<StorageAccount>, AppError>;

    /// Clear `is_default` on every account except `keep`.
    async fn clear_default_except(&self, keep: Uuid) -> Result<u64, AppError>;

    async fn list(&self, include_inactive: bool) -> Result<Vec<StorageAccount>, AppError>;
}

#[async_trait]
pub trait RoutingRuleStore: Send + Sync {
    /// Active rules, priority descending then creation time ascending.
    async fn list_active(&self) -> Result<Vec<StorageRoutingRule>, AppError>;

    async fn create(&self, rule: &StorageRoutingRule) -> Result<StorageRoutingRule, AppError>;

    async fn update(&self, rule: &StorageRoutingRule) -> Result<StorageRoutingRule, AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait MediaGroupStore: Send + Sync {
    /// Non-deleted group by id.
    async fn get(&self, id: Uuid) -> Result<Option<MediaGroup>, AppError>;

    async fn create(&self, group: &MediaGroup) -> Result<MediaGroup, AppError>;
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn create(&self, media: &Media) -> Result<Media, AppError>;

    /// Non-deleted media by id.
    async fn get(&self, id: Uuid) -> Result<Option<Media>, AppError>;

    /// Full-row update; bumps `updated_at`.
    async fn update(&self, media: &Media) -> Result<Media, AppError>;

    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// Whether a non-deleted record points at `key` in `account_id`.
    async fn exists_by_key(&self, account_id: Uuid, key: &str) -> Result<bool, AppError>;

    async fn list(&self, filter: &MediaFilter) -> Result<Vec<Media>, AppError>;

    /// Pending records created before `cutoff`, ordered by `(created_at, id)`.
    ///
    /// `after` is a keyset cursor: the `(created_at, id)` of the last row of the previous page.
    async fn list_pending_older_than(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<(DateTime<Utc>, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Media>, AppError>;

    async fn list_by_account(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Media>, AppError>;

    async fn increment_download_count(&self, id: Uuid) -> Result<(), AppError>;

    async fn increment_access_count(&self, id: Uuid) -> Result<(), AppError>;
}

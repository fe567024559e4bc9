//! Administration of storage accounts and routing rules.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use stratus_core::models::{
    Actor, CreateRoutingRuleRequest, CreateStorageAccountRequest, StorageAccount,
    StorageRoutingRule, UpdateStorageAccountRequest,
};
use stratus_core::{AppError, Encryptor, StorageProvider};
use stratus_db::{MediaStore, RoutingRuleStore, StorageAccountStore};
use stratus_storage::{AdapterBuilder, AdapterPool, StorageError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use validator::Validate;

use crate::side_effects::{AuditEvent, SideEffectQueue};
use crate::sync::{SyncOptions, SyncReconciler, SyncReport};

const DELETE_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountDeletionReport {
    pub account_id: Uuid,
    pub media_deleted: usize,
    /// Objects the provider refused to delete; their records are gone regardless.
    pub provider_failures: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTest {
    pub account_id: Uuid,
    pub provider: StorageProvider,
    pub latency_ms: u64,
    pub sample_key: Option<String>,
}

pub struct StorageAccountService {
    accounts: Arc<dyn StorageAccountStore>,
    rules: Arc<dyn RoutingRuleStore>,
    media: Arc<dyn MediaStore>,
    encryptor: Arc<Encryptor>,
    builder: Arc<dyn AdapterBuilder>,
    pool: Arc<AdapterPool>,
    sync: Arc<SyncReconciler>,
    side_effects: SideEffectQueue,
}

impl StorageAccountService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<dyn StorageAccountStore>,
        rules: Arc<dyn RoutingRuleStore>,
        media: Arc<dyn MediaStore>,
        encryptor: Arc<Encryptor>,
        builder: Arc<dyn AdapterBuilder>,
        pool: Arc<AdapterPool>,
        sync: Arc<SyncReconciler>,
        side_effects: SideEffectQueue,
    ) -> Self {
        Self {
            accounts,
            rules,
            media,
            encryptor,
            builder,
            pool,
            sync,
            side_effects,
        }
    }

    pub async fn list_accounts(
        &self,
        actor: &Actor,
        include_inactive: bool,
    ) -> Result<Vec<StorageAccount>, AppError> {
        require_admin(actor)?;
        self.accounts.list(include_inactive).await
    }

    pub async fn get_account(
        &self,
        actor: &Actor,
        account_id: Uuid,
    ) -> Result<StorageAccount, AppError> {
        require_admin(actor)?;
        self.load_account(account_id).await
    }

    #[tracing::instrument(skip(self, actor, request), fields(user_id = %actor.user_id, provider = %request.provider))]
    pub async fn create_account(
        &self,
        actor: &Actor,
        request: CreateStorageAccountRequest,
    ) -> Result<StorageAccount, AppError> {
        require_admin(actor)?;
        request.validate()?;
        let blob = self.seal_credentials(&request.credentials)?;

        let now = Utc::now();
        let mut account = StorageAccount {
            id: Uuid::new_v4(),
            name: request.name,
            provider: request.provider,
            encrypted_credentials: Vec::new(),
            credentials_nonce: Vec::new(),
            bucket: request.bucket,
            region: request.region,
            endpoint: request.endpoint,
            public_url_base: request.public_url_base,
            is_default: request.is_default,
            is_active: request.is_active,
            is_public: request.is_public,
            max_file_size_mb: request.max_file_size_mb,
            allowed_media_types: request.allowed_media_types,
            created_by: Some(actor.user_id),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        account.set_credentials(blob);

        let account = self.accounts.create(&account).await?;
        if account.is_default {
            let cleared = self.accounts.clear_default_except(account.id).await?;
            tracing::debug!(cleared, "Cleared previous default storage accounts");
        }

        self.side_effects.audit(
            AuditEvent::new("storage_account.created", actor)
                .account(account.id)
                .details(json!({ "name": account.name, "provider": account.provider })),
        );
        tracing::info!(account_id = %account.id, "Storage account created");
        Ok(account)
    }

    /// Apply changes; supplied credentials are re-encrypted. The cached adapter is always
    /// dropped since bucket, endpoint or credentials may have changed.
    #[tracing::instrument(skip(self, actor, request), fields(user_id = %actor.user_id, account_id = %account_id))]
    pub async fn update_account(
        &self,
        actor: &Actor,
        account_id: Uuid,
        request: UpdateStorageAccountRequest,
    ) -> Result<StorageAccount, AppError> {
        require_admin(actor)?;
        request.validate()?;
        let mut account = self.load_account(account_id).await?;

        let rotated = request.credentials.is_some();
        if let Some(credentials) = &request.credentials {
            account.set_credentials(self.seal_credentials(credentials)?);
        }
        if let Some(name) = request.name {
            account.name = name;
        }
        if request.bucket.is_some() {
            account.bucket = request.bucket;
        }
        if request.region.is_some() {
            account.region = request.region;
        }
        if request.endpoint.is_some() {
            account.endpoint = request.endpoint;
        }
        if request.public_url_base.is_some() {
            account.public_url_base = request.public_url_base;
        }
        if let Some(is_default) = request.is_default {
            account.is_default = is_default;
        }
        if let Some(is_active) = request.is_active {
            account.is_active = is_active;
        }
        if let Some(is_public) = request.is_public {
            account.is_public = is_public;
        }
        if request.max_file_size_mb.is_some() {
            account.max_file_size_mb = request.max_file_size_mb;
        }
        if let Some(allowed) = request.allowed_media_types {
            account.allowed_media_types = allowed;
        }

        let account = self.accounts.update(&account).await?;
        if account.is_default {
            self.accounts.clear_default_except(account.id).await?;
        }
        self.pool.invalidate_adapter(account.id).await;

        self.side_effects.audit(
            AuditEvent::new("storage_account.updated", actor)
                .account(account.id)
                .details(json!({ "credentials_rotated": rotated })),
        );
        tracing::info!(credentials_rotated = rotated, "Storage account updated");
        Ok(account)
    }

    /// Soft-delete the account and its media. Provider deletion is best effort.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id, account_id = %account_id))]
    pub async fn delete_account(
        &self,
        actor: &Actor,
        account_id: Uuid,
    ) -> Result<AccountDeletionReport, AppError> {
        require_admin(actor)?;
        let account = self.load_account(account_id).await?;

        let adapter = match self.pool.get_adapter(&account).await {
            Ok(adapter) => Some(adapter),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot reach provider, deleting catalog records only");
                None
            }
        };

        let mut all_media = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .media
                .list_by_account(account.id, DELETE_PAGE_SIZE, offset)
                .await?;
            let fetched = page.len() as i64;
            all_media.extend(page);
            if fetched < DELETE_PAGE_SIZE {
                break;
            }
            offset += fetched;
        }

        let mut report = AccountDeletionReport {
            account_id: account.id,
            ..Default::default()
        };
        for media in all_media {
            if let Some(adapter) = &adapter {
                match adapter.delete(&media.storage_key).await {
                    Ok(()) | Err(StorageError::NotFound(_)) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, key = %media.storage_key, "Provider delete failed during account deletion");
                        report.provider_failures += 1;
                    }
                }
            }
            if self.media.soft_delete(media.id).await? {
                report.media_deleted += 1;
            }
        }

        self.accounts.soft_delete(account.id).await?;
        self.pool.invalidate_adapter(account.id).await;

        self.side_effects.audit(
            AuditEvent::new("storage_account.deleted", actor)
                .account(account.id)
                .details(json!({
                    "media_deleted": report.media_deleted,
                    "provider_failures": report.provider_failures,
                })),
        );
        tracing::info!(
            media_deleted = report.media_deleted,
            provider_failures = report.provider_failures,
            "Storage account deleted"
        );
        Ok(report)
    }

    /// Build a throwaway adapter and list one object.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id, account_id = %account_id))]
    pub async fn test_connection(
        &self,
        actor: &Actor,
        account_id: Uuid,
    ) -> Result<ConnectionTest, AppError> {
        require_admin(actor)?;
        let account = self.load_account(account_id).await?;
        let adapter = self.builder.build(&account).await?;

        let start = Instant::now();
        let result = adapter.list(None, 1, None).await;
        adapter.close().await;

        let page = result.map_err(|e| {
            tracing::warn!(error = %e, provider = %account.provider, "Storage connection test failed");
            AppError::ConnectionFailed(e.to_string())
        })?;

        Ok(ConnectionTest {
            account_id: account.id,
            provider: account.provider,
            latency_ms: start.elapsed().as_millis() as u64,
            sample_key: page.files.into_iter().next().map(|f| f.key),
        })
    }

    pub async fn sync(
        &self,
        actor: &Actor,
        account_id: Uuid,
        options: SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, AppError> {
        require_admin(actor)?;
        let account = self.load_account(account_id).await?;
        let report = self
            .sync
            .sync_account(&account, actor, options, cancel)
            .await?;

        self.side_effects.audit(
            AuditEvent::new("storage_account.synced", actor)
                .account(account.id)
                .details(json!({ "added": report.added, "skipped": report.skipped })),
        );
        Ok(report)
    }

    pub async fn create_routing_rule(
        &self,
        actor: &Actor,
        request: CreateRoutingRuleRequest,
    ) -> Result<StorageRoutingRule, AppError> {
        require_admin(actor)?;
        request.validate()?;
        if let (Some(min), Some(max)) = (request.min_size_bytes, request.max_size_bytes) {
            if min > max {
                return Err(AppError::InvalidInput(
                    "min_size_bytes must not exceed max_size_bytes".to_string(),
                ));
            }
        }
        self.load_account(request.storage_account_id).await?;

        let rule = self.rules.create(&request.into_rule()).await?;
        tracing::info!(rule_id = %rule.id, priority = rule.priority, "Routing rule created");
        Ok(rule)
    }

    pub async fn delete_routing_rule(&self, actor: &Actor, rule_id: Uuid) -> Result<(), AppError> {
        require_admin(actor)?;
        if !self.rules.delete(rule_id).await? {
            return Err(AppError::InvalidInput(format!(
                "Routing rule {} not found",
                rule_id
            )));
        }
        Ok(())
    }

    fn seal_credentials(
        &self,
        credentials: &serde_json::Value,
    ) -> Result<stratus_core::EncryptedBlob, AppError> {
        if !credentials.is_object() {
            return Err(AppError::InvalidInput(
                "Credentials must be a JSON object".to_string(),
            ));
        }
        self.encryptor
            .encrypt_json(credentials)
            .map_err(|e| AppError::Internal(format!("Failed to encrypt credentials: {}", e)))
    }

    async fn load_account(&self, account_id: Uuid) -> Result<StorageAccount, AppError> {
        self.accounts
            .get(account_id)
            .await?
            .ok_or_else(|| AppError::StorageNotFound(account_id.to_string()))
    }
}

fn require_admin(actor: &Actor) -> Result<(), AppError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Storage administration requires the admin role".to_string(),
        ))
    }
}

//! Storage selection for new uploads.
//!
//! Precedence is fixed: explicit override, then the media group's default account, then
//! active routing rules by descending priority, then the global default account. Every
//! candidate is checked against its limits before it is accepted; only the override path
//! fails on a limit violation instead of falling through.

use std::sync::Arc;
use stratus_core::mime::normalize_mime_type;
use stratus_core::models::{MediaType, RoutingRequest, StorageAccount, StorageRoutingRule};
use stratus_core::AppError;
use stratus_db::{MediaGroupStore, RoutingRuleStore, StorageAccountStore};
use stratus_storage::provider_max_bytes;
use uuid::Uuid;

/// Which precedence step produced the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingSource {
    Override,
    GroupDefault,
    Rule(Uuid),
    Fallback,
}

#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub account: StorageAccount,
    pub folder_prefix: Option<String>,
    pub source: RoutingSource,
}

pub struct RoutingEngine {
    accounts: Arc<dyn StorageAccountStore>,
    groups: Arc<dyn MediaGroupStore>,
    rules: Arc<dyn RoutingRuleStore>,
}

impl RoutingEngine {
    pub fn new(
        accounts: Arc<dyn StorageAccountStore>,
        groups: Arc<dyn MediaGroupStore>,
        rules: Arc<dyn RoutingRuleStore>,
    ) -> Self {
        Self {
            accounts,
            groups,
            rules,
        }
    }

    #[tracing::instrument(
        skip(self, request),
        fields(
            media_type = %request.media_type,
            mime_type = %request.mime_type,
            size_bytes = request.size_bytes,
        )
    )]
    pub async fn route(&self, request: &RoutingRequest) -> Result<RoutingDecision, AppError> {
        if let Some(account_id) = request.storage_account_id {
            let account = self
                .accounts
                .get(account_id)
                .await?
                .ok_or_else(|| AppError::StorageNotFound(account_id.to_string()))?;
            validate_account_limits(&account, request.media_type, request.size_bytes)?;
            tracing::debug!(account_id = %account.id, "Routed by explicit override");
            return Ok(RoutingDecision {
                account,
                folder_prefix: None,
                source: RoutingSource::Override,
            });
        }

        if let Some(group_id) = request.media_group_id {
            if let Some(decision) = self.try_group_default(group_id, request).await? {
                return Ok(decision);
            }
        }

        if let Some(decision) = self.try_rules(request).await? {
            return Ok(decision);
        }

        let account = self.accounts.get_default_active().await?.ok_or_else(|| {
            AppError::StorageNotFound("No active default storage account configured".to_string())
        })?;
        validate_account_limits(&account, request.media_type, request.size_bytes)?;
        tracing::debug!(account_id = %account.id, "Routed to default account");

        Ok(RoutingDecision {
            account,
            folder_prefix: None,
            source: RoutingSource::Fallback,
        })
    }

    async fn try_group_default(
        &self,
        group_id: Uuid,
        request: &RoutingRequest,
    ) -> Result<Option<RoutingDecision>, AppError> {
        let group = self
            .groups
            .get(group_id)
            .await?
            .ok_or_else(|| AppError::GroupNotFound(group_id.to_string()))?;

        let Some(account_id) = group.default_storage_account_id else {
            return Ok(None);
        };

        let Some(account) = self.accounts.get(account_id).await? else {
            tracing::warn!(
                group_id = %group_id,
                account_id = %account_id,
                "Group default storage account is missing, falling through"
            );
            return Ok(None);
        };

        match validate_account_limits(&account, request.media_type, request.size_bytes) {
            Ok(()) => {
                tracing::debug!(account_id = %account.id, group_id = %group_id, "Routed to group default");
                Ok(Some(RoutingDecision {
                    account,
                    folder_prefix: None,
                    source: RoutingSource::GroupDefault,
                }))
            }
            Err(e) => {
                tracing::debug!(account_id = %account.id, reason = %e, "Group default rejected");
                Ok(None)
            }
        }
    }

    async fn try_rules(
        &self,
        request: &RoutingRequest,
    ) -> Result<Option<RoutingDecision>, AppError> {
        let mut rules = self.rules.list_active().await?;
        // Stable sort keeps creation order among equal priorities.
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        for rule in rules.into_iter().filter(|r| r.is_active) {
            if !rule_matches(&rule, request) {
                continue;
            }

            let Some(account) = self.accounts.get(rule.storage_account_id).await? else {
                tracing::warn!(
                    rule_id = %rule.id,
                    account_id = %rule.storage_account_id,
                    "Routing rule targets a missing storage account, skipping"
                );
                continue;
            };

            if let Err(e) = validate_account_limits(&account, request.media_type, request.size_bytes)
            {
                tracing::debug!(rule_id = %rule.id, reason = %e, "Rule target rejected");
                continue;
            }

            tracing::debug!(rule_id = %rule.id, account_id = %account.id, "Routed by rule");
            return Ok(Some(RoutingDecision {
                account,
                folder_prefix: rule.folder_prefix.clone(),
                source: RoutingSource::Rule(rule.id),
            }));
        }

        Ok(None)
    }
}

/// Check that `account` may take an upload of this type and size.
pub fn validate_account_limits(
    account: &StorageAccount,
    media_type: MediaType,
    size_bytes: u64,
) -> Result<(), AppError> {
    if !account.is_usable() {
        return Err(AppError::StorageNotFound(format!(
            "Storage account {} is not active",
            account.id
        )));
    }

    if let Some(limit) = account.max_file_size_bytes() {
        if size_bytes > limit {
            return Err(AppError::FileTooLarge(format!(
                "File size {} bytes exceeds the {} MB limit of storage account '{}'",
                size_bytes,
                limit / (1024 * 1024),
                account.name
            )));
        }
    }

    if !account.accepts_media_type(media_type) {
        return Err(AppError::InvalidFileType(format!(
            "Storage account '{}' does not accept {} files",
            account.name, media_type
        )));
    }

    if let Some(ceiling) = provider_max_bytes(account.provider, media_type) {
        if size_bytes > ceiling {
            return Err(AppError::FileTooLarge(format!(
                "File size {} bytes exceeds the {} MB {} limit of {}",
                size_bytes,
                ceiling / (1024 * 1024),
                media_type,
                account.provider
            )));
        }
    }

    Ok(())
}

/// All conditions the rule sets must hold.
pub fn rule_matches(rule: &StorageRoutingRule, request: &RoutingRequest) -> bool {
    if let Some(group_id) = rule.media_group_id {
        if request.media_group_id != Some(group_id) {
            return false;
        }
    }

    if let Some(media_type) = rule.media_type {
        if media_type != request.media_type {
            return false;
        }
    }

    let size = i64::try_from(request.size_bytes).unwrap_or(i64::MAX);
    if rule.min_size_bytes.is_some_and(|min| size < min) {
        return false;
    }
    if rule.max_size_bytes.is_some_and(|max| size > max) {
        return false;
    }

    match rule.mime_pattern.as_deref().map(str::trim) {
        Some(pattern) if !pattern.is_empty() => mime_matches(pattern, &request.mime_type),
        _ => true,
    }
}

/// MIME pattern match: `*`, `*/*`, `type/*` or an exact type. Case-insensitive, parameters
/// ignored on both sides.
pub fn mime_matches(pattern: &str, mime_type: &str) -> bool {
    let pattern = normalize_mime_type(pattern);
    let mime_type = normalize_mime_type(mime_type);

    if pattern == "*" || pattern == "*/*" {
        return true;
    }

    if let Some(top_level) = pattern.strip_suffix("/*") {
        return mime_type
            .split_once('/')
            .is_some_and(|(ty, _)| ty == top_level);
    }

    pattern == mime_type
}

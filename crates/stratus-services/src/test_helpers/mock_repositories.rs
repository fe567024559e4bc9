//! In-memory implementations of the persistence traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use stratus_core::models::{Media, MediaFilter, MediaGroup, StorageAccount, StorageRoutingRule};
use stratus_core::AppError;
use stratus_db::{MediaGroupStore, MediaStore, RoutingRuleStore, StorageAccountStore, Stores};
use uuid::Uuid;

use crate::routing::RoutingEngine;

#[derive(Default)]
pub struct MockAccountStore {
    accounts: Mutex<HashMap<Uuid, StorageAccount>>,
}

impl MockAccountStore {
    pub fn insert(&self, account: StorageAccount) {
        self.accounts.lock().unwrap().insert(account.id, account);
    }

    /// Row regardless of soft deletion.
    pub fn raw(&self, id: Uuid) -> Option<StorageAccount> {
        self.accounts.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl StorageAccountStore for MockAccountStore {
    async fn create(&self, account: &StorageAccount) -> Result<StorageAccount, AppError> {
        self.insert(account.clone());
        Ok(account.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StorageAccount>, AppError> {
        Ok(self.raw(id).filter(|a| a.deleted_at.is_none()))
    }

    async fn update(&self, account: &StorageAccount) -> Result<StorageAccount, AppError> {
        let mut accounts = self.accounts.lock().unwrap();
        match accounts.get_mut(&account.id) {
            Some(existing) if existing.deleted_at.is_none() => {
                let mut updated = account.clone();
                updated.updated_at = Utc::now();
                *existing = updated.clone();
                Ok(updated)
            }
            _ => Err(AppError::StorageNotFound(account.id.to_string())),
        }
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut accounts = self.accounts.lock().unwrap();
        match accounts.get_mut(&id) {
            Some(account) if account.deleted_at.is_none() => {
                account.deleted_at = Some(Utc::now());
                account.is_active = false;
                account.is_default = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_default_active(&self) -> Result<Option<StorageAccount>, AppError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.is_default && a.is_usable())
            .max_by_key(|a| a.updated_at)
            .cloned())
    }

    async fn clear_default_except(&self, keep: Uuid) -> Result<u64, AppError> {
        let mut cleared = 0;
        for account in self.accounts.lock().unwrap().values_mut() {
            if account.is_default && account.id != keep {
                account.is_default = false;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<StorageAccount>, AppError> {
        let mut accounts: Vec<_> = self
            .accounts
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.deleted_at.is_none() && (include_inactive || a.is_active))
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }
}

#[derive(Default)]
pub struct MockRuleStore {
    rules: Mutex<Vec<StorageRoutingRule>>,
}

impl MockRuleStore {
    pub fn insert(&self, rule: StorageRoutingRule) {
        self.rules.lock().unwrap().push(rule);
    }

    pub fn count(&self) -> usize {
        self.rules.lock().unwrap().len()
    }
}

#[async_trait]
impl RoutingRuleStore for MockRuleStore {
    async fn list_active(&self) -> Result<Vec<StorageRoutingRule>, AppError> {
        let mut rules: Vec<_> = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect();
        rules.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(rules)
    }

    async fn create(&self, rule: &StorageRoutingRule) -> Result<StorageRoutingRule, AppError> {
        self.insert(rule.clone());
        Ok(rule.clone())
    }

    async fn update(&self, rule: &StorageRoutingRule) -> Result<StorageRoutingRule, AppError> {
        let mut rules = self.rules.lock().unwrap();
        let existing = rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or_else(|| AppError::InvalidInput(format!("Routing rule {} not found", rule.id)))?;
        *existing = rule.clone();
        Ok(rule.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut rules = self.rules.lock().unwrap();
        let before = rules.len();
        rules.retain(|r| r.id != id);
        Ok(rules.len() != before)
    }
}

#[derive(Default)]
pub struct MockGroupStore {
    groups: Mutex<HashMap<Uuid, MediaGroup>>,
}

impl MockGroupStore {
    pub fn insert(&self, group: MediaGroup) {
        self.groups.lock().unwrap().insert(group.id, group);
    }
}

#[async_trait]
impl MediaGroupStore for MockGroupStore {
    async fn get(&self, id: Uuid) -> Result<Option<MediaGroup>, AppError> {
        Ok(self
            .groups
            .lock()
            .unwrap()
            .get(&id)
            .filter(|g| g.deleted_at.is_none())
            .cloned())
    }

    async fn create(&self, group: &MediaGroup) -> Result<MediaGroup, AppError> {
        self.insert(group.clone());
        Ok(group.clone())
    }
}

#[derive(Default)]
pub struct MockMediaStore {
    media: Mutex<HashMap<Uuid, Media>>,
    download_counts: Mutex<HashMap<Uuid, i64>>,
    access_counts: Mutex<HashMap<Uuid, i64>>,
}

impl MockMediaStore {
    pub fn insert(&self, media: Media) {
        self.media.lock().unwrap().insert(media.id, media);
    }

    /// Row regardless of soft deletion.
    pub fn raw(&self, id: Uuid) -> Option<Media> {
        self.media.lock().unwrap().get(&id).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.media
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.deleted_at.is_none())
            .count()
    }

    pub fn download_count(&self, id: Uuid) -> i64 {
        self.download_counts
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    pub fn access_count(&self, id: Uuid) -> i64 {
        self.access_counts
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl MediaStore for MockMediaStore {
    async fn create(&self, media: &Media) -> Result<Media, AppError> {
        self.insert(media.clone());
        Ok(media.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Media>, AppError> {
        Ok(self.raw(id).filter(|m| m.deleted_at.is_none()))
    }

    async fn update(&self, media: &Media) -> Result<Media, AppError> {
        let mut all = self.media.lock().unwrap();
        match all.get_mut(&media.id) {
            Some(existing) if existing.deleted_at.is_none() => {
                let mut updated = media.clone();
                updated.updated_at = Utc::now();
                *existing = updated.clone();
                Ok(updated)
            }
            _ => Err(AppError::MediaNotFound(media.id.to_string())),
        }
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut all = self.media.lock().unwrap();
        match all.get_mut(&id) {
            Some(media) if media.deleted_at.is_none() => {
                media.deleted_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn exists_by_key(&self, account_id: Uuid, key: &str) -> Result<bool, AppError> {
        Ok(self.media.lock().unwrap().values().any(|m| {
            m.deleted_at.is_none() && m.storage_account_id == account_id && m.storage_key == key
        }))
    }

    async fn list(&self, filter: &MediaFilter) -> Result<Vec<Media>, AppError> {
        let filter = filter.clone().normalized();
        let mut matching: Vec<_> = self
            .media
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.deleted_at.is_none() && filter.matches(m))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn list_pending_older_than(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<(DateTime<Utc>, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Media>, AppError> {
        let mut pending: Vec<_> = self
            .media
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.deleted_at.is_none() && m.is_pending() && m.created_at < cutoff)
            .filter(|m| after.map_or(true, |cursor| (m.created_at, m.id) > cursor))
            .cloned()
            .collect();
        pending.sort_by_key(|m| (m.created_at, m.id));
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn list_by_account(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Media>, AppError> {
        let mut rows: Vec<_> = self
            .media
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.deleted_at.is_none() && m.storage_account_id == account_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn increment_download_count(&self, id: Uuid) -> Result<(), AppError> {
        *self.download_counts.lock().unwrap().entry(id).or_insert(0) += 1;
        Ok(())
    }

    async fn increment_access_count(&self, id: Uuid) -> Result<(), AppError> {
        *self.access_counts.lock().unwrap().entry(id).or_insert(0) += 1;
        Ok(())
    }
}

/// All four mock stores, shareable with the services as trait objects.
#[derive(Clone, Default)]
pub struct InMemoryStores {
    pub accounts: Arc<MockAccountStore>,
    pub rules: Arc<MockRuleStore>,
    pub groups: Arc<MockGroupStore>,
    pub media: Arc<MockMediaStore>,
}

impl InMemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stores(&self) -> Stores {
        Stores {
            accounts: self.accounts.clone(),
            rules: self.rules.clone(),
            groups: self.groups.clone(),
            media: self.media.clone(),
        }
    }

    pub fn routing_engine(&self) -> RoutingEngine {
        RoutingEngine::new(
            self.accounts.clone(),
            self.groups.clone(),
            self.rules.clone(),
        )
    }
}

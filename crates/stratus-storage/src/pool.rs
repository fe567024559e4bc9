//! Per-account adapter cache.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use stratus_core::models::StorageAccount;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::factory::AdapterBuilder;
use crate::{StorageAdapter, StorageResult};

struct PooledAdapter {
    adapter: Arc<dyn StorageAdapter>,
    /// `updated_at` of the account row the adapter was built from.
    built_from: DateTime<Utc>,
}

/// One live adapter per storage account.
///
/// The lock is held across construction so concurrent first requests for the same account
/// build exactly one adapter. A cached entry is rebuilt when the caller presents a row with a
/// newer `updated_at` (credentials rotated elsewhere).
pub struct AdapterPool {
    builder: Arc<dyn AdapterBuilder>,
    adapters: Mutex<HashMap<Uuid, PooledAdapter>>,
}

impl AdapterPool {
    pub fn new(builder: Arc<dyn AdapterBuilder>) -> Self {
        Self {
            builder,
            adapters: Mutex::new(HashMap::new()),
        }
    }

    #[tracing::instrument(skip(self, account), fields(account_id = %account.id, provider = %account.provider))]
    pub async fn get_adapter(
        &self,
        account: &StorageAccount,
    ) -> StorageResult<Arc<dyn StorageAdapter>> {
        let (adapter, replaced) = {
            let mut adapters = self.adapters.lock().await;

            match adapters.get(&account.id) {
                Some(entry) if entry.built_from >= account.updated_at => {
                    return Ok(entry.adapter.clone());
                }
                _ => {}
            }

            let adapter = self.builder.build(account).await?;
            let previous = adapters.insert(
                account.id,
                PooledAdapter {
                    adapter: adapter.clone(),
                    built_from: account.updated_at,
                },
            );
            (adapter, previous)
        };

        // Close the replaced adapter without holding the lock.
        if let Some(old) = replaced {
            tracing::info!("Rebuilt storage adapter for updated account");
            old.adapter.close().await;
        }

        Ok(adapter)
    }

    /// Drop the cached adapter for an account (credentials rotated or account deleted).
    pub async fn invalidate_adapter(&self, account_id: Uuid) {
        let removed = self.adapters.lock().await.remove(&account_id);
        if let Some(entry) = removed {
            entry.adapter.close().await;
            tracing::info!(account_id = %account_id, "Storage adapter invalidated");
        }
    }

    pub async fn close_all(&self) {
        let drained: Vec<_> = self.adapters.lock().await.drain().collect();
        let count = drained.len();
        for (_, entry) in drained {
            entry.adapter.close().await;
        }
        tracing::info!(closed = count, "Closed all storage adapters");
    }

    pub async fn len(&self) -> usize {
        self.adapters.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.adapters.lock().await.is_empty()
    }
}

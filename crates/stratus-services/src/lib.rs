//! Stratus Services Layer
//!
//! Orchestration on top of the storage adapters and the persistence traits: routing uploads
//! to a storage account, the signed-URL upload lifecycle, provider sync, account
//! administration, the best-effort side-effect queue and the pending upload reaper.
//!
//! [`StorageCore`] wires all of them together from a [`Config`], a set of [`Stores`] and the
//! credential [`Encryptor`].

pub mod accounts;
#[cfg(feature = "archive")]
pub mod archive;
pub mod reaper;
pub mod routing;
pub mod side_effects;
pub mod sync;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::Arc;
use stratus_core::{Config, Encryptor};
use stratus_db::Stores;
use stratus_storage::{AdapterBuilder, AdapterFactory, AdapterPool};

pub use accounts::{AccountDeletionReport, ConnectionTest, StorageAccountService};
#[cfg(feature = "archive")]
pub use archive::{create_zip_archive, ArchiveEntry};
pub use reaper::{PendingUploadReaper, ReapReport};
pub use routing::{RoutingDecision, RoutingEngine, RoutingSource};
pub use side_effects::{AuditEvent, AuditSink, SideEffect, SideEffectQueue, TracingAuditSink};
pub use sync::{SyncError, SyncOptions, SyncReconciler, SyncReport, SYNCED_TAG};
pub use upload::{MediaDownload, UploadOrchestrator, UploadSettings};

/// The assembled service graph. All services share one adapter pool and one side-effect queue.
pub struct StorageCore {
    pub pool: Arc<AdapterPool>,
    pub router: Arc<RoutingEngine>,
    pub uploads: Arc<UploadOrchestrator>,
    pub sync: Arc<SyncReconciler>,
    pub accounts: Arc<StorageAccountService>,
    pub reaper: Arc<PendingUploadReaper>,
    pub side_effects: SideEffectQueue,
}

impl StorageCore {
    /// Build against the real provider adapters. Must be called inside a Tokio runtime.
    pub fn new(
        config: &Config,
        stores: Stores,
        encryptor: Arc<Encryptor>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let builder = Arc::new(AdapterFactory::new(encryptor.clone()));
        Self::with_builder(config, stores, encryptor, builder, audit)
    }

    pub fn with_builder(
        config: &Config,
        stores: Stores,
        encryptor: Arc<Encryptor>,
        builder: Arc<dyn AdapterBuilder>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let pool = Arc::new(AdapterPool::new(builder.clone()));
        let side_effects =
            SideEffectQueue::start(config.side_effect_queue_size, stores.media.clone(), audit);

        let router = Arc::new(RoutingEngine::new(
            stores.accounts.clone(),
            stores.groups.clone(),
            stores.rules.clone(),
        ));
        let sync = Arc::new(SyncReconciler::new(stores.media.clone(), pool.clone()));
        let uploads = Arc::new(UploadOrchestrator::new(
            stores.media.clone(),
            stores.accounts.clone(),
            stores.groups.clone(),
            router.clone(),
            pool.clone(),
            side_effects.clone(),
            UploadSettings::from_config(config),
        ));
        let accounts = Arc::new(StorageAccountService::new(
            stores.accounts.clone(),
            stores.rules.clone(),
            stores.media.clone(),
            encryptor,
            builder,
            pool.clone(),
            sync.clone(),
            side_effects.clone(),
        ));
        let reaper = Arc::new(PendingUploadReaper::new(
            stores.media.clone(),
            stores.accounts.clone(),
            pool.clone(),
            config,
        ));

        tracing::info!(
            queue_capacity = config.side_effect_queue_size,
            "Storage core initialized"
        );

        Self {
            pool,
            router,
            uploads,
            sync,
            accounts,
            reaper,
            side_effects,
        }
    }

    /// Drain pending side effects, then close every cached adapter.
    pub async fn shutdown(&self) {
        self.side_effects.shutdown().await;
        self.pool.close_all().await;
        tracing::info!("Storage core shut down");
    }
}

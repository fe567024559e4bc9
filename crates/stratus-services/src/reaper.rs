//! Reconciles abandoned pending uploads.
//!
//! A record still pending after the TTL either has its object at the provider (the client
//! uploaded but never called complete), in which case it is completed from provider metadata,
//! or it doesn't, in which case the record is soft-deleted.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use stratus_core::mime::{classify_media_type, resolve_mime_type};
use stratus_core::models::Media;
use stratus_core::{AppError, Config};
use stratus_db::{MediaStore, StorageAccountStore};
use stratus_storage::{AdapterPool, StorageError};
use tokio::time::interval;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReapReport {
    pub completed: usize,
    pub purged: usize,
    pub errors: usize,
}

enum Outcome {
    Completed,
    Purged,
}

pub struct PendingUploadReaper {
    media: Arc<dyn MediaStore>,
    accounts: Arc<dyn StorageAccountStore>,
    pool: Arc<AdapterPool>,
    ttl: Duration,
    interval: Duration,
    batch_size: i64,
}

impl PendingUploadReaper {
    pub fn new(
        media: Arc<dyn MediaStore>,
        accounts: Arc<dyn StorageAccountStore>,
        pool: Arc<AdapterPool>,
        config: &Config,
    ) -> Self {
        Self {
            media,
            accounts,
            pool,
            ttl: config.pending_upload_ttl(),
            interval: config.pending_reap_interval(),
            batch_size: config.pending_reap_batch_size.max(1),
        }
    }

    /// Start the background reaper on the configured interval.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut reap_interval = interval(self.interval);

            loop {
                reap_interval.tick().await;

                tracing::info!("Starting scheduled reap of abandoned uploads");

                match self.reap_once().await {
                    Ok(report) => tracing::info!(
                        completed = report.completed,
                        purged = report.purged,
                        errors = report.errors,
                        "Pending upload reap completed"
                    ),
                    Err(e) => tracing::error!(error = %e, "Pending upload reap failed"),
                }
            }
        })
    }

    /// One pass over every pending record older than the TTL, `batch_size` rows per query.
    ///
    /// Pages follow a `(created_at, id)` cursor, so rows that keep failing are stepped over
    /// instead of being fetched again ahead of newer ones.
    #[tracing::instrument(skip(self), fields(ttl_secs = self.ttl.as_secs()))]
    pub async fn reap_once(&self) -> Result<ReapReport, AppError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| AppError::Internal(format!("Invalid pending upload TTL: {}", e)))?;
        let cutoff = chrono::Utc::now() - ttl;

        let mut report = ReapReport::default();
        let mut after = None;
        loop {
            let stale = self
                .media
                .list_pending_older_than(cutoff, after, self.batch_size)
                .await?;
            let full_page = stale.len() as i64 >= self.batch_size;
            after = stale.last().map(|m| (m.created_at, m.id));

            for media in stale {
                let media_id = media.id;
                match self.reconcile(media).await {
                    Ok(Outcome::Completed) => report.completed += 1,
                    Ok(Outcome::Purged) => report.purged += 1,
                    Err(e) => {
                        tracing::warn!(error = %e, media_id = %media_id, "Failed to reconcile pending upload");
                        report.errors += 1;
                    }
                }
            }

            if !full_page || after.is_none() {
                break;
            }
        }

        Ok(report)
    }

    async fn reconcile(&self, mut media: Media) -> Result<Outcome, AppError> {
        let Some(account) = self.accounts.get(media.storage_account_id).await? else {
            self.media.soft_delete(media.id).await?;
            tracing::info!(media_id = %media.id, "Purged pending upload of a deleted storage account");
            return Ok(Outcome::Purged);
        };

        let adapter = self.pool.get_adapter(&account).await?;
        match adapter.metadata(&media.storage_key).await {
            Ok(metadata) => {
                let size_bytes = i64::try_from(metadata.size)
                    .map_err(|_| AppError::Internal("Object size out of range".to_string()))?;
                if metadata.content_type.is_some() {
                    media.mime_type =
                        resolve_mime_type(metadata.content_type.as_deref(), &media.storage_key);
                    media.media_type = classify_media_type(&media.mime_type);
                }
                media.public_url = Some(adapter.public_url(&media.storage_key));
                media.mark_completed(size_bytes);
                self.media.update(&media).await?;
                tracing::info!(media_id = %media.id, size_bytes, "Completed abandoned upload from provider metadata");
                Ok(Outcome::Completed)
            }
            Err(StorageError::NotFound(_)) => {
                self.media.soft_delete(media.id).await?;
                tracing::info!(media_id = %media.id, "Purged abandoned pending upload");
                Ok(Outcome::Purged)
            }
            Err(e) => Err(e.into()),
        }
    }
}

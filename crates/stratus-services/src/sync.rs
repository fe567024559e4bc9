//! Import pre-existing provider objects into the media catalog.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use stratus_core::mime::{classify_media_type, resolve_mime_type};
use stratus_core::models::{Actor, Media, StorageAccount};
use stratus_core::AppError;
use stratus_db::MediaStore;
use stratus_storage::{AdapterPool, RemoteObject, StorageAdapter};
use tokio_util::sync::CancellationToken;

/// Tag applied to every record created by a sync.
pub const SYNCED_TAG: &str = "synced";

const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub prefix: Option<String>,
    pub page_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncError {
    pub key: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub added: usize,
    pub skipped: usize,
    pub errors: Vec<SyncError>,
    pub pages: usize,
    pub cancelled: bool,
}

pub struct SyncReconciler {
    media: Arc<dyn MediaStore>,
    pool: Arc<AdapterPool>,
}

impl SyncReconciler {
    pub fn new(media: Arc<dyn MediaStore>, pool: Arc<AdapterPool>) -> Self {
        Self { media, pool }
    }

    /// Walk the account's objects page by page and catalog the unknown ones.
    ///
    /// Per-object failures are collected in the report; a failed `list` aborts with
    /// `ListFailed`. Cancellation is honored between objects and interrupts an in-flight `list`.
    #[tracing::instrument(skip(self, account, actor, options, cancel), fields(account_id = %account.id, provider = %account.provider))]
    pub async fn sync_account(
        &self,
        account: &StorageAccount,
        actor: &Actor,
        options: SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, AppError> {
        let start = Instant::now();
        let adapter = self.pool.get_adapter(account).await?;
        let page_size = options.page_size.clamp(1, MAX_PAGE_SIZE);

        let mut report = SyncReport::default();
        let mut cursor: Option<String> = None;

        'pages: loop {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break 'pages;
                }
                page = adapter.list(options.prefix.as_deref(), page_size, cursor.as_deref()) => {
                    page.map_err(|e| AppError::ListFailed(e.to_string()))?
                }
            };
            report.pages += 1;

            for object in page.files {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'pages;
                }

                match self.import(account, actor, adapter.as_ref(), &object).await {
                    Ok(true) => report.added += 1,
                    Ok(false) => report.skipped += 1,
                    Err(e) => {
                        tracing::warn!(error = %e, key = %object.key, "Failed to import object");
                        report.errors.push(SyncError {
                            key: object.key.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        tracing::info!(
            added = report.added,
            skipped = report.skipped,
            errors = report.errors.len(),
            pages = report.pages,
            cancelled = report.cancelled,
            duration_ms = start.elapsed().as_millis() as u64,
            "Storage sync finished"
        );

        Ok(report)
    }

    /// Returns false when the key is already cataloged.
    async fn import(
        &self,
        account: &StorageAccount,
        actor: &Actor,
        adapter: &dyn StorageAdapter,
        object: &RemoteObject,
    ) -> Result<bool, AppError> {
        if self.media.exists_by_key(account.id, &object.key).await? {
            return Ok(false);
        }

        let mime_type = resolve_mime_type(object.content_type.as_deref(), &object.key);
        let media_type = classify_media_type(&mime_type);
        let filename = object
            .key
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(&object.key)
            .to_string();
        let size_bytes = i64::try_from(object.size)
            .map_err(|_| AppError::InvalidInput("Object size out of range".to_string()))?;

        let mut media = Media::pending(
            account.id,
            None,
            None,
            filename.clone(),
            filename,
            object.key.clone(),
            media_type,
            mime_type,
            actor.user_id,
        );
        media.tags = vec![SYNCED_TAG.to_string()];
        media.public_url = Some(adapter.public_url(&object.key));
        media.provider_metadata = json!({
            "etag": object.etag,
            "last_modified": object.last_modified,
        });
        media.mark_completed(size_bytes);

        self.media.create(&media).await?;
        Ok(true)
    }
}

//! Upload orchestration: initiate, complete, and the media lifecycle around it.
//!
//! Bytes never pass through here on the normal path: `initiate_upload` hands the client a
//! signed provider URL and `complete_upload` finalizes the catalog record afterwards.

use futures::StreamExt;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stratus_core::mime::{classify_media_type, normalize_mime_type};
use stratus_core::models::{
    Actor, BatchDeleteReport, CompleteUploadRequest, InitiateUploadRequest,
    InitiateUploadResponse, Media, MediaFilter, MoveMediaRequest, MoveMediaResponse,
    RoutingRequest, StorageAccount,
};
use stratus_core::{AppError, Config};
use stratus_db::{MediaGroupStore, MediaStore, StorageAccountStore};
use stratus_storage::keys::{generate_storage_key, sanitize_filename};
use stratus_storage::{AdapterPool, ByteStream, StorageError};
use uuid::Uuid;
use validator::Validate;

use crate::routing::{validate_account_limits, RoutingEngine};
use crate::side_effects::{AuditEvent, SideEffect, SideEffectQueue};

/// Concurrent provider calls per batch operation.
const BATCH_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub signed_upload_expiry: Duration,
    pub signed_download_expiry: Duration,
    pub max_batch_size: usize,
}

impl UploadSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            signed_upload_expiry: config.signed_upload_expiry(),
            signed_download_expiry: config.signed_download_expiry(),
            max_batch_size: config.max_batch_size,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A media body streamed from its provider.
pub struct MediaDownload {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub body: ByteStream,
}

pub struct UploadOrchestrator {
    media: Arc<dyn MediaStore>,
    accounts: Arc<dyn StorageAccountStore>,
    groups: Arc<dyn MediaGroupStore>,
    router: Arc<RoutingEngine>,
    pool: Arc<AdapterPool>,
    side_effects: SideEffectQueue,
    settings: UploadSettings,
}

impl UploadOrchestrator {
    pub fn new(
        media: Arc<dyn MediaStore>,
        accounts: Arc<dyn StorageAccountStore>,
        groups: Arc<dyn MediaGroupStore>,
        router: Arc<RoutingEngine>,
        pool: Arc<AdapterPool>,
        side_effects: SideEffectQueue,
        settings: UploadSettings,
    ) -> Self {
        Self {
            media,
            accounts,
            groups,
            router,
            pool,
            side_effects,
            settings,
        }
    }

    /// Route the upload, create a pending record and return signed upload instructions.
    #[tracing::instrument(skip(self, actor, request), fields(user_id = %actor.user_id, filename = %request.filename))]
    pub async fn initiate_upload(
        &self,
        actor: &Actor,
        request: InitiateUploadRequest,
    ) -> Result<InitiateUploadResponse, AppError> {
        request.validate()?;

        let mime_type = normalize_mime_type(&request.content_type);
        let media_type = classify_media_type(&mime_type);

        let decision = self
            .router
            .route(&RoutingRequest {
                media_type,
                mime_type: mime_type.clone(),
                size_bytes: request.size_bytes,
                storage_account_id: request.storage_account_id,
                media_group_id: request.media_group_id,
            })
            .await?;
        let account = decision.account;

        let storage_key = generate_storage_key(
            decision.folder_prefix.as_deref(),
            request.folder_path.as_deref(),
            &request.filename,
        )?;
        let filename = sanitize_filename(&request.filename)?;

        let adapter = self.pool.get_adapter(&account).await?;

        let mut media = Media::pending(
            account.id,
            request.media_group_id,
            request.folder_id,
            filename,
            request.filename.clone(),
            storage_key.clone(),
            media_type,
            mime_type.clone(),
            actor.user_id,
        );
        media.tags = request.tags;
        let media = self.media.create(&media).await?;

        let signed = match adapter
            .generate_signed_upload_url(
                &storage_key,
                &mime_type,
                self.settings.signed_upload_expiry,
                Some(request.size_bytes),
            )
            .await
        {
            Ok(signed) => signed,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    media_id = %media.id,
                    account_id = %account.id,
                    "Signed upload URL failed, discarding pending record"
                );
                if let Err(cleanup) = self.media.soft_delete(media.id).await {
                    tracing::error!(error = %cleanup, media_id = %media.id, "Failed to discard pending record");
                }
                return Err(AppError::SignedUrlFailed(e.to_string()));
            }
        };

        tracing::info!(
            media_id = %media.id,
            account_id = %account.id,
            provider = %account.provider,
            storage_key = %storage_key,
            source = ?decision.source,
            "Upload initiated"
        );

        Ok(InitiateUploadResponse {
            media_id: media.id,
            storage_account_id: account.id,
            storage_key,
            upload_url: signed.url,
            method: signed.method,
            headers: signed.headers,
            form_fields: signed.form_fields,
            expires_at: signed.expires_at,
        })
    }

    /// Finalize a pending record once the client reports the transfer finished.
    #[tracing::instrument(skip(self, actor, request), fields(user_id = %actor.user_id, media_id = %media_id))]
    pub async fn complete_upload(
        &self,
        actor: &Actor,
        media_id: Uuid,
        request: CompleteUploadRequest,
    ) -> Result<Media, AppError> {
        request.validate()?;

        let mut media = self.load_media(media_id).await?;
        authorize_modify(actor, &media)?;
        if !media.is_pending() {
            return Err(AppError::InvalidInput(format!(
                "Media {} is already completed",
                media_id
            )));
        }

        let account = self.load_account(media.storage_account_id).await?;
        let adapter = self.pool.get_adapter(&account).await?;

        let size_bytes = i64::try_from(request.size_bytes)
            .map_err(|_| AppError::InvalidInput("File size out of range".to_string()))?;

        if let Some(mime_type) = request.mime_type.as_deref().filter(|m| !m.trim().is_empty()) {
            media.mime_type = normalize_mime_type(mime_type);
            media.media_type = classify_media_type(&media.mime_type);
        }
        media.width = request.width;
        media.height = request.height;
        media.duration_secs = request.duration_secs;
        media.public_url = Some(
            request
                .public_url
                .unwrap_or_else(|| adapter.public_url(&media.storage_key)),
        );
        if request.thumbnail_url.is_some() {
            media.thumbnail_url = request.thumbnail_url;
        }
        if request.provider_id.is_some() {
            media.provider_id = request.provider_id;
        }
        media.mark_completed(size_bytes);

        let media = self.media.update(&media).await?;

        self.side_effects.audit(
            AuditEvent::new("media.upload_completed", actor)
                .media(media.id)
                .account(account.id)
                .details(json!({
                    "storage_key": media.storage_key,
                    "size_bytes": media.size_bytes,
                    "mime_type": media.mime_type,
                })),
        );

        tracing::info!(
            size_bytes = media.size_bytes,
            account_id = %account.id,
            "Upload completed"
        );

        Ok(media)
    }

    pub async fn get_media(&self, _actor: &Actor, media_id: Uuid) -> Result<Media, AppError> {
        let media = self.load_media(media_id).await?;
        self.side_effects
            .notify(SideEffect::AccessCounted { media_id: media.id });
        Ok(media)
    }

    pub async fn list_media(
        &self,
        _actor: &Actor,
        filter: MediaFilter,
    ) -> Result<Vec<Media>, AppError> {
        self.media.list(&filter.normalized()).await
    }

    /// Delete from the provider first; the record only disappears once the object is gone.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id, media_id = %media_id))]
    pub async fn delete_media(&self, actor: &Actor, media_id: Uuid) -> Result<(), AppError> {
        let media = self.load_media(media_id).await?;
        authorize_modify(actor, &media)?;

        match self.accounts.get(media.storage_account_id).await? {
            Some(account) => {
                let adapter = self.pool.get_adapter(&account).await?;
                match adapter.delete(&media.storage_key).await {
                    Ok(()) => {}
                    Err(StorageError::NotFound(_)) => {
                        tracing::debug!(storage_key = %media.storage_key, "Object already absent at provider");
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            storage_key = %media.storage_key,
                            account_id = %account.id,
                            "Provider delete failed, keeping record"
                        );
                        return Err(match e {
                            StorageError::DeleteFailed(msg) => AppError::DeleteFailed(msg),
                            other => AppError::DeleteFailed(other.to_string()),
                        });
                    }
                }
            }
            None => {
                tracing::warn!(
                    account_id = %media.storage_account_id,
                    "Storage account is gone, deleting record only"
                );
            }
        }

        self.media.soft_delete(media.id).await?;
        self.side_effects.audit(
            AuditEvent::new("media.deleted", actor)
                .media(media.id)
                .account(media.storage_account_id)
                .details(json!({ "storage_key": media.storage_key })),
        );
        tracing::info!("Media deleted");
        Ok(())
    }

    /// Delete many ids concurrently, reporting each outcome separately.
    pub async fn batch_delete(
        &self,
        actor: &Actor,
        ids: Vec<Uuid>,
    ) -> Result<BatchDeleteReport, AppError> {
        self.check_batch_size(ids.len())?;

        let outcomes: Vec<(Uuid, Result<(), AppError>)> = futures::stream::iter(ids)
            .map(|id| async move { (id, self.delete_media(actor, id).await) })
            .buffered(BATCH_CONCURRENCY)
            .collect()
            .await;

        let mut report = BatchDeleteReport::default();
        for (id, outcome) in outcomes {
            report.push(id, outcome.map_err(|e| e.to_string()));
        }

        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "Batch delete finished"
        );
        Ok(report)
    }

    /// Reassign folder and group. The provider object is not touched.
    pub async fn move_media(
        &self,
        actor: &Actor,
        media_id: Uuid,
        request: MoveMediaRequest,
    ) -> Result<MoveMediaResponse, AppError> {
        let mut media = self.load_media(media_id).await?;
        authorize_modify(actor, &media)?;

        if let Some(group_id) = request.media_group_id {
            self.groups
                .get(group_id)
                .await?
                .ok_or_else(|| AppError::GroupNotFound(group_id.to_string()))?;
            media.group_id = Some(group_id);
        }
        if let Some(folder_id) = request.folder_id {
            media.folder_id = Some(folder_id);
        }

        let media = self.media.update(&media).await?;
        tracing::info!(media_id = %media.id, "Media metadata moved");

        Ok(MoveMediaResponse {
            media_id: media.id,
            folder_id: media.folder_id,
            media_group_id: media.group_id,
            physical_relocation: false,
        })
    }

    /// Copy the object to another storage account and repoint the record.
    ///
    /// The source object is removed only after the record points at the new copy; failing to
    /// remove it leaves an orphan at the source, which is logged.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id, media_id = %media_id, target_account_id = %target_account_id))]
    pub async fn migrate_media(
        &self,
        actor: &Actor,
        media_id: Uuid,
        target_account_id: Uuid,
    ) -> Result<Media, AppError> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only administrators can migrate media between storage accounts".to_string(),
            ));
        }

        let mut media = self.load_media(media_id).await?;
        if media.is_pending() {
            return Err(AppError::InvalidInput(
                "Pending uploads cannot be migrated".to_string(),
            ));
        }
        if media.storage_account_id == target_account_id {
            return Err(AppError::InvalidInput(
                "Media already lives in the target storage account".to_string(),
            ));
        }

        let target = self.load_account(target_account_id).await?;
        validate_account_limits(&target, media.media_type, media.size_bytes.max(0) as u64)?;
        let source = self.load_account(media.storage_account_id).await?;

        let source_adapter = self.pool.get_adapter(&source).await?;
        let target_adapter = self.pool.get_adapter(&target).await?;

        let start = Instant::now();
        let body = source_adapter.download(&media.storage_key).await?;
        let metadata = HashMap::from([("media_id".to_string(), media.id.to_string())]);
        let uploaded = target_adapter
            .upload(
                body,
                &media.storage_key,
                &media.mime_type,
                Some(media.size_bytes.max(0) as u64),
                metadata,
            )
            .await?;

        let source_key = media.storage_key.clone();
        media.storage_account_id = target.id;
        media.storage_key = uploaded.key.clone();
        media.public_url = Some(uploaded.public_url);
        media.thumbnail_url = uploaded.thumbnail_url;
        media.provider_id = uploaded.provider_id;
        if let Some(etag) = uploaded.etag {
            media.provider_metadata = json!({ "etag": etag });
        }

        let media = match self.media.update(&media).await {
            Ok(media) => media,
            Err(e) => {
                if let Err(cleanup) = target_adapter.delete(&uploaded.key).await {
                    tracing::error!(error = %cleanup, key = %uploaded.key, "Failed to remove migrated copy");
                }
                return Err(e);
            }
        };

        if let Err(e) = source_adapter.delete(&source_key).await {
            tracing::warn!(
                error = %e,
                key = %source_key,
                account_id = %source.id,
                "Failed to delete source object after migration"
            );
        }

        self.side_effects.audit(
            AuditEvent::new("media.migrated", actor)
                .media(media.id)
                .account(target.id)
                .details(json!({ "from_account_id": source.id })),
        );
        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Media migrated"
        );

        Ok(media)
    }

    /// Stream the object back from its provider.
    pub async fn download(&self, _actor: &Actor, media_id: Uuid) -> Result<MediaDownload, AppError> {
        let media = self.load_media(media_id).await?;
        let account = self.load_account(media.storage_account_id).await?;
        let adapter = self.pool.get_adapter(&account).await?;
        let body = adapter.download(&media.storage_key).await?;

        self.side_effects
            .notify(SideEffect::DownloadCounted { media_id: media.id });

        Ok(MediaDownload {
            filename: media.original_filename,
            content_type: media.mime_type,
            size: media.size_bytes.max(0) as u64,
            body,
        })
    }

    /// Public URL for public accounts, otherwise a signed one.
    pub async fn download_url(
        &self,
        _actor: &Actor,
        media_id: Uuid,
        expires_in: Option<Duration>,
    ) -> Result<String, AppError> {
        let media = self.load_media(media_id).await?;
        let account = self.load_account(media.storage_account_id).await?;
        let adapter = self.pool.get_adapter(&account).await?;

        if account.is_public {
            return Ok(media
                .public_url
                .unwrap_or_else(|| adapter.public_url(&media.storage_key)));
        }

        let url = adapter
            .generate_signed_download_url(
                &media.storage_key,
                expires_in.unwrap_or(self.settings.signed_download_expiry),
            )
            .await?;
        Ok(url)
    }

    /// Bundle several media into one ZIP. Any missing media or object fails the whole call.
    #[cfg(feature = "archive")]
    pub async fn batch_download_zip(
        &self,
        actor: &Actor,
        ids: Vec<Uuid>,
    ) -> Result<Vec<u8>, AppError> {
        use crate::archive::{create_zip_archive, ArchiveEntry};
        use stratus_storage::collect_stream;

        self.check_batch_size(ids.len())?;

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            let download = self.download(actor, id).await?;
            let data = collect_stream(download.body).await?;
            entries.push(ArchiveEntry {
                media_id: id,
                filename: download.filename,
                data,
            });
        }

        let count = entries.len();
        let archive = create_zip_archive(entries)?;
        tracing::info!(files = count, size_bytes = archive.len(), "Batch ZIP created");
        Ok(archive)
    }

    fn check_batch_size(&self, len: usize) -> Result<(), AppError> {
        if len == 0 {
            return Err(AppError::InvalidInput("No media ids supplied".to_string()));
        }
        if len > self.settings.max_batch_size {
            return Err(AppError::InvalidInput(format!(
                "Batch of {} exceeds the maximum of {} ids",
                len, self.settings.max_batch_size
            )));
        }
        Ok(())
    }

    async fn load_media(&self, media_id: Uuid) -> Result<Media, AppError> {
        self.media
            .get(media_id)
            .await?
            .ok_or_else(|| AppError::MediaNotFound(media_id.to_string()))
    }

    async fn load_account(&self, account_id: Uuid) -> Result<StorageAccount, AppError> {
        self.accounts
            .get(account_id)
            .await?
            .ok_or_else(|| AppError::StorageNotFound(account_id.to_string()))
    }
}

fn authorize_modify(actor: &Actor, media: &Media) -> Result<(), AppError> {
    if actor.can_modify(media) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the uploader or an administrator can modify this media".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use crate::StorageCore;
    use stratus_core::models::MediaStatus;
    use stratus_core::StorageProvider;
    use stratus_storage::collect_stream;

    const MB: u64 = 1024 * 1024;

    struct Fixture {
        stores: InMemoryStores,
        builder: Arc<MockAdapterBuilder>,
        core: StorageCore,
        account: StorageAccount,
    }

    fn fixture() -> Fixture {
        let stores = InMemoryStores::new();
        let mut account = account(StorageProvider::S3, "primary");
        account.is_default = true;
        stores.accounts.insert(account.clone());
        let builder = Arc::new(MockAdapterBuilder::new());
        let core = StorageCore::with_builder(
            &test_config(),
            stores.stores(),
            test_encryptor(),
            builder.clone(),
            Arc::new(crate::TracingAuditSink),
        );
        Fixture {
            stores,
            builder,
            core,
            account,
        }
    }

    fn initiate(filename: &str, content_type: &str, size: u64) -> InitiateUploadRequest {
        InitiateUploadRequest {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            size_bytes: size,
            media_group_id: None,
            storage_account_id: None,
            folder_id: None,
            folder_path: None,
            tags: vec![],
        }
    }

    fn complete(size: u64) -> CompleteUploadRequest {
        CompleteUploadRequest {
            size_bytes: size,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn initiate_then_complete() {
        let f = fixture();
        let actor = Actor::member(Uuid::new_v4());

        let mut request = initiate("Holiday Photo.JPG", "image/jpeg", 2048);
        request.folder_path = Some("trips/2024".into());
        request.tags = vec!["beach".into()];
        let response = f.core.uploads.initiate_upload(&actor, request).await.unwrap();

        assert_eq!(response.storage_account_id, f.account.id);
        assert_eq!(response.method, "PUT");
        assert!(response.storage_key.starts_with("trips/2024/Holiday_Photo_"));
        assert!(response.storage_key.ends_with(".jpg"));

        let pending = f.stores.media.raw(response.media_id).unwrap();
        assert_eq!(pending.status, MediaStatus::Pending);
        assert_eq!(pending.size_bytes, 0);
        assert_eq!(pending.tags, vec!["beach".to_string()]);

        let media = f
            .core
            .uploads
            .complete_upload(&actor, response.media_id, complete(2048))
            .await
            .unwrap();
        assert_eq!(media.status, MediaStatus::Completed);
        assert_eq!(media.size_bytes, 2048);
        assert_eq!(
            media.public_url.as_deref(),
            Some(format!("https://memory.test/{}", response.storage_key).as_str())
        );

        let again = f
            .core
            .uploads
            .complete_upload(&actor, response.media_id, complete(2048))
            .await;
        assert!(matches!(again, Err(AppError::InvalidInput(_))));
        f.core.shutdown().await;
    }

    #[tokio::test]
    async fn complete_requires_uploader_or_admin() {
        let f = fixture();
        let uploader = Actor::member(Uuid::new_v4());
        let response = f
            .core
            .uploads
            .initiate_upload(&uploader, initiate("a.png", "image/png", 10))
            .await
            .unwrap();

        let stranger = Actor::member(Uuid::new_v4());
        let err = f
            .core
            .uploads
            .complete_upload(&stranger, response.media_id, complete(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let admin = Actor::admin(Uuid::new_v4());
        let mut request = complete(10);
        request.public_url = Some("https://cdn.example.com/a.png".into());
        let media = f
            .core
            .uploads
            .complete_upload(&admin, response.media_id, request)
            .await
            .unwrap();
        assert_eq!(media.public_url.as_deref(), Some("https://cdn.example.com/a.png"));

        let missing = f
            .core
            .uploads
            .complete_upload(&admin, Uuid::new_v4(), complete(10))
            .await;
        assert!(matches!(missing, Err(AppError::MediaNotFound(_))));
    }

    #[tokio::test]
    async fn signed_url_failure_discards_pending_record() {
        let f = fixture();
        f.builder.storage(&f.account).set_fail_signed_upload(true);
        let actor = Actor::member(Uuid::new_v4());

        let err = f
            .core
            .uploads
            .initiate_upload(&actor, initiate("a.png", "image/png", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SignedUrlFailed(_)));
        assert_eq!(f.stores.media.live_count(), 0);
    }

    #[tokio::test]
    async fn invalid_request_is_rejected() {
        let f = fixture();
        let actor = Actor::member(Uuid::new_v4());
        let err = f
            .core
            .uploads
            .initiate_upload(&actor, initiate("", "image/png", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = f
            .core
            .uploads
            .initiate_upload(&actor, initiate("a.png", "image/png", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn override_to_cloudinary_rejects_large_jpeg() {
        let f = fixture();
        let cdn = account(StorageProvider::Cloudinary, "cdn");
        f.stores.accounts.insert(cdn.clone());
        let actor = Actor::member(Uuid::new_v4());

        let mut request = initiate("big.jpg", "image/jpeg", 15 * MB);
        request.storage_account_id = Some(cdn.id);
        let err = f
            .core
            .uploads
            .initiate_upload(&actor, request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FileTooLarge(_)));
        assert_eq!(f.stores.media.live_count(), 0);
    }

    #[tokio::test]
    async fn delete_with_failing_provider_keeps_record() {
        let f = fixture();
        let actor = Actor::member(Uuid::new_v4());
        let media = completed_media(f.account.id, "photos/a.jpg", actor.user_id);
        f.stores.media.insert(media.clone());
        let storage = f.builder.storage(&f.account);
        storage.put("photos/a.jpg", "data", Some("image/jpeg"));
        storage.set_fail_delete(true);

        let err = f.core.uploads.delete_media(&actor, media.id).await.unwrap_err();
        assert!(matches!(err, AppError::DeleteFailed(_)), "{err:?}");
        assert!(f.stores.media.raw(media.id).unwrap().deleted_at.is_none());

        storage.set_fail_delete(false);
        f.core.uploads.delete_media(&actor, media.id).await.unwrap();
        assert!(f.stores.media.raw(media.id).unwrap().deleted_at.is_some());
        assert!(!storage.contains("photos/a.jpg"));
    }

    #[tokio::test]
    async fn delete_treats_missing_object_as_deleted() {
        let f = fixture();
        let actor = Actor::admin(Uuid::new_v4());
        let media = completed_media(f.account.id, "gone.jpg", Uuid::new_v4());
        f.stores.media.insert(media.clone());

        f.core.uploads.delete_media(&actor, media.id).await.unwrap();
        assert!(f.stores.media.raw(media.id).unwrap().deleted_at.is_some());
    }

    #[tokio::test]
    async fn batch_delete_reports_per_item() {
        let f = fixture();
        let actor = Actor::member(Uuid::new_v4());
        let storage = f.builder.storage(&f.account);

        let mine = completed_media(f.account.id, "a.jpg", actor.user_id);
        storage.put("a.jpg", "a", None);
        let theirs = completed_media(f.account.id, "b.jpg", Uuid::new_v4());
        storage.put("b.jpg", "b", None);
        f.stores.media.insert(mine.clone());
        f.stores.media.insert(theirs.clone());
        let unknown = Uuid::new_v4();

        let report = f
            .core
            .uploads
            .batch_delete(&actor, vec![mine.id, theirs.id, unknown])
            .await
            .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.results[0].id, mine.id);
        assert!(report.results[0].error.is_none());
        assert!(report.results[1].error.as_deref().unwrap().contains("Forbidden"));
        assert!(report.results[2].error.as_deref().unwrap().contains("not found"));
        assert!(f.stores.media.raw(mine.id).unwrap().deleted_at.is_some());
        assert!(storage.contains("b.jpg"));
    }

    #[tokio::test]
    async fn batch_size_is_bounded() {
        let f = fixture();
        let actor = Actor::admin(Uuid::new_v4());
        assert!(matches!(
            f.core.uploads.batch_delete(&actor, vec![]).await,
            Err(AppError::InvalidInput(_))
        ));
        let ids = (0..51).map(|_| Uuid::new_v4()).collect();
        assert!(matches!(
            f.core.uploads.batch_delete(&actor, ids).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn move_is_metadata_only() {
        let f = fixture();
        let actor = Actor::member(Uuid::new_v4());
        let media = completed_media(f.account.id, "a.jpg", actor.user_id);
        f.stores.media.insert(media.clone());
        let g = group(None);
        f.stores.groups.insert(g.clone());
        let folder = Uuid::new_v4();

        let response = f
            .core
            .uploads
            .move_media(
                &actor,
                media.id,
                MoveMediaRequest {
                    folder_id: Some(folder),
                    media_group_id: Some(g.id),
                },
            )
            .await
            .unwrap();
        assert!(!response.physical_relocation);
        assert_eq!(response.folder_id, Some(folder));

        let stored = f.stores.media.raw(media.id).unwrap();
        assert_eq!(stored.group_id, Some(g.id));
        assert_eq!(stored.storage_key, "a.jpg");

        let err = f
            .core
            .uploads
            .move_media(
                &actor,
                media.id,
                MoveMediaRequest {
                    folder_id: None,
                    media_group_id: Some(Uuid::new_v4()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GroupNotFound(_)));
    }

    #[tokio::test]
    async fn migrate_copies_then_removes_source() {
        let f = fixture();
        let target = account(StorageProvider::R2, "archive");
        f.stores.accounts.insert(target.clone());
        let owner = Uuid::new_v4();
        let media = completed_media(f.account.id, "a.jpg", owner);
        f.stores.media.insert(media.clone());
        f.builder.storage(&f.account).put("a.jpg", "pixels", Some("image/jpeg"));

        let member = Actor::member(owner);
        assert!(matches!(
            f.core.uploads.migrate_media(&member, media.id, target.id).await,
            Err(AppError::Forbidden(_))
        ));

        let admin = Actor::admin(Uuid::new_v4());
        let migrated = f
            .core
            .uploads
            .migrate_media(&admin, media.id, target.id)
            .await
            .unwrap();
        assert_eq!(migrated.storage_account_id, target.id);
        assert!(f.builder.storage(&target).contains("a.jpg"));
        assert!(!f.builder.storage(&f.account).contains("a.jpg"));
    }

    #[tokio::test]
    async fn download_and_counters() {
        let f = fixture();
        let actor = Actor::member(Uuid::new_v4());
        let mut media = completed_media(f.account.id, "docs/report.pdf", actor.user_id);
        media.original_filename = "Report.pdf".into();
        f.stores.media.insert(media.clone());
        f.builder
            .storage(&f.account)
            .put("docs/report.pdf", "%PDF", Some("application/pdf"));

        let download = f.core.uploads.download(&actor, media.id).await.unwrap();
        assert_eq!(download.filename, "Report.pdf");
        assert_eq!(collect_stream(download.body).await.unwrap().as_ref(), b"%PDF");

        f.core.uploads.get_media(&actor, media.id).await.unwrap();
        f.core.shutdown().await;
        assert_eq!(f.stores.media.download_count(media.id), 1);
        assert_eq!(f.stores.media.access_count(media.id), 1);
    }

    #[tokio::test]
    async fn download_of_missing_object_is_file_not_found() {
        let f = fixture();
        let actor = Actor::member(Uuid::new_v4());
        let media = completed_media(f.account.id, "missing.jpg", actor.user_id);
        f.stores.media.insert(media.clone());

        let err = f.core.uploads.download(&actor, media.id).await.err().unwrap();
        assert!(matches!(err, AppError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn download_url_public_vs_private() {
        let f = fixture();
        let actor = Actor::member(Uuid::new_v4());
        let media = completed_media(f.account.id, "a.jpg", actor.user_id);
        f.stores.media.insert(media.clone());

        let url = f.core.uploads.download_url(&actor, media.id, None).await.unwrap();
        assert_eq!(url, "https://memory.test/a.jpg");

        let mut private = account(StorageProvider::B2, "private");
        private.is_public = false;
        f.stores.accounts.insert(private.clone());
        let secret = completed_media(private.id, "b.jpg", actor.user_id);
        f.stores.media.insert(secret.clone());

        let url = f
            .core
            .uploads
            .download_url(&actor, secret.id, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(url, "https://memory.test/b.jpg?expires=60");
    }

    #[cfg(feature = "archive")]
    #[tokio::test]
    async fn batch_zip_bundles_files() {
        let f = fixture();
        let actor = Actor::member(Uuid::new_v4());
        let storage = f.builder.storage(&f.account);
        let mut ids = Vec::new();
        for key in ["x/cat.jpg", "y/cat.jpg"] {
            let media = completed_media(f.account.id, key, actor.user_id);
            storage.put(key, "meow", Some("image/jpeg"));
            ids.push(media.id);
            f.stores.media.insert(media);
        }

        let bytes = f.core.uploads.batch_download_zip(&actor, ids).await.unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[tokio::test]
    async fn list_media_filters_by_account() {
        let f = fixture();
        let actor = Actor::member(Uuid::new_v4());
        let other = account(StorageProvider::R2, "other");
        f.stores.accounts.insert(other.clone());
        f.stores
            .media
            .insert(completed_media(f.account.id, "a.jpg", actor.user_id));
        f.stores
            .media
            .insert(completed_media(other.id, "b.jpg", actor.user_id));

        let listed = f
            .core
            .uploads
            .list_media(
                &actor,
                MediaFilter {
                    storage_account_id: Some(other.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].storage_key, "b.jpg");
    }
}

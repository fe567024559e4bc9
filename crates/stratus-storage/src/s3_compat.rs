//! Shared engine for S3-protocol providers (AWS S3, Cloudflare R2, Backblaze B2).
//!
//! Built on `object_store`'s `AmazonS3`. The provider modules only differ in how they turn
//! credentials into an endpoint, region and public URL base.

use async_trait::async_trait;
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, GetOptions, ObjectMeta, ObjectStore, ObjectStoreExt, PutOptions,
    PutPayload, Result as ObjectResult,
};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use stratus_core::StorageProvider;

use crate::keys::{encode_key_for_url, validate_key};
use crate::traits::{
    collect_stream, ByteStream, ListPage, ObjectMetadata, RemoteObject, SignedUpload,
    StorageAdapter, StorageError, StorageResult, UploadedObject,
};

/// Resolved connection settings for one bucket.
#[derive(Clone)]
pub struct S3CompatConfig {
    pub provider: StorageProvider,
    pub bucket: String,
    pub region: String,
    /// Custom endpoint; `None` means AWS.
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Prefix for public URLs, without trailing slash.
    pub public_url_base: String,
}

impl std::fmt::Debug for S3CompatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3CompatConfig")
            .field("provider", &self.provider)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("public_url_base", &self.public_url_base)
            .finish_non_exhaustive()
    }
}

/// S3-protocol adapter.
pub struct S3CompatAdapter {
    store: AmazonS3,
    provider: StorageProvider,
    bucket: String,
    public_url_base: String,
    closed: AtomicBool,
}

impl S3CompatAdapter {
    pub fn new(config: S3CompatConfig) -> StorageResult<Self> {
        if config.bucket.trim().is_empty() {
            return Err(StorageError::InvalidCredentials(
                "bucket_name is required".to_string(),
            ));
        }

        let mut builder = AmazonS3Builder::new()
            .with_access_key_id(config.access_key_id.clone())
            .with_secret_access_key(config.secret_access_key.clone())
            .with_region(config.region.clone())
            .with_bucket_name(config.bucket.clone());

        if let Some(ref endpoint) = config.endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http)
                .with_virtual_hosted_style_request(false);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        tracing::debug!(
            provider = %config.provider,
            bucket = %config.bucket,
            region = %config.region,
            "S3-compatible adapter created"
        );

        Ok(Self {
            store,
            provider: config.provider,
            bucket: config.bucket,
            public_url_base: config.public_url_base.trim_end_matches('/').to_string(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn location(key: &str) -> StorageResult<Path> {
        validate_key(key)?;
        Ok(Path::from(key.to_string()))
    }

    async fn head(&self, key: &str) -> StorageResult<(ObjectMeta, Attributes)> {
        let location = Self::location(key)?;
        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        let result: ObjectResult<_> = self.store.get_opts(&location, options).await;
        match result {
            Ok(result) => Ok((result.meta, result.attributes)),
            Err(ObjectStoreError::NotFound { .. }) => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn remote_object(meta: ObjectMeta) -> RemoteObject {
        RemoteObject {
            key: meta.location.to_string(),
            size: meta.size as u64,
            // S3 listings carry no content type; callers fall back to the key extension.
            content_type: None,
            last_modified: Some(meta.last_modified),
            etag: meta.e_tag,
        }
    }
}

#[async_trait]
impl StorageAdapter for S3CompatAdapter {
    fn provider(&self) -> StorageProvider {
        self.provider
    }

    async fn upload(
        &self,
        body: ByteStream,
        key: &str,
        content_type: &str,
        _size: Option<u64>,
        metadata: HashMap<String, String>,
    ) -> StorageResult<UploadedObject> {
        let location = Self::location(key)?;
        let start = Instant::now();

        // Single PUT; bodies are buffered in memory.
        let bytes = collect_stream(body)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        let size = bytes.len() as u64;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        for (name, value) in metadata {
            attributes.insert(Attribute::Metadata(Cow::Owned(name)), value.into());
        }
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        let result: ObjectResult<_> = self
            .store
            .put_opts(&location, PutPayload::from(bytes), options)
            .await;

        let put = result.map_err(|e| {
            tracing::error!(
                error = %e,
                provider = %self.provider,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            provider = %self.provider,
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload successful"
        );

        Ok(UploadedObject {
            key: key.to_string(),
            public_url: self.public_url(key),
            thumbnail_url: None,
            provider_id: None,
            etag: put.e_tag,
            size: Some(size),
        })
    }

    async fn generate_signed_upload_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
        _max_size: Option<u64>,
    ) -> StorageResult<SignedUpload> {
        let location = Self::location(key)?;
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::PUT, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| StorageError::SignedUrlFailed(e.to_string()))?
            .to_string();

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());

        Ok(SignedUpload {
            url,
            method: "PUT".to_string(),
            headers,
            form_fields: HashMap::new(),
            expires_at: Utc::now()
                + chrono::Duration::from_std(expires_in).unwrap_or(chrono::Duration::zero()),
        })
    }

    async fn download(&self, key: &str) -> StorageResult<ByteStream> {
        let start = Instant::now();
        let location = Self::location(key)?;

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    provider = %self.provider,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bucket = self.bucket.clone();
        let key = key.to_string();

        let stream = result.into_stream().map(move |res| match res {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    "Stream download error"
                );
                Err(StorageError::DownloadFailed(e.to_string()))
            }
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let start = Instant::now();
        let location = Self::location(key)?;

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) => {}
            Err(ObjectStoreError::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    provider = %self.provider,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            provider = %self.provider,
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Delete successful"
        );

        Ok(())
    }

    async fn move_object(&self, src_key: &str, dest_key: &str) -> StorageResult<()> {
        let start = Instant::now();
        let from = Self::location(src_key)?;
        let to = Self::location(dest_key)?;

        let copy_result: ObjectResult<_> = self.store.copy(&from, &to).await;
        copy_result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(src_key.to_string()),
            other => StorageError::MoveFailed(other.to_string()),
        })?;

        let delete_result: ObjectResult<_> = self.store.delete(&from).await;
        if let Err(e) = delete_result {
            tracing::warn!(
                error = %e,
                src_key = %src_key,
                dest_key = %dest_key,
                "Copied object but failed to delete source"
            );
            return Err(StorageError::MoveFailed(format!(
                "copied to {} but source delete failed: {}",
                dest_key, e
            )));
        }

        tracing::info!(
            provider = %self.provider,
            src_key = %src_key,
            dest_key = %dest_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Move successful"
        );

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url_base, encode_key_for_url(key))
    }

    async fn generate_signed_download_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let location = Self::location(key)?;
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| StorageError::SignedUrlFailed(e.to_string()))?
            .to_string();

        Ok(url)
    }

    async fn list(
        &self,
        prefix: Option<&str>,
        limit: usize,
        cursor: Option<&str>,
    ) -> StorageResult<ListPage> {
        let limit = limit.max(1);
        let prefix = prefix
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(|p| Path::from(p.to_string()));

        let mut stream = match cursor {
            Some(cursor) => {
                let offset = Path::from(cursor.to_string());
                self.store.list_with_offset(prefix.as_ref(), &offset)
            }
            None => self.store.list(prefix.as_ref()),
        };

        // One extra entry tells us whether another page exists.
        let mut files = Vec::with_capacity(limit + 1);
        while files.len() <= limit {
            match stream.try_next().await {
                Ok(Some(meta)) => files.push(Self::remote_object(meta)),
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        provider = %self.provider,
                        bucket = %self.bucket,
                        "List failed"
                    );
                    return Err(StorageError::ListFailed(e.to_string()));
                }
            }
        }

        let has_more = files.len() > limit;
        files.truncate(limit);
        let next_cursor = if has_more {
            files.last().map(|f| f.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            files,
            next_cursor,
            has_more,
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn metadata(&self, key: &str) -> StorageResult<ObjectMetadata> {
        let (meta, attributes) = self.head(key).await?;

        let mut content_type = None;
        let mut custom = HashMap::new();
        for (attribute, value) in attributes.iter() {
            match attribute {
                Attribute::ContentType => content_type = Some(value.to_string()),
                Attribute::Metadata(name) => {
                    custom.insert(name.to_string(), value.to_string());
                }
                _ => {}
            }
        }

        Ok(ObjectMetadata {
            size: meta.size as u64,
            content_type,
            last_modified: Some(meta.last_modified),
            etag: meta.e_tag,
            custom,
        })
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(provider = %self.provider, bucket = %self.bucket, "Adapter closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(public_url_base: &str) -> S3CompatConfig {
        S3CompatConfig {
            provider: StorageProvider::S3,
            bucket: "media".into(),
            region: "us-east-1".into(),
            endpoint: Some("http://localhost:9000".into()),
            access_key_id: "minio".into(),
            secret_access_key: "minio-secret".into(),
            public_url_base: public_url_base.into(),
        }
    }

    #[test]
    fn public_url_is_templated() {
        let adapter = S3CompatAdapter::new(config("https://cdn.example.com/")).unwrap();
        assert_eq!(
            adapter.public_url("images/cat one.jpg"),
            "https://cdn.example.com/images/cat%20one.jpg"
        );
    }

    #[test]
    fn empty_bucket_is_rejected() {
        let mut cfg = config("https://cdn.example.com");
        cfg.bucket = " ".into();
        assert!(matches!(
            S3CompatAdapter::new(cfg),
            Err(StorageError::InvalidCredentials(_))
        ));
    }

    #[tokio::test]
    async fn signed_urls_are_generated_locally() {
        let adapter = S3CompatAdapter::new(config("https://cdn.example.com")).unwrap();

        let upload = adapter
            .generate_signed_upload_url("a/b.png", "image/png", Duration::from_secs(900), None)
            .await
            .unwrap();
        assert_eq!(upload.method, "PUT");
        assert!(upload.url.contains("X-Amz-Signature"));
        assert_eq!(upload.headers.get("Content-Type").unwrap(), "image/png");
        assert!(upload.expires_at > Utc::now());

        let download = adapter
            .generate_signed_download_url("a/b.png", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(download.starts_with("http://localhost:9000/media/a/b.png"));
    }

    #[tokio::test]
    async fn invalid_keys_never_reach_the_provider() {
        let adapter = S3CompatAdapter::new(config("https://cdn.example.com")).unwrap();
        assert!(matches!(
            adapter.delete("../escape").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let adapter = S3CompatAdapter::new(config("https://cdn.example.com")).unwrap();
        adapter.close().await;
        adapter.close().await;
        assert!(adapter.is_closed());
    }
}

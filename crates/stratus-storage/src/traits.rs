//! Storage adapter contract
//!
//! Every provider (S3, R2, B2, Cloudinary) implements [`StorageAdapter`]. Callers only ever see
//! storage keys; provider-specific identifiers stay inside the adapters.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;
use stratus_core::{AppError, StorageProvider};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Move failed: {0}")]
    MoveFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("Signed URL generation failed: {0}")]
    SignedUrlFailed(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::FileNotFound(key),
            StorageError::UploadFailed(msg) => AppError::UploadFailed(msg),
            StorageError::DownloadFailed(msg) => AppError::DownloadFailed(msg),
            StorageError::DeleteFailed(msg) => AppError::DeleteFailed(msg),
            StorageError::MoveFailed(msg) => AppError::MoveFailed(msg),
            StorageError::ListFailed(msg) => AppError::ListFailed(msg),
            StorageError::SignedUrlFailed(msg) => AppError::SignedUrlFailed(msg),
            StorageError::InvalidCredentials(msg) => AppError::InvalidCredentials(msg),
            StorageError::UnsupportedProvider(p) => AppError::UnsupportedProvider(p),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            err @ StorageError::FileTooLarge { .. } => AppError::FileTooLarge(err.to_string()),
            StorageError::ConnectionFailed(msg) => AppError::ConnectionFailed(msg),
            StorageError::BackendError(msg) | StorageError::ConfigError(msg) => {
                AppError::Internal(msg)
            }
        }
    }
}

/// Chunked object body, used for both uploads and downloads.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Wrap in-memory bytes as a [`ByteStream`].
pub fn bytes_stream(data: impl Into<Bytes>) -> ByteStream {
    let data: Bytes = data.into();
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Drain a [`ByteStream`] into one buffer.
pub async fn collect_stream(mut body: ByteStream) -> StorageResult<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}

/// Result of a server-side upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedObject {
    pub key: String,
    pub public_url: String,
    pub thumbnail_url: Option<String>,
    pub provider_id: Option<String>,
    pub etag: Option<String>,
    pub size: Option<u64>,
}

/// Instructions for a direct client-to-provider upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignedUpload {
    pub url: String,
    /// `PUT` for the S3 family, `POST` (multipart form) for Cloudinary.
    pub method: String,
    pub headers: HashMap<String, String>,
    pub form_fields: HashMap<String, String>,
    pub expires_at: DateTime<Utc>,
}

/// One object as reported by a provider listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
    /// Whatever the provider reports: a MIME type, a short format code, or nothing.
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// One page of a listing. `next_cursor` is opaque to callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListPage {
    pub files: Vec<RemoteObject>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectMetadata {
    pub size: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub custom: HashMap<String, String>,
}

/// Uniform operations over one configured provider account.
///
/// Keys are relative object paths (`uploads/photos/cat_1a2b3c4d.jpg`): no leading `/` and no
/// `..` segments. Adapters are shared behind `Arc` by the adapter pool and must be safe to call
/// concurrently.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    fn provider(&self) -> StorageProvider;

    /// Server-side upload of a body to `key`.
    async fn upload(
        &self,
        body: ByteStream,
        key: &str,
        content_type: &str,
        size: Option<u64>,
        metadata: HashMap<String, String>,
    ) -> StorageResult<UploadedObject>;

    /// Presigned instructions the client can use to upload directly.
    async fn generate_signed_upload_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
        max_size: Option<u64>,
    ) -> StorageResult<SignedUpload>;

    /// Stream an object. Absent objects are `NotFound`.
    async fn download(&self, key: &str) -> StorageResult<ByteStream>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Rename; copy then delete where the provider has no native rename.
    async fn move_object(&self, src_key: &str, dest_key: &str) -> StorageResult<()>;

    /// Public delivery URL. Pure string templating, no network.
    fn public_url(&self, key: &str) -> String;

    async fn generate_signed_download_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    async fn list(
        &self,
        prefix: Option<&str>,
        limit: usize,
        cursor: Option<&str>,
    ) -> StorageResult<ListPage>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    async fn metadata(&self, key: &str) -> StorageResult<ObjectMetadata>;

    /// Release provider resources. Safe to call more than once.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collects_chunks_in_order() {
        let chunks = vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ];
        let body: ByteStream = Box::pin(futures::stream::iter(chunks));
        assert_eq!(collect_stream(body).await.unwrap(), Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn collect_propagates_errors() {
        let chunks = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(StorageError::DownloadFailed("reset".into())),
        ];
        let body: ByteStream = Box::pin(futures::stream::iter(chunks));
        assert!(matches!(
            collect_stream(body).await,
            Err(StorageError::DownloadFailed(_))
        ));
    }

    #[test]
    fn maps_into_app_errors() {
        assert!(matches!(
            AppError::from(StorageError::NotFound("a/b.jpg".into())),
            AppError::FileNotFound(_)
        ));
        assert!(matches!(
            AppError::from(StorageError::FileTooLarge {
                size: 20,
                limit: 10
            }),
            AppError::FileTooLarge(_)
        ));
        assert!(matches!(
            AppError::from(StorageError::InvalidCredentials("bad".into())),
            AppError::InvalidCredentials(_)
        ));
    }
}

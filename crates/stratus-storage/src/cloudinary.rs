//! Cloudinary adapter (REST API over reqwest).
//!
//! Storage keys are mapped to Cloudinary's `(resource_type, public_id)` pairs internally:
//! image extensions become `image` assets and video/audio extensions become `video` assets,
//! both with the extension stripped from the public id; everything else is a `raw` asset
//! that keeps its extension. Callers never see public ids or resource types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use stratus_core::models::MediaType;
use stratus_core::StorageProvider;
use zeroize::Zeroizing;

use crate::credentials::{AccountOverrides, CloudinaryCredentials};
use crate::keys::{encode_key_for_url, key_extension, validate_key};
use crate::limits::provider_max_bytes;
use crate::traits::{
    collect_stream, ByteStream, ListPage, ObjectMetadata, RemoteObject, SignedUpload,
    StorageAdapter, StorageError, StorageResult, UploadedObject,
};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const DELIVERY_BASE: &str = "https://res.cloudinary.com";
const SIGNATURE_ALGORITHM: &str = "sha256";
const MAX_SEARCH_RESULTS: usize = 500;
/// Context entry recording the exact storage key an asset was uploaded under.
const KEY_CONTEXT_FIELD: &str = "stratus_key";

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "avif", "bmp", "tif", "tiff", "ico", "svg", "heic",
    "heif",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "webm", "mkv", "avi", "m4v", "flv", "wmv", "ogv", "mp3", "wav", "ogg", "flac",
    "aac", "m4a",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Image,
    Video,
    Raw,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Video => "video",
            ResourceType::Raw => "raw",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "image" => ResourceType::Image,
            "video" => ResourceType::Video,
            _ => ResourceType::Raw,
        }
    }

    /// Media type used for the provider ceiling.
    fn ceiling_media_type(&self) -> MediaType {
        match self {
            ResourceType::Image => MediaType::Image,
            ResourceType::Video => MediaType::Video,
            ResourceType::Raw => MediaType::Other,
        }
    }
}

/// Internal identity of a stored key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub resource_type: ResourceType,
    pub public_id: String,
    pub format: Option<String>,
}

impl AssetRef {
    pub fn from_key(key: &str) -> Self {
        let extension = key_extension(key);
        let resource_type = match extension.as_deref() {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => ResourceType::Image,
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext) => ResourceType::Video,
            _ => ResourceType::Raw,
        };

        match (resource_type, extension) {
            (ResourceType::Raw, _) | (_, None) => AssetRef {
                resource_type,
                public_id: key.to_string(),
                format: None,
            },
            (_, Some(ext)) => AssetRef {
                resource_type,
                // Strip ".ext" case-insensitively; the key's own casing of the stem is kept.
                public_id: key[..key.len() - ext.len() - 1].to_string(),
                format: Some(ext),
            },
        }
    }

    /// Inverse of [`AssetRef::from_key`] for assets reported by the API.
    pub fn to_key(&self) -> String {
        match (self.resource_type, &self.format) {
            (ResourceType::Raw, _) | (_, None) => self.public_id.clone(),
            (_, Some(format)) => format!("{}.{}", self.public_id, format),
        }
    }
}

/// Cloudinary request signature: sorted `k=v` pairs joined by `&`, secret appended, SHA-256.
pub fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
    #[serde(default)]
    asset_id: Option<String>,
    #[serde(default)]
    etag: Option<String>,
    #[serde(default)]
    bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ResourceResponse {
    public_id: String,
    resource_type: String,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    bytes: u64,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    etag: Option<String>,
    #[serde(default)]
    context: Option<ResourceContext>,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceContext {
    #[serde(default)]
    custom: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    resources: Vec<ResourceResponse>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ResourceResponse {
    /// Key the asset was stored under: the recorded one when present, otherwise rebuilt from
    /// public id and reported format.
    fn storage_key(&self) -> String {
        self.context
            .as_ref()
            .and_then(|c| c.custom.get(KEY_CONTEXT_FIELD))
            .filter(|key| validate_key(key).is_ok())
            .cloned()
            .unwrap_or_else(|| {
                AssetRef {
                    resource_type: ResourceType::parse(&self.resource_type),
                    public_id: self.public_id.clone(),
                    format: self.format.clone(),
                }
                .to_key()
            })
    }

    fn into_remote_object(self) -> RemoteObject {
        RemoteObject {
            key: self.storage_key(),
            size: self.bytes,
            // Short format code ("jpg"); resolved to a MIME type by the caller.
            content_type: self.format,
            last_modified: self.created_at,
            etag: self.etag,
        }
    }

    fn into_object_metadata(self, key: &str) -> ObjectMetadata {
        let content_type = Some(stratus_core::mime::resolve_mime_type(
            self.format.as_deref(),
            key,
        ));
        let custom = self
            .context
            .map(|c| c.custom)
            .unwrap_or_default()
            .into_iter()
            .filter(|(name, _)| name != KEY_CONTEXT_FIELD)
            .collect();

        ObjectMetadata {
            size: self.bytes,
            content_type,
            last_modified: self.created_at,
            etag: self.etag,
            custom,
        }
    }
}

/// `k=v|k=v` context string; `=` and `|` inside values are escaped with a backslash.
fn encode_context(entries: &BTreeMap<String, String>) -> String {
    entries
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                k.replace(['|', '='], "_"),
                v.replace('\\', "\\\\").replace('=', "\\=").replace('|', "\\|")
            )
        })
        .collect::<Vec<_>>()
        .join("|")
}

pub struct CloudinaryAdapter {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: Zeroizing<String>,
    /// Custom delivery host (CNAME) replacing `res.cloudinary.com/{cloud}`.
    public_url_base: Option<String>,
    closed: AtomicBool,
}

impl CloudinaryAdapter {
    pub fn new(creds: &CloudinaryCredentials, overrides: &AccountOverrides) -> StorageResult<Self> {
        creds.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            cloud_name: creds.cloud_name.clone(),
            api_key: creds.api_key.clone(),
            api_secret: Zeroizing::new(creds.api_secret.clone()),
            public_url_base: overrides
                .public_url_base
                .as_deref()
                .map(|base| base.trim_end_matches('/').to_string()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}/{}", API_BASE, self.cloud_name, path)
    }

    fn delivery_base(&self) -> String {
        match &self.public_url_base {
            Some(base) => base.clone(),
            None => format!("{}/{}", DELIVERY_BASE, self.cloud_name),
        }
    }

    fn delivery_url(&self, asset: &AssetRef, key: &str) -> String {
        format!(
            "{}/{}/upload/{}",
            self.delivery_base(),
            asset.resource_type.as_str(),
            encode_key_for_url(key)
        )
    }

    /// Upload params shared by direct and signed uploads.
    fn upload_params(
        asset: &AssetRef,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> BTreeMap<&'static str, String> {
        let mut context: BTreeMap<String, String> = metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        context.insert(KEY_CONTEXT_FIELD.to_string(), key.to_string());

        let mut params = BTreeMap::new();
        params.insert("public_id", asset.public_id.clone());
        params.insert("context", encode_context(&context));
        params
    }

    /// Adds `timestamp`, `signature`, `signature_algorithm` and `api_key` to signed params.
    fn signed_form(&self, mut params: BTreeMap<&'static str, String>) -> HashMap<String, String> {
        params.insert("timestamp", Utc::now().timestamp().to_string());
        let signature = sign_params(&params, &self.api_secret);

        let mut form: HashMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        form.insert("signature".to_string(), signature);
        form.insert(
            "signature_algorithm".to_string(),
            SIGNATURE_ALGORITHM.to_string(),
        );
        form.insert("api_key".to_string(), self.api_key.clone());
        form
    }

    fn check_ceiling(asset: &AssetRef, size: u64) -> StorageResult<()> {
        let media_type = asset.resource_type.ceiling_media_type();
        if let Some(limit) = provider_max_bytes(StorageProvider::Cloudinary, media_type) {
            if size > limit {
                return Err(StorageError::FileTooLarge { size, limit });
            }
        }
        Ok(())
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => format!("{} ({})", parsed.error.message, status),
            Err(_) => format!("HTTP {}", status),
        }
    }

    async fn fetch_resource(&self, key: &str) -> StorageResult<ResourceResponse> {
        validate_key(key)?;
        let asset = AssetRef::from_key(key);
        let url = self.api_url(&format!(
            "resources/{}/upload/{}",
            asset.resource_type.as_str(),
            encode_key_for_url(&asset.public_id)
        ));

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.api_key, Some(self.api_secret.as_str()))
            .send()
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(key.to_string())),
            status if status.is_success() => response
                .json::<ResourceResponse>()
                .await
                .map_err(|e| StorageError::BackendError(e.to_string())),
            _ => Err(StorageError::BackendError(
                Self::error_message(response).await,
            )),
        }
    }

    async fn rename(&self, from: &AssetRef, to: &AssetRef) -> StorageResult<()> {
        let mut params = BTreeMap::new();
        params.insert("from_public_id", from.public_id.clone());
        params.insert("to_public_id", to.public_id.clone());
        let form = self.signed_form(params);

        let response = self
            .client
            .post(self.api_url(&format!("{}/rename", from.resource_type.as_str())))
            .form(&form)
            .send()
            .await
            .map_err(|e| StorageError::MoveFailed(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(from.to_key())),
            status if status.is_success() => Ok(()),
            _ => Err(StorageError::MoveFailed(Self::error_message(response).await)),
        }
    }
}

#[async_trait]
impl StorageAdapter for CloudinaryAdapter {
    fn provider(&self) -> StorageProvider {
        StorageProvider::Cloudinary
    }

    async fn upload(
        &self,
        body: ByteStream,
        key: &str,
        content_type: &str,
        size: Option<u64>,
        metadata: HashMap<String, String>,
    ) -> StorageResult<UploadedObject> {
        validate_key(key)?;
        let asset = AssetRef::from_key(key);
        if let Some(size) = size {
            Self::check_ceiling(&asset, size)?;
        }

        let start = Instant::now();
        let bytes = collect_stream(body)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        let uploaded_size = bytes.len() as u64;
        Self::check_ceiling(&asset, uploaded_size)?;

        let params = Self::upload_params(&asset, key, &metadata);

        let filename = key.rsplit('/').next().unwrap_or(key).to_string();
        let part = Part::bytes(bytes.to_vec())
            .file_name(filename)
            .mime_str(content_type)
            .map_err(|e| StorageError::UploadFailed(format!("Invalid content type: {}", e)))?;

        let mut form = Form::new().part("file", part);
        for (name, value) in self.signed_form(params) {
            form = form.text(name, value);
        }

        let response = self
            .client
            .post(self.api_url(&format!("{}/upload", asset.resource_type.as_str())))
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        if !response.status().is_success() {
            let message = Self::error_message(response).await;
            tracing::error!(
                cloud = %self.cloud_name,
                key = %key,
                size_bytes = uploaded_size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                error = %message,
                "Cloudinary upload failed"
            );
            return Err(StorageError::UploadFailed(message));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        tracing::info!(
            cloud = %self.cloud_name,
            key = %key,
            public_id = %uploaded.public_id,
            size_bytes = uploaded_size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cloudinary upload successful"
        );

        let thumbnail_url = (asset.resource_type == ResourceType::Video).then(|| {
            format!(
                "{}/video/upload/so_0/{}.jpg",
                self.delivery_base(),
                encode_key_for_url(&uploaded.public_id)
            )
        });

        Ok(UploadedObject {
            key: key.to_string(),
            public_url: uploaded.secure_url,
            thumbnail_url,
            provider_id: uploaded.asset_id.or(Some(uploaded.public_id)),
            etag: uploaded.etag,
            size: uploaded.bytes.or(Some(uploaded_size)),
        })
    }

    async fn generate_signed_upload_url(
        &self,
        key: &str,
        _content_type: &str,
        expires_in: Duration,
        max_size: Option<u64>,
    ) -> StorageResult<SignedUpload> {
        validate_key(key)?;
        let asset = AssetRef::from_key(key);
        if let Some(size) = max_size {
            Self::check_ceiling(&asset, size)?;
        }

        let params = Self::upload_params(&asset, key, &HashMap::new());

        Ok(SignedUpload {
            url: self.api_url(&format!("{}/upload", asset.resource_type.as_str())),
            method: "POST".to_string(),
            headers: HashMap::new(),
            form_fields: self.signed_form(params),
            // Cloudinary rejects signatures older than one hour regardless of what we ask for.
            expires_at: Utc::now()
                + chrono::Duration::from_std(expires_in.min(Duration::from_secs(3600)))
                    .unwrap_or(chrono::Duration::zero()),
        })
    }

    async fn download(&self, key: &str) -> StorageResult<ByteStream> {
        validate_key(key)?;
        let asset = AssetRef::from_key(key);
        let url = self.delivery_url(&asset, key);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(StorageError::NotFound(key.to_string())),
            status if !status.is_success() => {
                return Err(StorageError::DownloadFailed(format!("HTTP {}", status)));
            }
            _ => {}
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StorageError::DownloadFailed(e.to_string())));
        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let asset = AssetRef::from_key(key);

        let mut params = BTreeMap::new();
        params.insert("public_id", asset.public_id.clone());
        params.insert("invalidate", "true".to_string());
        let form = self.signed_form(params);

        let response = self
            .client
            .post(self.api_url(&format!("{}/destroy", asset.resource_type.as_str())))
            .form(&form)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::DeleteFailed(
                Self::error_message(response).await,
            ));
        }

        let result: DestroyResponse = response
            .json()
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;

        match result.result.as_str() {
            "ok" => {
                tracing::info!(cloud = %self.cloud_name, key = %key, "Cloudinary delete successful");
                Ok(())
            }
            // Already gone is the outcome the caller wanted.
            "not found" => {
                tracing::debug!(cloud = %self.cloud_name, key = %key, "Cloudinary asset already absent");
                Ok(())
            }
            other => Err(StorageError::DeleteFailed(format!(
                "Unexpected destroy result: {}",
                other
            ))),
        }
    }

    async fn move_object(&self, src_key: &str, dest_key: &str) -> StorageResult<()> {
        validate_key(src_key)?;
        validate_key(dest_key)?;
        let from = AssetRef::from_key(src_key);
        let to = AssetRef::from_key(dest_key);

        if from.resource_type == to.resource_type && from.format == to.format {
            return self.rename(&from, &to).await;
        }

        // Different asset class or format: no native rename, so copy then delete.
        let body = self.download(src_key).await?;
        let content_type = stratus_core::mime::resolve_mime_type(None, dest_key);
        self.upload(body, dest_key, &content_type, None, HashMap::new())
            .await
            .map_err(|e| StorageError::MoveFailed(e.to_string()))?;
        self.delete(src_key)
            .await
            .map_err(|e| StorageError::MoveFailed(e.to_string()))
    }

    fn public_url(&self, key: &str) -> String {
        self.delivery_url(&AssetRef::from_key(key), key)
    }

    async fn generate_signed_download_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        validate_key(key)?;
        let asset = AssetRef::from_key(key);
        let expires_at = Utc::now().timestamp() + expires_in.as_secs() as i64;

        let mut params = BTreeMap::new();
        params.insert("public_id", asset.public_id.clone());
        params.insert("expires_at", expires_at.to_string());
        if let Some(ref format) = asset.format {
            params.insert("format", format.clone());
        }
        let fields = self.signed_form(params);

        let mut query: Vec<_> = fields.into_iter().collect();
        query.sort();
        let query = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        Ok(format!(
            "{}?{}",
            self.api_url(&format!("{}/download", asset.resource_type.as_str())),
            query
        ))
    }

    async fn list(
        &self,
        prefix: Option<&str>,
        limit: usize,
        cursor: Option<&str>,
    ) -> StorageResult<ListPage> {
        let mut body = serde_json::json!({
            "max_results": limit.clamp(1, MAX_SEARCH_RESULTS),
            "sort_by": [{ "public_id": "asc" }],
            "with_field": ["context"],
        });
        if let Some(prefix) = prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
            body["expression"] = serde_json::Value::String(format!("public_id:{}*", prefix));
        }
        if let Some(cursor) = cursor {
            body["next_cursor"] = serde_json::Value::String(cursor.to_string());
        }

        let response = self
            .client
            .post(self.api_url("resources/search"))
            .basic_auth(&self.api_key, Some(self.api_secret.as_str()))
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::ListFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::ListFailed(
                Self::error_message(response).await,
            ));
        }

        let page: SearchResponse = response
            .json()
            .await
            .map_err(|e| StorageError::ListFailed(e.to_string()))?;

        let files = page
            .resources
            .into_iter()
            .map(ResourceResponse::into_remote_object)
            .collect();

        Ok(ListPage {
            files,
            has_more: page.next_cursor.is_some(),
            next_cursor: page.next_cursor,
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.fetch_resource(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn metadata(&self, key: &str) -> StorageResult<ObjectMetadata> {
        Ok(self.fetch_resource(key).await?.into_object_metadata(key))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(cloud = %self.cloud_name, "Cloudinary adapter closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::parse_credentials;

    fn adapter() -> CloudinaryAdapter {
        let creds: CloudinaryCredentials = parse_credentials(
            br#"{"cloud_name":"demo","api_key":"1234","api_secret":"s3cr3t"}"#,
        )
        .unwrap();
        CloudinaryAdapter::new(&creds, &AccountOverrides::default()).unwrap()
    }

    fn resource(value: serde_json::Value) -> ResourceResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn maps_keys_to_assets() {
        let image = AssetRef::from_key("photos/cat_1a2b3c4d.JPG");
        assert_eq!(image.resource_type, ResourceType::Image);
        assert_eq!(image.public_id, "photos/cat_1a2b3c4d");
        assert_eq!(image.format.as_deref(), Some("jpg"));

        let audio = AssetRef::from_key("podcasts/ep1.mp3");
        assert_eq!(audio.resource_type, ResourceType::Video);
        assert_eq!(audio.public_id, "podcasts/ep1");

        let doc = AssetRef::from_key("docs/report.pdf");
        assert_eq!(doc.resource_type, ResourceType::Raw);
        assert_eq!(doc.public_id, "docs/report.pdf");
        assert_eq!(doc.to_key(), "docs/report.pdf");

        let bare = AssetRef::from_key("no-extension");
        assert_eq!(bare.resource_type, ResourceType::Raw);
    }

    #[test]
    fn listed_assets_map_back_to_keys() {
        let resource: ResourceResponse = serde_json::from_value(serde_json::json!({
            "public_id": "photos/cat",
            "resource_type": "image",
            "format": "png",
            "bytes": 2048,
            "created_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        let object = resource.into_remote_object();
        assert_eq!(object.key, "photos/cat.png");
        assert_eq!(object.size, 2048);
        assert_eq!(object.content_type.as_deref(), Some("png"));
    }

    #[test]
    fn recorded_key_survives_format_normalization() {
        let object = resource(serde_json::json!({
            "public_id": "photos/x_ab12cd34",
            "resource_type": "image",
            "format": "jpg",
            "bytes": 10,
            "context": { "custom": { "stratus_key": "photos/x_ab12cd34.jpeg" } }
        }))
        .into_remote_object();
        assert_eq!(object.key, "photos/x_ab12cd34.jpeg");
    }

    #[test]
    fn metadata_exposes_only_user_context() {
        let metadata = resource(serde_json::json!({
            "public_id": "photos/cat",
            "resource_type": "image",
            "format": "png",
            "bytes": 42,
            "context": { "custom": { "stratus_key": "photos/cat.png", "media_id": "m-1" } }
        }))
        .into_object_metadata("photos/cat.png");

        assert_eq!(metadata.size, 42);
        assert_eq!(metadata.content_type.as_deref(), Some("image/png"));
        assert_eq!(metadata.custom.len(), 1);
        assert_eq!(metadata.custom["media_id"], "m-1");
        assert!(!metadata.custom.contains_key("public_id"));
        assert!(!metadata.custom.contains_key("resource_type"));

        let bare = resource(serde_json::json!({
            "public_id": "docs/a.pdf",
            "resource_type": "raw",
            "bytes": 1
        }))
        .into_object_metadata("docs/a.pdf");
        assert!(bare.custom.is_empty());
    }

    #[test]
    fn context_values_are_escaped() {
        let mut entries = BTreeMap::new();
        entries.insert("note".to_string(), "a=b|c".to_string());
        entries.insert("stratus_key".to_string(), "p/x.jpeg".to_string());
        assert_eq!(encode_context(&entries), r"note=a\=b\|c|stratus_key=p/x.jpeg");
    }

    #[test]
    fn custom_delivery_host_replaces_cloudinary_domain() {
        let creds: CloudinaryCredentials = parse_credentials(
            br#"{"cloud_name":"demo","api_key":"1234","api_secret":"s3cr3t"}"#,
        )
        .unwrap();
        let overrides = AccountOverrides {
            public_url_base: Some("https://media.example.com/".into()),
            ..Default::default()
        };
        let adapter = CloudinaryAdapter::new(&creds, &overrides).unwrap();
        assert_eq!(
            adapter.public_url("p/cat.jpg"),
            "https://media.example.com/image/upload/p/cat.jpg"
        );
    }

    #[test]
    fn signature_is_sorted_sha256() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1315060510".to_string());
        params.insert("public_id", "sample_image".to_string());
        params.insert("eager", String::new());

        let expected = {
            let mut hasher = Sha256::new();
            hasher.update(b"public_id=sample_image&timestamp=1315060510abcd");
            hex::encode(hasher.finalize())
        };
        assert_eq!(sign_params(&params, "abcd"), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn public_url_uses_delivery_host() {
        assert_eq!(
            adapter().public_url("photos/cat.jpg"),
            "https://res.cloudinary.com/demo/image/upload/photos/cat.jpg"
        );
        assert_eq!(
            adapter().public_url("docs/a.pdf"),
            "https://res.cloudinary.com/demo/raw/upload/docs/a.pdf"
        );
    }

    #[tokio::test]
    async fn signed_upload_is_a_signed_form_post() {
        let upload = adapter()
            .generate_signed_upload_url(
                "videos/clip.mp4",
                "video/mp4",
                Duration::from_secs(900),
                Some(50 * 1024 * 1024),
            )
            .await
            .unwrap();

        assert_eq!(upload.method, "POST");
        assert_eq!(upload.url, "https://api.cloudinary.com/v1_1/demo/video/upload");
        assert_eq!(upload.form_fields["public_id"], "videos/clip");
        assert_eq!(upload.form_fields["api_key"], "1234");
        assert_eq!(upload.form_fields["signature_algorithm"], "sha256");

        assert_eq!(upload.form_fields["context"], "stratus_key=videos/clip.mp4");

        let mut signed = BTreeMap::new();
        signed.insert("public_id", "videos/clip".to_string());
        signed.insert("context", "stratus_key=videos/clip.mp4".to_string());
        signed.insert("timestamp", upload.form_fields["timestamp"].clone());
        assert_eq!(upload.form_fields["signature"], sign_params(&signed, "s3cr3t"));
        assert!(!upload.form_fields.values().any(|v| v == "s3cr3t"));
    }

    #[tokio::test]
    async fn signed_upload_respects_ceilings() {
        let err = adapter()
            .generate_signed_upload_url(
                "photos/huge.jpg",
                "image/jpeg",
                Duration::from_secs(900),
                Some(15 * 1024 * 1024),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::FileTooLarge { .. }));
    }

    #[tokio::test]
    async fn signed_download_url_carries_signature() {
        let url = adapter()
            .generate_signed_download_url("photos/cat.jpg", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("https://api.cloudinary.com/v1_1/demo/image/download?"));
        assert!(url.contains("signature="));
        assert!(url.contains("public_id=photos%2Fcat"));
        assert!(url.contains("format=jpg"));
    }
}

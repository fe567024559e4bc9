use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::media::MediaType;
use crate::encryption::EncryptedBlob;
use crate::storage_types::StorageProvider;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// A configured connection to one provider bucket/cloud.
///
/// Credentials are only ever held here as ciphertext; they are decrypted by the adapter
/// factory when an adapter is built and never serialized out.
#[derive(Debug, Clone, Serialize)]
pub struct StorageAccount {
    pub id: Uuid,
    pub name: String,
    pub provider: StorageProvider,
    #[serde(skip_serializing)]
    pub encrypted_credentials: Vec<u8>,
    #[serde(skip_serializing)]
    pub credentials_nonce: Vec<u8>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub public_url_base: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub is_public: bool,
    pub max_file_size_mb: Option<i64>,
    pub allowed_media_types: Vec<MediaType>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StorageAccount {
    pub fn credentials_blob(&self) -> EncryptedBlob {
        EncryptedBlob {
            ciphertext: self.encrypted_credentials.clone(),
            nonce: self.credentials_nonce.clone(),
        }
    }

    pub fn set_credentials(&mut self, blob: EncryptedBlob) {
        self.encrypted_credentials = blob.ciphertext;
        self.credentials_nonce = blob.nonce;
    }

    /// Account-level size limit in bytes (`None` = only provider ceilings apply).
    pub fn max_file_size_bytes(&self) -> Option<u64> {
        self.max_file_size_mb
            .filter(|mb| *mb > 0)
            .map(|mb| mb as u64 * BYTES_PER_MB)
    }

    /// An empty allow-list accepts everything.
    pub fn accepts_media_type(&self, media_type: MediaType) -> bool {
        self.allowed_media_types.is_empty() || self.allowed_media_types.contains(&media_type)
    }

    pub fn is_usable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}

/// Create a storage account. Credentials arrive as plaintext JSON and are encrypted before
/// anything is persisted.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStorageAccountRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Name must be between 1 and 255 characters"
    ))]
    pub name: String,
    pub provider: StorageProvider,
    pub credentials: serde_json::Value,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    #[validate(url(message = "Endpoint must be a valid URL"))]
    pub endpoint: Option<String>,
    #[serde(default)]
    #[validate(url(message = "Public URL base must be a valid URL"))]
    pub public_url_base: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    #[validate(range(min = 1, message = "max_file_size_mb must be positive"))]
    pub max_file_size_mb: Option<i64>,
    #[serde(default)]
    pub allowed_media_types: Vec<MediaType>,
}

fn default_true() -> bool {
    true
}

/// Partial update. `credentials` present means rotation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateStorageAccountRequest {
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 255,
        message = "Name must be between 1 and 255 characters"
    ))]
    pub name: Option<String>,
    #[serde(default)]
    pub credentials: Option<serde_json::Value>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    #[validate(url(message = "Endpoint must be a valid URL"))]
    pub endpoint: Option<String>,
    #[serde(default)]
    #[validate(url(message = "Public URL base must be a valid URL"))]
    pub public_url_base: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    #[validate(range(min = 1, message = "max_file_size_mb must be positive"))]
    pub max_file_size_mb: Option<i64>,
    #[serde(default)]
    pub allowed_media_types: Option<Vec<MediaType>>,
}

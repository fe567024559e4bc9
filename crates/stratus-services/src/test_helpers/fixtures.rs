//! Fixture builders.

use chrono::Utc;
use std::sync::Arc;
use stratus_core::models::{Media, MediaGroup, MediaType, StorageAccount, StorageRoutingRule};
use stratus_core::{Config, Encryptor, StorageProvider};
use uuid::Uuid;

pub fn account(provider: StorageProvider, name: &str) -> StorageAccount {
    let now = Utc::now();
    StorageAccount {
        id: Uuid::new_v4(),
        name: name.to_string(),
        provider,
        encrypted_credentials: vec![],
        credentials_nonce: vec![],
        bucket: Some(format!("{}-bucket", name)),
        region: None,
        endpoint: None,
        public_url_base: None,
        is_default: false,
        is_active: true,
        is_public: true,
        max_file_size_mb: None,
        allowed_media_types: vec![],
        created_by: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

pub fn group(default_storage_account_id: Option<Uuid>) -> MediaGroup {
    let now = Utc::now();
    MediaGroup {
        id: Uuid::new_v4(),
        name: "group".to_string(),
        default_storage_account_id,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

pub fn rule(storage_account_id: Uuid, priority: i32) -> StorageRoutingRule {
    let now = Utc::now();
    StorageRoutingRule {
        id: Uuid::new_v4(),
        name: format!("rule-{}", priority),
        priority,
        media_group_id: None,
        media_type: None,
        min_size_bytes: None,
        max_size_bytes: None,
        mime_pattern: None,
        storage_account_id,
        folder_prefix: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Completed media record stored under `key`.
pub fn completed_media(account_id: Uuid, key: &str, uploaded_by: Uuid) -> Media {
    let filename = key.rsplit('/').next().unwrap_or(key).to_string();
    let mut media = Media::pending(
        account_id,
        None,
        None,
        filename.clone(),
        filename,
        key.to_string(),
        MediaType::Image,
        "image/jpeg".to_string(),
        uploaded_by,
    );
    media.mark_completed(4);
    media.public_url = Some(format!("https://memory.test/{}", key));
    media
}

pub fn test_encryptor() -> Arc<Encryptor> {
    Arc::new(Encryptor::from_key_bytes(&[7u8; 32]).unwrap())
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgresql://localhost/stratus_test".to_string(),
        encryption_key: Encryptor::generate_key(),
        side_effect_queue_size: 64,
        ..Config::default()
    }
}

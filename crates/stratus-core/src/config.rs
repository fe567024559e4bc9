//! Configuration module
//!
//! Runtime settings for the storage core: database connection, credential key, signed URL
//! lifetimes, pending-upload reaping, sync paging and the side-effect queue.

use std::env;
use std::time::Duration;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SIGNED_UPLOAD_EXPIRY_SECS: u64 = 900;
const SIGNED_DOWNLOAD_EXPIRY_SECS: u64 = 3600;
const PENDING_UPLOAD_TTL_SECS: u64 = 86_400;
const PENDING_REAP_INTERVAL_SECS: u64 = 3600;
const PENDING_REAP_BATCH_SIZE: i64 = 200;
const SYNC_PAGE_SIZE: usize = 100;
const SIDE_EFFECT_QUEUE_SIZE: usize = 1024;
const MAX_BATCH_SIZE: usize = 50;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    /// Base64 of a 32-byte key. Kept out of Debug output.
    pub encryption_key: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub signed_upload_expiry_secs: u64,
    pub signed_download_expiry_secs: u64,
    pub pending_upload_ttl_secs: u64,
    pub pending_reap_interval_secs: u64,
    pub pending_reap_batch_size: i64,
    pub sync_page_size: usize,
    pub side_effect_queue_size: usize,
    pub max_batch_size: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_timeout_seconds", &self.db_timeout_seconds)
            .field("signed_upload_expiry_secs", &self.signed_upload_expiry_secs)
            .field("signed_download_expiry_secs", &self.signed_download_expiry_secs)
            .field("pending_upload_ttl_secs", &self.pending_upload_ttl_secs)
            .field("pending_reap_interval_secs", &self.pending_reap_interval_secs)
            .field("sync_page_size", &self.sync_page_size)
            .field("side_effect_queue_size", &self.side_effect_queue_size)
            .field("max_batch_size", &self.max_batch_size)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            encryption_key: String::new(),
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            environment: "development".to_string(),
            signed_upload_expiry_secs: SIGNED_UPLOAD_EXPIRY_SECS,
            signed_download_expiry_secs: SIGNED_DOWNLOAD_EXPIRY_SECS,
            pending_upload_ttl_secs: PENDING_UPLOAD_TTL_SECS,
            pending_reap_interval_secs: PENDING_REAP_INTERVAL_SECS,
            pending_reap_batch_size: PENDING_REAP_BATCH_SIZE,
            sync_page_size: SYNC_PAGE_SIZE,
            side_effect_queue_size: SIDE_EFFECT_QUEUE_SIZE,
            max_batch_size: MAX_BATCH_SIZE,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let config = Config {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            encryption_key: env::var("ENCRYPTION_KEY")
                .map_err(|_| anyhow::anyhow!("ENCRYPTION_KEY must be set"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            environment,
            signed_upload_expiry_secs: env::var("SIGNED_UPLOAD_EXPIRY_SECS")
                .unwrap_or_else(|_| SIGNED_UPLOAD_EXPIRY_SECS.to_string())
                .parse()
                .unwrap_or(SIGNED_UPLOAD_EXPIRY_SECS),
            signed_download_expiry_secs: env::var("SIGNED_DOWNLOAD_EXPIRY_SECS")
                .unwrap_or_else(|_| SIGNED_DOWNLOAD_EXPIRY_SECS.to_string())
                .parse()
                .unwrap_or(SIGNED_DOWNLOAD_EXPIRY_SECS),
            pending_upload_ttl_secs: env::var("PENDING_UPLOAD_TTL_SECS")
                .unwrap_or_else(|_| PENDING_UPLOAD_TTL_SECS.to_string())
                .parse()
                .unwrap_or(PENDING_UPLOAD_TTL_SECS),
            pending_reap_interval_secs: env::var("PENDING_REAP_INTERVAL_SECS")
                .unwrap_or_else(|_| PENDING_REAP_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(PENDING_REAP_INTERVAL_SECS),
            pending_reap_batch_size: env::var("PENDING_REAP_BATCH_SIZE")
                .unwrap_or_else(|_| PENDING_REAP_BATCH_SIZE.to_string())
                .parse()
                .unwrap_or(PENDING_REAP_BATCH_SIZE),
            sync_page_size: env::var("SYNC_PAGE_SIZE")
                .unwrap_or_else(|_| SYNC_PAGE_SIZE.to_string())
                .parse()
                .unwrap_or(SYNC_PAGE_SIZE),
            side_effect_queue_size: env::var("SIDE_EFFECT_QUEUE_SIZE")
                .unwrap_or_else(|_| SIDE_EFFECT_QUEUE_SIZE.to_string())
                .parse()
                .unwrap_or(SIDE_EFFECT_QUEUE_SIZE),
            max_batch_size: env::var("MAX_BATCH_SIZE")
                .unwrap_or_else(|_| MAX_BATCH_SIZE.to_string())
                .parse()
                .unwrap_or(MAX_BATCH_SIZE),
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.encryption_key.trim().is_empty() {
            return Err(anyhow::anyhow!("ENCRYPTION_KEY must not be empty"));
        }

        if self.signed_upload_expiry_secs == 0 || self.signed_download_expiry_secs == 0 {
            return Err(anyhow::anyhow!("Signed URL expiry must be greater than 0"));
        }

        // A pending record must outlive its upload URL, otherwise in-flight uploads get reaped.
        if self.pending_upload_ttl_secs <= self.signed_upload_expiry_secs {
            return Err(anyhow::anyhow!(
                "PENDING_UPLOAD_TTL_SECS ({}) must be greater than SIGNED_UPLOAD_EXPIRY_SECS ({})",
                self.pending_upload_ttl_secs,
                self.signed_upload_expiry_secs
            ));
        }

        if self.sync_page_size == 0 || self.sync_page_size > 1000 {
            return Err(anyhow::anyhow!("SYNC_PAGE_SIZE must be between 1 and 1000"));
        }

        if self.side_effect_queue_size == 0 {
            return Err(anyhow::anyhow!("SIDE_EFFECT_QUEUE_SIZE must be greater than 0"));
        }

        if self.max_batch_size == 0 {
            return Err(anyhow::anyhow!("MAX_BATCH_SIZE must be greater than 0"));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }

    pub fn signed_upload_expiry(&self) -> Duration {
        Duration::from_secs(self.signed_upload_expiry_secs)
    }

    pub fn signed_download_expiry(&self) -> Duration {
        Duration::from_secs(self.signed_download_expiry_secs)
    }

    pub fn pending_upload_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_upload_ttl_secs)
    }

    pub fn pending_reap_interval(&self) -> Duration {
        Duration::from_secs(self.pending_reap_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            database_url: "postgresql://localhost/stratus".into(),
            encryption_key: "a2V5".into(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_are_valid() {
        let config = valid();
        assert!(config.validate().is_ok());
        assert_eq!(config.signed_upload_expiry(), Duration::from_secs(900));
        assert_eq!(config.max_batch_size, 50);
    }

    #[test]
    fn ttl_must_exceed_upload_expiry() {
        let config = Config {
            pending_upload_ttl_secs: 600,
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_postgres_url() {
        let config = Config {
            database_url: "mysql://localhost/db".into(),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_hides_secrets() {
        let rendered = format!("{:?}", valid());
        assert!(!rendered.contains("a2V5"));
        assert!(!rendered.contains("postgresql://"));
    }
}

//! Stratus database layer
//!
//! Persistence traits for storage accounts, routing rules, media groups and the media catalog,
//! their Postgres repositories, and connection setup.

pub mod repositories;
pub mod traits;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use stratus_core::Config;

pub use repositories::{
    MediaGroupRepository, MediaRepository, RoutingRuleRepository, StorageAccountRepository,
};
pub use traits::{MediaGroupStore, MediaStore, RoutingRuleStore, StorageAccountStore};

/// Connect to Postgres and apply pending migrations.
pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );

    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// All Postgres stores over one pool, ready to hand to the services.
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn StorageAccountStore>,
    pub rules: Arc<dyn RoutingRuleStore>,
    pub groups: Arc<dyn MediaGroupStore>,
    pub media: Arc<dyn MediaStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            accounts: Arc::new(StorageAccountRepository::new(pool.clone())),
            rules: Arc::new(RoutingRuleRepository::new(pool.clone())),
            groups: Arc::new(MediaGroupRepository::new(pool.clone())),
            media: Arc::new(MediaRepository::new(pool)),
        }
    }
}

//! Stratus operator CLI.
//!
//! Needs DATABASE_URL and ENCRYPTION_KEY (a `.env` file is honored). `generate-key` needs
//! neither; `encrypt-credentials` only needs ENCRYPTION_KEY.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use stratus_cli::{init_tracing, load_credentials, print_json, seal_credentials};
use stratus_core::models::Actor;
use stratus_core::{Config, Encryptor};
use stratus_db::Stores;
use stratus_services::{StorageCore, SyncOptions, TracingAuditSink};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "stratus", about = "Stratus media storage operator CLI")]
struct Cli {
    /// User recorded as the actor of administrative operations
    #[arg(long, global = true, value_name = "UUID")]
    as_user: Option<Uuid>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import objects already present in a storage account into the media catalog
    Sync {
        /// Storage account UUID
        account: Uuid,
        /// Only import keys under this prefix
        #[arg(long)]
        prefix: Option<String>,
        /// Objects per list call (defaults to SYNC_PAGE_SIZE)
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Check that a storage account's credentials work
    TestConnection {
        /// Storage account UUID
        account: Uuid,
    },
    /// List storage accounts
    Accounts {
        /// Include inactive accounts
        #[arg(long)]
        all: bool,
    },
    /// Run one pass of the abandoned upload reaper
    ReapPending,
    /// Print a fresh base64 ENCRYPTION_KEY
    GenerateKey,
    /// Encrypt a credential set with ENCRYPTION_KEY
    EncryptCredentials {
        /// Credentials as an inline JSON object
        #[arg(long)]
        json: Option<String>,
        /// Path to a JSON file holding the credentials
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

async fn storage_core(config: &Config) -> anyhow::Result<StorageCore> {
    let encryptor = Arc::new(
        Encryptor::from_base64(&config.encryption_key).context("Invalid ENCRYPTION_KEY")?,
    );
    let pool = stratus_db::connect(config).await?;
    Ok(StorageCore::new(
        config,
        Stores::postgres(pool),
        encryptor,
        Arc::new(TracingAuditSink),
    ))
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let actor = Actor::admin(cli.as_user.unwrap_or_else(Uuid::nil));

    match cli.command {
        Commands::GenerateKey => {
            println!("{}", Encryptor::generate_key());
        }
        Commands::EncryptCredentials { json, file } => {
            let encryptor = Encryptor::from_env().context("Invalid ENCRYPTION_KEY")?;
            let credentials = load_credentials(json.as_deref(), file.as_deref())?;
            print_json(&seal_credentials(&encryptor, &credentials)?)?;
        }
        Commands::Sync {
            account,
            prefix,
            page_size,
        } => {
            let config = load_config()?;
            let core = storage_core(&config).await?;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, stopping sync after the current object");
                    on_signal.cancel();
                }
            });

            let options = SyncOptions {
                prefix,
                page_size: page_size.unwrap_or(config.sync_page_size),
            };
            let result = core.accounts.sync(&actor, account, options, &cancel).await;
            core.shutdown().await;
            print_json(&result?)?;
        }
        Commands::TestConnection { account } => {
            let config = load_config()?;
            let core = storage_core(&config).await?;
            let result = core.accounts.test_connection(&actor, account).await;
            core.shutdown().await;
            print_json(&result?)?;
        }
        Commands::Accounts { all } => {
            let config = load_config()?;
            let core = storage_core(&config).await?;
            let result = core.accounts.list_accounts(&actor, all).await;
            core.shutdown().await;
            print_json(&result?)?;
        }
        Commands::ReapPending => {
            let config = load_config()?;
            let core = storage_core(&config).await?;
            let result = core.reaper.reap_once().await;
            core.shutdown().await;
            print_json(&result?)?;
        }
    }

    Ok(())
}

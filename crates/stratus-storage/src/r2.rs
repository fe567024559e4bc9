//! Cloudflare R2 over the S3 protocol.

use stratus_core::StorageProvider;

use crate::credentials::{AccountOverrides, R2Credentials};
use crate::s3_compat::{S3CompatAdapter, S3CompatConfig};
use crate::traits::{StorageError, StorageResult};

/// R2 ignores regions; the S3 signer still needs one.
pub const REGION: &str = "auto";

pub fn endpoint_for_account(account_id: &str) -> String {
    format!("https://{}.r2.cloudflarestorage.com", account_id)
}

pub fn resolve_config(
    creds: &R2Credentials,
    overrides: &AccountOverrides,
) -> StorageResult<S3CompatConfig> {
    creds.validate()?;

    let bucket = overrides
        .bucket
        .clone()
        .or_else(|| creds.bucket_name.clone())
        .ok_or_else(|| StorageError::InvalidCredentials("bucket_name is required".to_string()))?;

    let endpoint = overrides
        .endpoint
        .clone()
        .or_else(|| creds.endpoint.clone())
        .or_else(|| {
            creds
                .account_id
                .as_deref()
                .filter(|id| !id.trim().is_empty())
                .map(endpoint_for_account)
        })
        .ok_or_else(|| {
            StorageError::InvalidCredentials("account_id or endpoint is required".to_string())
        })?;

    // r2.dev or a custom domain; without one objects are only reachable through the API host.
    let public_url_base = overrides
        .public_url_base
        .clone()
        .or_else(|| creds.public_url_base.clone())
        .map(|base| base.trim_end_matches('/').to_string())
        .unwrap_or_else(|| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));

    Ok(S3CompatConfig {
        provider: StorageProvider::R2,
        bucket,
        region: REGION.to_string(),
        endpoint: Some(endpoint),
        access_key_id: creds.access_key_id.clone(),
        secret_access_key: creds.secret_access_key.clone(),
        public_url_base,
    })
}

pub fn connect(creds: &R2Credentials, overrides: &AccountOverrides) -> StorageResult<S3CompatAdapter> {
    S3CompatAdapter::new(resolve_config(creds, overrides)?)
}

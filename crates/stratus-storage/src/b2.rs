//! Backblaze B2 over its S3-compatible API.

use stratus_core::StorageProvider;

use crate::credentials::{AccountOverrides, B2Credentials};
use crate::s3_compat::{S3CompatAdapter, S3CompatConfig};
use crate::traits::{StorageError, StorageResult};

pub fn endpoint_for_region(region: &str) -> String {
    format!("https://s3.{}.backblazeb2.com", region)
}

pub fn resolve_config(
    creds: &B2Credentials,
    overrides: &AccountOverrides,
) -> StorageResult<S3CompatConfig> {
    creds.validate()?;

    let bucket = overrides
        .bucket
        .clone()
        .or_else(|| creds.bucket_name.clone())
        .ok_or_else(|| StorageError::InvalidCredentials("bucket_name is required".to_string()))?;
    let region = overrides
        .region
        .clone()
        .or_else(|| creds.region.clone())
        .ok_or_else(|| {
            StorageError::InvalidCredentials("region is required (e.g. us-west-004)".to_string())
        })?;
    let endpoint = overrides
        .endpoint
        .clone()
        .or_else(|| creds.endpoint.clone())
        .unwrap_or_else(|| endpoint_for_region(&region));
    let public_url_base = overrides
        .public_url_base
        .clone()
        .or_else(|| creds.public_url_base.clone())
        .map(|base| base.trim_end_matches('/').to_string())
        .unwrap_or_else(|| format!("https://{}.s3.{}.backblazeb2.com", bucket, region));

    Ok(S3CompatConfig {
        provider: StorageProvider::B2,
        bucket,
        region,
        endpoint: Some(endpoint),
        access_key_id: creds.key_id().to_string(),
        secret_access_key: creds.application_key().to_string(),
        public_url_base,
    })
}

pub fn connect(creds: &B2Credentials, overrides: &AccountOverrides) -> StorageResult<S3CompatAdapter> {
    S3CompatAdapter::new(resolve_config(creds, overrides)?)
}

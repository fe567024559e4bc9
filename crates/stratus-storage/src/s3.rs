//! Amazon S3 (and S3-compatible endpoints such as MinIO).

use stratus_core::StorageProvider;

use crate::credentials::{AccountOverrides, S3Credentials};
use crate::s3_compat::{S3CompatAdapter, S3CompatConfig};
use crate::traits::{StorageError, StorageResult};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Public URL base: configured base, else path style on a custom endpoint, else the AWS
/// virtual-hosted URL.
pub fn public_url_base(
    bucket: &str,
    region: &str,
    endpoint: Option<&str>,
    configured: Option<&str>,
) -> String {
    if let Some(base) = configured {
        return base.trim_end_matches('/').to_string();
    }
    match endpoint {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
    }
}

pub fn resolve_config(
    creds: &S3Credentials,
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
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    let endpoint = overrides.endpoint.clone().or_else(|| creds.endpoint.clone());
    let configured_base = overrides
        .public_url_base
        .clone()
        .or_else(|| creds.public_url_base.clone());

    Ok(S3CompatConfig {
        provider: StorageProvider::S3,
        public_url_base: public_url_base(
            &bucket,
            &region,
            endpoint.as_deref(),
            configured_base.as_deref(),
        ),
        bucket,
        region,
        endpoint,
        access_key_id: creds.access_key_id.clone(),
        secret_access_key: creds.secret_access_key.clone(),
    })
}

pub fn connect(creds: &S3Credentials, overrides: &AccountOverrides) -> StorageResult<S3CompatAdapter> {
    S3CompatAdapter::new(resolve_config(creds, overrides)?)
}

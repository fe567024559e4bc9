//! Provider credential shapes.
//!
//! These only exist between decryption and adapter construction. Every secret is zeroized on
//! drop and `Debug` never prints secret material.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use stratus_core::models::StorageAccount;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::traits::{StorageError, StorageResult};

/// Parse decrypted credential JSON into a provider's shape.
pub fn parse_credentials<T: DeserializeOwned>(plaintext: &[u8]) -> StorageResult<T> {
    serde_json::from_slice(plaintext).map_err(|e| {
        // Type-mismatch messages quote the offending value; only field names may surface.
        let message = e.to_string();
        if message.starts_with("missing field") {
            StorageError::InvalidCredentials(format!("Malformed credentials: {}", message))
        } else {
            StorageError::InvalidCredentials(format!(
                "Malformed credentials ({:?} error at line {}, column {})",
                e.classify(),
                e.line(),
                e.column()
            ))
        }
    })
}

fn require(field: &str, value: &str) -> StorageResult<()> {
    if value.trim().is_empty() {
        return Err(StorageError::InvalidCredentials(format!(
            "Credential field '{}' must not be empty",
            field
        )));
    }
    Ok(())
}

/// Non-secret settings on the account row that win over the credential JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountOverrides {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub public_url_base: Option<String>,
}

impl AccountOverrides {
    pub fn from_account(account: &StorageAccount) -> Self {
        fn non_empty(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }
        Self {
            bucket: non_empty(&account.bucket),
            region: non_empty(&account.region),
            endpoint: non_empty(&account.endpoint),
            public_url_base: non_empty(&account.public_url_base),
        }
    }
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, alias = "bucket")]
    pub bucket_name: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub public_url_base: Option<String>,
}

impl S3Credentials {
    pub fn validate(&self) -> StorageResult<()> {
        require("access_key_id", &self.access_key_id)?;
        require("secret_access_key", &self.secret_access_key)
    }
}

impl fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Credentials")
            .field("region", &self.region)
            .field("bucket_name", &self.bucket_name)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct R2Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default, alias = "bucket")]
    pub bucket_name: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub public_url_base: Option<String>,
}

impl R2Credentials {
    pub fn validate(&self) -> StorageResult<()> {
        require("access_key_id", &self.access_key_id)?;
        require("secret_access_key", &self.secret_access_key)
    }
}

impl fmt::Debug for R2Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("R2Credentials")
            .field("account_id", &self.account_id)
            .field("bucket_name", &self.bucket_name)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Backblaze application keys. Either the native names or the S3-style names may be present;
/// the native ones win when both are.
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct B2Credentials {
    #[serde(default)]
    key_id: Option<String>,
    #[serde(default)]
    application_key: Option<String>,
    #[serde(default)]
    access_key_id: Option<String>,
    #[serde(default)]
    secret_access_key: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, alias = "bucket")]
    pub bucket_name: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub public_url_base: Option<String>,
}

impl B2Credentials {
    pub fn key_id(&self) -> &str {
        resolve(&self.key_id, &self.access_key_id)
    }

    pub fn application_key(&self) -> &str {
        resolve(&self.application_key, &self.secret_access_key)
    }

    pub fn validate(&self) -> StorageResult<()> {
        require("key_id", self.key_id())?;
        require("application_key", self.application_key())
    }
}

fn resolve<'a>(native: &'a Option<String>, s3_style: &'a Option<String>) -> &'a str {
    native
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .or(s3_style.as_deref())
        .unwrap_or("")
}

impl fmt::Debug for B2Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("B2Credentials")
            .field("region", &self.region)
            .field("bucket_name", &self.bucket_name)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl CloudinaryCredentials {
    pub fn validate(&self) -> StorageResult<()> {
        require("cloud_name", &self.cloud_name)?;
        require("api_key", &self.api_key)?;
        require("api_secret", &self.api_secret)
    }
}

impl fmt::Debug for CloudinaryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryCredentials")
            .field("cloud_name", &self.cloud_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_b2_with_s3_style_aliases() {
        let creds: B2Credentials = parse_credentials(
            br#"{"access_key_id":"kid","secret_access_key":"app","region":"us-west-004","bucket_name":"media"}"#,
        )
        .unwrap();
        assert_eq!(creds.key_id(), "kid");
        assert_eq!(creds.application_key(), "app");
        assert!(creds.validate().is_ok());
    }

    #[test]
    fn parses_b2_carrying_both_naming_styles() {
        let creds: B2Credentials = parse_credentials(
            br#"{"access_key_id":"k","secret_access_key":"s","key_id":"k2","application_key":"s2","bucket_name":"b","region":"us-west-004"}"#,
        )
        .unwrap();
        assert_eq!(creds.key_id(), "k2");
        assert_eq!(creds.application_key(), "s2");
        assert!(creds.validate().is_ok());

        let missing: B2Credentials =
            parse_credentials(br#"{"key_id":"k","bucket_name":"b"}"#).unwrap();
        assert!(matches!(
            missing.validate(),
            Err(StorageError::InvalidCredentials(_))
        ));
    }

    #[test]
    fn missing_fields_are_invalid_credentials() {
        let err = parse_credentials::<CloudinaryCredentials>(br#"{"cloud_name":"demo"}"#)
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidCredentials(_)));

        let creds: S3Credentials =
            parse_credentials(br#"{"access_key_id":" ","secret_access_key":"x"}"#).unwrap();
        assert!(creds.validate().is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds: CloudinaryCredentials = parse_credentials(
            br#"{"cloud_name":"demo","api_key":"123456","api_secret":"very-secret"}"#,
        )
        .unwrap();
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("demo"));
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("123456"));
    }
}

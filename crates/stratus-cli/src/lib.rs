//! Helpers shared by the `stratus` operator binary.

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use std::path::Path;
use stratus_core::{EncryptedBlob, Encryptor};

const DEFAULT_FILTER: &str = "stratus=info";

/// Initialize tracing for CLI binaries.
///
/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Read a credential set from an inline JSON string or a file. Exactly one must be given.
pub fn load_credentials(inline: Option<&str>, file: Option<&Path>) -> Result<serde_json::Value> {
    let raw = match (inline, file) {
        (Some(json), None) => json.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file {}", path.display()))?,
        (Some(_), Some(_)) => anyhow::bail!("Pass either --json or --file, not both"),
        (None, None) => anyhow::bail!("Credentials required: pass --json or --file"),
    };

    let value: serde_json::Value =
        serde_json::from_str(&raw).context("Credentials are not valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("Credentials must be a JSON object");
    }
    Ok(value)
}

/// Base64 form of an encrypted credential blob, for seeding `storage_accounts` rows by hand.
#[derive(Debug, Serialize)]
pub struct SealedCredentials {
    pub encrypted_credentials: String,
    pub credentials_nonce: String,
}

pub fn seal_credentials(
    encryptor: &Encryptor,
    credentials: &serde_json::Value,
) -> Result<SealedCredentials> {
    let EncryptedBlob { ciphertext, nonce } = encryptor
        .encrypt_json(credentials)
        .context("Failed to encrypt credentials")?;
    Ok(SealedCredentials {
        encrypted_credentials: general_purpose::STANDARD.encode(ciphertext),
        credentials_nonce: general_purpose::STANDARD.encode(nonce),
    })
}

pub fn print_json(value: &impl Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_credentials_must_be_an_object() {
        let value = load_credentials(Some(r#"{"api_key":"k"}"#), None).unwrap();
        assert_eq!(value["api_key"], "k");

        assert!(load_credentials(Some("[1,2]"), None).is_err());
        assert!(load_credentials(Some("not json"), None).is_err());
        assert!(load_credentials(None, None).is_err());
    }

    #[test]
    fn sealed_credentials_decrypt_back() {
        let encryptor = Encryptor::from_key_bytes(&[9u8; 32]).unwrap();
        let credentials = serde_json::json!({ "application_key_id": "id", "application_key": "secret" });

        let sealed = seal_credentials(&encryptor, &credentials).unwrap();
        assert!(!sealed.encrypted_credentials.contains("secret"));

        let blob = EncryptedBlob {
            ciphertext: general_purpose::STANDARD
                .decode(&sealed.encrypted_credentials)
                .unwrap(),
            nonce: general_purpose::STANDARD
                .decode(&sealed.credentials_nonce)
                .unwrap(),
        };
        assert_eq!(encryptor.decrypt_json(&blob).unwrap(), credentials);
    }
}

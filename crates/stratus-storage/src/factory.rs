use async_trait::async_trait;
use std::sync::Arc;
use stratus_core::models::StorageAccount;
use stratus_core::{Encryptor, StorageProvider};

#[cfg(any(
    feature = "provider-s3",
    feature = "provider-r2",
    feature = "provider-b2",
    feature = "provider-cloudinary"
))]
use crate::credentials::parse_credentials;
#[cfg(any(
    feature = "provider-s3",
    feature = "provider-r2",
    feature = "provider-b2",
    feature = "provider-cloudinary"
))]
use crate::credentials::AccountOverrides;
use crate::{StorageAdapter, StorageError, StorageResult};

/// Something that can turn a storage account row into a live adapter.
#[async_trait]
pub trait AdapterBuilder: Send + Sync {
    async fn build(&self, account: &StorageAccount) -> StorageResult<Arc<dyn StorageAdapter>>;
}

/// Builds adapters from encrypted account rows.
///
/// Credentials are decrypted here and dropped (zeroized) as soon as the adapter holds what it
/// needs; nothing upstream ever sees them.
#[derive(Debug, Clone)]
pub struct AdapterFactory {
    encryptor: Arc<Encryptor>,
}

impl AdapterFactory {
    pub fn new(encryptor: Arc<Encryptor>) -> Self {
        Self { encryptor }
    }

    fn decrypt(&self, account: &StorageAccount) -> StorageResult<zeroize::Zeroizing<Vec<u8>>> {
        self.encryptor
            .decrypt(&account.encrypted_credentials, &account.credentials_nonce)
            .map_err(|e| {
                tracing::warn!(
                    account_id = %account.id,
                    provider = %account.provider,
                    "Failed to decrypt storage credentials"
                );
                StorageError::InvalidCredentials(e.to_string())
            })
    }

    fn construct(
        &self,
        account: &StorageAccount,
        _plaintext: &[u8],
    ) -> StorageResult<Arc<dyn StorageAdapter>> {
        match account.provider {
            #[cfg(feature = "provider-s3")]
            StorageProvider::S3 => {
                let creds: crate::credentials::S3Credentials = parse_credentials(_plaintext)?;
                let adapter = crate::s3::connect(&creds, &AccountOverrides::from_account(account))?;
                Ok(Arc::new(adapter))
            }

            #[cfg(not(feature = "provider-s3"))]
            StorageProvider::S3 => Err(StorageError::UnsupportedProvider(
                "s3 (provider-s3 feature not enabled)".to_string(),
            )),

            #[cfg(feature = "provider-r2")]
            StorageProvider::R2 => {
                let creds: crate::credentials::R2Credentials = parse_credentials(_plaintext)?;
                let adapter = crate::r2::connect(&creds, &AccountOverrides::from_account(account))?;
                Ok(Arc::new(adapter))
            }

            #[cfg(not(feature = "provider-r2"))]
            StorageProvider::R2 => Err(StorageError::UnsupportedProvider(
                "r2 (provider-r2 feature not enabled)".to_string(),
            )),

            #[cfg(feature = "provider-b2")]
            StorageProvider::B2 => {
                let creds: crate::credentials::B2Credentials = parse_credentials(_plaintext)?;
                let adapter = crate::b2::connect(&creds, &AccountOverrides::from_account(account))?;
                Ok(Arc::new(adapter))
            }

            #[cfg(not(feature = "provider-b2"))]
            StorageProvider::B2 => Err(StorageError::UnsupportedProvider(
                "b2 (provider-b2 feature not enabled)".to_string(),
            )),

            #[cfg(feature = "provider-cloudinary")]
            StorageProvider::Cloudinary => {
                let creds: crate::credentials::CloudinaryCredentials =
                    parse_credentials(_plaintext)?;
                let adapter = crate::cloudinary::CloudinaryAdapter::new(
                    &creds,
                    &AccountOverrides::from_account(account),
                )?;
                Ok(Arc::new(adapter))
            }

            #[cfg(not(feature = "provider-cloudinary"))]
            StorageProvider::Cloudinary => Err(StorageError::UnsupportedProvider(
                "cloudinary (provider-cloudinary feature not enabled)".to_string(),
            )),
        }
    }
}

#[async_trait]
impl AdapterBuilder for AdapterFactory {
    async fn build(&self, account: &StorageAccount) -> StorageResult<Arc<dyn StorageAdapter>> {
        let plaintext = self.decrypt(account)?;
        let adapter = self.construct(account, &plaintext)?;

        tracing::debug!(
            account_id = %account.id,
            provider = %account.provider,
            "Storage adapter built"
        );

        Ok(adapter)
    }
}

//! Credential encryption boundary
//!
//! Storage account credentials are kept as AES-256-GCM ciphertext with the nonce stored
//! side by side. The encryptor knows nothing about providers: the credential JSON is an
//! opaque byte string here.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use zeroize::Zeroizing;

/// Length of the symmetric key in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of an AES-GCM nonce in bytes (96-bit).
pub const NONCE_LENGTH: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncryptionError {
    #[error("Encryption key must be 32 bytes (256 bits), got {0}")]
    InvalidKeyLength(usize),

    #[error("Failed to decode encryption key: {0}")]
    InvalidKeyEncoding(String),

    #[error("ENCRYPTION_KEY environment variable not set")]
    MissingKey,

    #[error("Encryption failed")]
    EncryptionFailed,

    /// Wrong key, tampered ciphertext, or malformed nonce. Never carries plaintext.
    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Decrypted payload is not valid JSON: {0}")]
    InvalidPayload(String),
}

/// Ciphertext and the nonce it was sealed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// Symmetric, authenticated encryption for credential blobs.
#[derive(Clone)]
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encryptor").finish_non_exhaustive()
    }
}

impl Encryptor {
    /// Create an encryptor from a raw 32-byte key (e.g. for tests; avoids env mutation).
    pub fn from_key_bytes(key_bytes: &[u8]) -> Result<Self, EncryptionError> {
        if key_bytes.len() != KEY_LENGTH {
            return Err(EncryptionError::InvalidKeyLength(key_bytes.len()));
        }
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Create an encryptor from a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> Result<Self, EncryptionError> {
        let key_bytes = Zeroizing::new(
            general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| EncryptionError::InvalidKeyEncoding(e.to_string()))?,
        );
        Self::from_key_bytes(&key_bytes)
    }

    /// Create an encryptor from the environment.
    /// Expects ENCRYPTION_KEY to be a base64-encoded 32-byte key
    pub fn from_env() -> Result<Self, EncryptionError> {
        let key_str = env::var("ENCRYPTION_KEY").map_err(|_| EncryptionError::MissingKey)?;
        Self::from_base64(&key_str)
    }

    /// Generate a fresh random key, base64-encoded, suitable for ENCRYPTION_KEY.
    pub fn generate_key() -> String {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        general_purpose::STANDARD.encode(key)
    }

    /// Encrypt bytes under a freshly generated nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedBlob, EncryptionError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| EncryptionError::EncryptionFailed)?;

        Ok(EncryptedBlob {
            ciphertext,
            nonce: nonce.to_vec(),
        })
    }

    /// Decrypt a ciphertext sealed by [`Encryptor::encrypt`].
    ///
    /// Fails closed: a wrong key, a modified ciphertext, or a nonce of the wrong length all
    /// return `DecryptionFailed`.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        nonce: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, EncryptionError> {
        if nonce.len() != NONCE_LENGTH {
            return Err(EncryptionError::DecryptionFailed);
        }
        let nonce = Nonce::from_slice(nonce);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| EncryptionError::DecryptionFailed)
    }

    /// Serialize and encrypt a JSON value (credential sets are stored this way).
    pub fn encrypt_json(&self, value: &serde_json::Value) -> Result<EncryptedBlob, EncryptionError> {
        let plaintext = Zeroizing::new(
            serde_json::to_vec(value).map_err(|e| EncryptionError::InvalidPayload(e.to_string()))?,
        );
        self.encrypt(&plaintext)
    }

    /// Decrypt a blob and parse it as JSON.
    pub fn decrypt_json(&self, blob: &EncryptedBlob) -> Result<serde_json::Value, EncryptionError> {
        let plaintext = self.decrypt(&blob.ciphertext, &blob.nonce)?;
        serde_json::from_slice(&plaintext).map_err(|e| EncryptionError::InvalidPayload(e.to_string()))
    }
}

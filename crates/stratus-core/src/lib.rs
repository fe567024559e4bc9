//! Stratus Core Library
//!
//! This crate provides core domain models, error types, configuration, and the credential
//! encryption boundary shared across all Stratus components.

pub mod config;
pub mod encryption;
pub mod error;
pub mod mime;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use encryption::{EncryptedBlob, EncryptionError, Encryptor};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageProvider;
// Note: StorageAdapter, StorageError, StorageResult live in the stratus-storage crate

//! Stratus Storage Library
//!
//! Provider-agnostic storage adapters for Stratus: the [`StorageAdapter`] contract, the S3,
//! Cloudflare R2, Backblaze B2 and Cloudinary implementations, the [`AdapterFactory`] that
//! builds them from encrypted account rows, and the [`AdapterPool`] that caches one adapter
//! per account.
//!
//! # Storage key format
//!
//! Keys are relative object paths: `{folder_prefix}/{folder_path}/{stem}_{random8}.{ext}`.
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all providers stay consistent.
//!
//! Providers are feature-gated (`provider-s3`, `provider-r2`, `provider-b2`,
//! `provider-cloudinary`); an account whose provider is compiled out fails with
//! `UnsupportedProvider` at build time.

#[cfg(feature = "provider-b2")]
pub mod b2;
#[cfg(feature = "provider-cloudinary")]
pub mod cloudinary;
pub mod credentials;
pub mod factory;
pub mod keys;
pub mod limits;
pub mod pool;
#[cfg(feature = "provider-r2")]
pub mod r2;
#[cfg(feature = "provider-s3")]
pub mod s3;
#[cfg(feature = "s3-compat")]
pub mod s3_compat;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "provider-cloudinary")]
pub use cloudinary::CloudinaryAdapter;
pub use factory::{AdapterBuilder, AdapterFactory};
pub use limits::provider_max_bytes;
pub use pool::AdapterPool;
#[cfg(feature = "s3-compat")]
pub use s3_compat::S3CompatAdapter;
pub use stratus_core::StorageProvider;
pub use traits::{
    bytes_stream, collect_stream, ByteStream, ListPage, ObjectMetadata, RemoteObject,
    SignedUpload, StorageAdapter, StorageError, StorageResult, UploadedObject,
};

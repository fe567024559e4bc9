use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::AppError;

/// Cloud storage provider kinds
///
/// Stored as lowercase text on the storage account row. It's defined in core because it's
/// used by the models, the adapter factory, and the routing limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    R2,
    B2,
    Cloudinary,
}

impl StorageProvider {
    pub const ALL: [StorageProvider; 4] = [
        StorageProvider::S3,
        StorageProvider::R2,
        StorageProvider::B2,
        StorageProvider::Cloudinary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageProvider::S3 => "s3",
            StorageProvider::R2 => "r2",
            StorageProvider::B2 => "b2",
            StorageProvider::Cloudinary => "cloudinary",
        }
    }

    /// Whether the provider speaks the S3 protocol (object_store backed).
    pub fn is_s3_compatible(&self) -> bool {
        !matches!(self, StorageProvider::Cloudinary)
    }
}

impl FromStr for StorageProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(StorageProvider::S3),
            "r2" => Ok(StorageProvider::R2),
            "b2" => Ok(StorageProvider::B2),
            "cloudinary" => Ok(StorageProvider::Cloudinary),
            _ => Err(AppError::UnsupportedProvider(s.to_string())),
        }
    }
}

impl Display for StorageProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

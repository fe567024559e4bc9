//! Hard per-provider upload ceilings, independent of account configuration.

use stratus_core::models::MediaType;
use stratus_core::StorageProvider;

const MB: u64 = 1024 * 1024;

pub const CLOUDINARY_IMAGE_MAX_BYTES: u64 = 10 * MB;
pub const CLOUDINARY_VIDEO_MAX_BYTES: u64 = 100 * MB;
pub const CLOUDINARY_RAW_MAX_BYTES: u64 = 10 * MB;

/// Largest upload a provider accepts for a media type, if it imposes one.
pub fn provider_max_bytes(provider: StorageProvider, media_type: MediaType) -> Option<u64> {
    match provider {
        StorageProvider::Cloudinary => Some(match media_type {
            MediaType::Image => CLOUDINARY_IMAGE_MAX_BYTES,
            MediaType::Video | MediaType::Audio => CLOUDINARY_VIDEO_MAX_BYTES,
            MediaType::Document | MediaType::Other => CLOUDINARY_RAW_MAX_BYTES,
        }),
        StorageProvider::S3 | StorageProvider::R2 | StorageProvider::B2 => None,
    }
}

//! Storage key helpers shared by every adapter and the upload orchestrator.
//!
//! Key format: `{folder_prefix}/{folder_path}/{sanitized-stem}_{random8}.{ext}` with empty
//! segments dropped. Keys never start with `/` and never contain `..` segments.

use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

const MAX_FILENAME_LENGTH: usize = 255;
const RANDOM_SUFFIX_LENGTH: usize = 8;

/// Reduce a client filename to a safe basename: directories stripped, anything outside
/// `[A-Za-z0-9._-]` replaced with `_`.
pub fn sanitize_filename(filename: &str) -> StorageResult<String> {
    let filename_only = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    if filename.split(['/', '\\']).any(|s| s == "..") {
        return Err(StorageError::InvalidKey(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = sanitized.trim_matches('.');
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        return Ok("file".to_string());
    }

    Ok(trimmed.to_string())
}

/// Normalize a folder prefix or path: trims slashes, drops empty and `.` segments, sanitizes
/// each segment. `..` is rejected.
pub fn normalize_folder_path(path: &str) -> StorageResult<String> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        let segment = segment.trim();
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(StorageError::InvalidKey(format!(
                "Folder path contains path traversal: {}",
                path
            )));
        }
        let cleaned: String = segment
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        segments.push(cleaned);
    }
    Ok(segments.join("/"))
}

/// Split a sanitized filename into (stem, extension). The extension is lowercased.
pub fn split_extension(filename: &str) -> (&str, Option<String>) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            (stem, Some(ext.to_lowercase()))
        }
        _ => (filename, None),
    }
}

/// Lowercased extension of a key's last segment, if any.
pub fn key_extension(key: &str) -> Option<String> {
    let last = key.rsplit('/').next().unwrap_or(key);
    split_extension(last).1
}

/// Build a unique storage key for an upload.
pub fn generate_storage_key(
    folder_prefix: Option<&str>,
    folder_path: Option<&str>,
    filename: &str,
) -> StorageResult<String> {
    let sanitized = sanitize_filename(filename)?;
    let (stem, ext) = split_extension(&sanitized);
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(RANDOM_SUFFIX_LENGTH)
        .collect();

    let name = match ext {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext),
        None => format!("{}_{}", stem, suffix),
    };

    let mut parts = Vec::with_capacity(3);
    for folder in [folder_prefix, folder_path].into_iter().flatten() {
        let normalized = normalize_folder_path(folder)?;
        if !normalized.is_empty() {
            parts.push(normalized);
        }
    }
    parts.push(name);

    Ok(parts.join("/"))
}

/// Reject keys adapters must never accept.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key must be relative: {}",
            key
        )));
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains path traversal: {}",
            key
        )));
    }
    Ok(())
}

/// Percent-encode each path segment of a key for use in a URL.
pub fn encode_key_for_url(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

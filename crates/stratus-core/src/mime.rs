//! MIME type helpers shared by routing, upload and sync.

use crate::models::MediaType;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Normalize MIME type by stripping parameters and lowercasing
/// (e.g. "Image/JPEG; charset=utf-8" -> "image/jpeg").
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .map(|s| s.trim())
        .unwrap_or(content_type)
        .to_lowercase()
}

/// Map provider short format codes ("jpg", "mp4", ...) to proper MIME types.
pub fn mime_from_format_code(code: &str) -> Option<&'static str> {
    let mime = match code.trim().trim_start_matches('.').to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "tif" | "tiff" => "image/tiff",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "json" => "application/json",
        "txt" => "text/plain",
        "csv" => "text/csv",
        _ => return None,
    };
    Some(mime)
}

/// Guess a MIME type from a storage key's extension.
pub fn guess_mime_from_key(key: &str) -> Option<String> {
    mime_guess::from_path(key)
        .first()
        .map(|m| m.essence_str().to_string())
}

/// Resolve whatever a provider reported into a proper MIME type.
///
/// Order: a value that already looks like `type/subtype` is kept, then the short-code
/// table, then an extension guess from the key, then `application/octet-stream`.
pub fn resolve_mime_type(reported: Option<&str>, key: &str) -> String {
    if let Some(reported) = reported.map(str::trim).filter(|r| !r.is_empty()) {
        if reported.contains('/') {
            return normalize_mime_type(reported);
        }
        if let Some(mime) = mime_from_format_code(reported) {
            return mime.to_string();
        }
    }

    guess_mime_from_key(key).unwrap_or_else(|| OCTET_STREAM.to_string())
}

/// Classify a content type into a media type.
pub fn classify_media_type(content_type: &str) -> MediaType {
    let normalized = normalize_mime_type(content_type);
    match normalized.split('/').next().unwrap_or_default() {
        "image" => MediaType::Image,
        "video" => MediaType::Video,
        "audio" => MediaType::Audio,
        "text" => MediaType::Document,
        "application" if is_document_subtype(&normalized) => MediaType::Document,
        _ => MediaType::Other,
    }
}

fn is_document_subtype(mime: &str) -> bool {
    matches!(
        mime,
        "application/pdf"
            | "application/msword"
            | "application/rtf"
            | "application/vnd.oasis.opendocument.text"
            | "application/vnd.oasis.opendocument.spreadsheet"
            | "application/vnd.ms-excel"
            | "application/vnd.ms-powerpoint"
    ) || mime.starts_with("application/vnd.openxmlformats-officedocument")
}

//! Error types module
//!
//! This module provides the core error types used throughout Stratus. Adapter failures,
//! routing limit violations, catalog misses and authorization failures are all unified
//! under the `AppError` enum so callers get one stable error code per failure kind.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

use crate::encryption::EncryptionError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like limit violations
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their response characteristics
pub trait ErrorMetadata {
    /// HTTP status code a handler should return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "FILE_TOO_LARGE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unsupported storage provider: {0}")]
    UnsupportedProvider(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Move failed: {0}")]
    MoveFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("Signed URL generation failed: {0}")]
    SignedUrlFailed(String),

    #[error("File too large: {0}")]
    FileTooLarge(String),

    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Storage account not found: {0}")]
    StorageNotFound(String),

    #[error("Media not found: {0}")]
    MediaNotFound(String),

    #[error("Media group not found: {0}")]
    GroupNotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

// Anything the encryptor rejects is a credential problem from the caller's point of view.
impl From<EncryptionError> for AppError {
    fn from(err: EncryptionError) -> Self {
        AppError::InvalidCredentials(err.to_string())
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
/// Keeps the ErrorMetadata impl small; client_message stays per-variant for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::UnsupportedProvider(_) => (
            400,
            "UNSUPPORTED_PROVIDER",
            false,
            Some("Use one of: s3, r2, b2, cloudinary"),
            false,
            LogLevel::Warn,
        ),
        AppError::InvalidCredentials(_) => (
            400,
            "INVALID_CREDENTIALS",
            false,
            Some("Re-enter the storage account credentials"),
            true,
            LogLevel::Warn,
        ),
        AppError::FileNotFound(_) => (
            404,
            "FILE_NOT_FOUND",
            false,
            Some("Verify the file still exists in the storage provider"),
            false,
            LogLevel::Debug,
        ),
        AppError::UploadFailed(_) => (
            502,
            "UPLOAD_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::DownloadFailed(_) => (
            502,
            "DOWNLOAD_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::DeleteFailed(_) => (
            502,
            "DELETE_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::MoveFailed(_) => (
            502,
            "MOVE_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::ListFailed(_) => (
            502,
            "LIST_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::SignedUrlFailed(_) => (
            502,
            "SIGNED_URL_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::FileTooLarge(_) => (
            413,
            "FILE_TOO_LARGE",
            false,
            Some("Reduce file size or choose another storage account"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidFileType(_) => (
            415,
            "INVALID_FILE_TYPE",
            false,
            Some("Check which media types the storage account accepts"),
            false,
            LogLevel::Debug,
        ),
        AppError::ConnectionFailed(_) => (
            502,
            "CONNECTION_FAILED",
            true,
            Some("Check bucket, endpoint and credentials, then retry"),
            false,
            LogLevel::Warn,
        ),
        AppError::StorageNotFound(_) => (
            404,
            "STORAGE_NOT_FOUND",
            false,
            Some("Configure an active default storage account"),
            false,
            LogLevel::Debug,
        ),
        AppError::MediaNotFound(_) => (
            404,
            "MEDIA_NOT_FOUND",
            false,
            Some("Verify the media ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::GroupNotFound(_) => (
            404,
            "GROUP_NOT_FOUND",
            false,
            Some("Verify the media group ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            None,
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::UnsupportedProvider(_) => "UnsupportedProvider",
            AppError::InvalidCredentials(_) => "InvalidCredentials",
            AppError::FileNotFound(_) => "FileNotFound",
            AppError::UploadFailed(_) => "UploadFailed",
            AppError::DownloadFailed(_) => "DownloadFailed",
            AppError::DeleteFailed(_) => "DeleteFailed",
            AppError::MoveFailed(_) => "MoveFailed",
            AppError::ListFailed(_) => "ListFailed",
            AppError::SignedUrlFailed(_) => "SignedUrlFailed",
            AppError::FileTooLarge(_) => "FileTooLarge",
            AppError::InvalidFileType(_) => "InvalidFileType",
            AppError::ConnectionFailed(_) => "ConnectionFailed",
            AppError::StorageNotFound(_) => "StorageNotFound",
            AppError::MediaNotFound(_) => "MediaNotFound",
            AppError::GroupNotFound(_) => "GroupNotFound",
            AppError::Forbidden(_) => "Forbidden",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Database(_) => "Database",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// True for limit violations the router may skip past (size ceiling, media type).
    pub fn is_limit_violation(&self) -> bool {
        matches!(self, AppError::FileTooLarge(_) | AppError::InvalidFileType(_))
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::UnsupportedProvider(ref provider) => {
                format!("Unsupported storage provider: {}", provider)
            }
            AppError::InvalidCredentials(_) => {
                "Storage account credentials are invalid".to_string()
            }
            AppError::FileNotFound(ref key) => format!("File not found: {}", key),
            AppError::UploadFailed(_) => "Failed to upload to storage".to_string(),
            AppError::DownloadFailed(_) => "Failed to download from storage".to_string(),
            AppError::DeleteFailed(_) => "Failed to delete from storage".to_string(),
            AppError::MoveFailed(_) => "Failed to move file in storage".to_string(),
            AppError::ListFailed(_) => "Failed to list storage contents".to_string(),
            AppError::SignedUrlFailed(_) => "Failed to generate signed URL".to_string(),
            AppError::FileTooLarge(ref msg) => msg.clone(),
            AppError::InvalidFileType(ref msg) => msg.clone(),
            AppError::ConnectionFailed(ref msg) => msg.clone(),
            AppError::StorageNotFound(ref msg) => msg.clone(),
            AppError::MediaNotFound(ref msg) => msg.clone(),
            AppError::GroupNotFound(ref msg) => msg.clone(),
            AppError::Forbidden(ref msg) => msg.clone(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

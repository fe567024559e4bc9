//! Upload, move and batch request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use super::media::MediaType;

/// Request a signed URL for a direct-to-provider upload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InitiateUploadRequest {
    /// Original filename
    #[validate(length(
        min = 1,
        max = 255,
        message = "Filename must be between 1 and 255 characters"
    ))]
    pub filename: String,
    /// Content type (MIME type)
    #[validate(length(
        min = 1,
        max = 255,
        message = "Content type must be between 1 and 255 characters"
    ))]
    pub content_type: String,
    /// File size in bytes
    #[validate(range(min = 1, message = "File size must be at least 1 byte"))]
    pub size_bytes: u64,
    #[serde(default)]
    pub media_group_id: Option<Uuid>,
    /// Explicit storage account; bypasses rules and fails if the account can't take the file
    #[serde(default)]
    pub storage_account_id: Option<Uuid>,
    #[serde(default)]
    pub folder_id: Option<Uuid>,
    /// Logical folder path inserted into the storage key
    #[serde(default)]
    #[validate(length(max = 512, message = "Folder path must be at most 512 characters"))]
    pub folder_path: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Everything the client needs to send the bytes to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct InitiateUploadResponse {
    pub media_id: Uuid,
    pub storage_account_id: Uuid,
    pub storage_key: String,
    pub upload_url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub form_fields: HashMap<String, String>,
    pub expires_at: DateTime<Utc>,
}

/// Client confirmation that the direct upload finished.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CompleteUploadRequest {
    #[validate(range(min = 1, message = "File size must be at least 1 byte"))]
    pub size_bytes: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    #[validate(url(message = "Public URL must be a valid URL"))]
    pub public_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
}

/// Metadata-only move; the object stays where it is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoveMediaRequest {
    #[serde(default)]
    pub folder_id: Option<Uuid>,
    #[serde(default)]
    pub media_group_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveMediaResponse {
    pub media_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub media_group_id: Option<Uuid>,
    /// Always false: moving never touches the provider object.
    pub physical_relocation: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchItemResult {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-item outcome of a batch delete.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchDeleteReport {
    pub results: Vec<BatchItemResult>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchDeleteReport {
    pub fn push(&mut self, id: Uuid, outcome: Result<(), String>) {
        match outcome {
            Ok(()) => {
                self.succeeded += 1;
                self.results.push(BatchItemResult { id, error: None });
            }
            Err(error) => {
                self.failed += 1;
                self.results.push(BatchItemResult {
                    id,
                    error: Some(error),
                });
            }
        }
    }
}

/// Routing input. Built by the orchestrator from an initiate request.
#[derive(Debug, Clone)]
pub struct RoutingRequest {
    pub media_type: MediaType,
    pub mime_type: String,
    pub size_bytes: u64,
    pub storage_account_id: Option<Uuid>,
    pub media_group_id: Option<Uuid>,
}

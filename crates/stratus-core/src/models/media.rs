use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// Media type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Document => "document",
            MediaType::Other => "other",
        }
    }
}

impl FromStr for MediaType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            "document" => Ok(MediaType::Document),
            "other" => Ok(MediaType::Other),
            other => Err(AppError::InvalidInput(format!(
                "Unknown media type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upload lifecycle. A record is `Pending` between signed-URL issue and completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Pending,
    Completed,
}

/// Catalog entry for one stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub id: Uuid,
    pub storage_account_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub filename: String,
    pub original_filename: String,
    pub storage_key: String,
    pub media_type: MediaType,
    pub mime_type: String,
    pub size_bytes: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_secs: Option<f64>,
    pub public_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub provider_id: Option<String>,
    pub provider_metadata: JsonValue,
    pub tags: Vec<String>,
    pub uploaded_by: Option<Uuid>,
    pub status: MediaStatus,
    pub access_count: i64,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Media {
    /// Fresh pending record, as created right after routing.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        storage_account_id: Uuid,
        group_id: Option<Uuid>,
        folder_id: Option<Uuid>,
        filename: String,
        original_filename: String,
        storage_key: String,
        media_type: MediaType,
        mime_type: String,
        uploaded_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            storage_account_id,
            folder_id,
            group_id,
            filename,
            original_filename,
            storage_key,
            media_type,
            mime_type,
            size_bytes: 0,
            width: None,
            height: None,
            duration_secs: None,
            public_url: None,
            thumbnail_url: None,
            provider_id: None,
            provider_metadata: JsonValue::Object(Default::default()),
            tags: Vec::new(),
            uploaded_by: Some(uploaded_by),
            status: MediaStatus::Pending,
            access_count: 0,
            download_count: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            deleted_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MediaStatus::Pending
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Mark completed with the final size.
    pub fn mark_completed(&mut self, size_bytes: i64) {
        let now = Utc::now();
        self.size_bytes = size_bytes;
        self.status = MediaStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }
}

/// Catalog listing filter. `None` fields don't constrain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaFilter {
    pub storage_account_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub media_type: Option<MediaType>,
    pub status: Option<MediaStatus>,
    pub uploaded_by: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    MediaFilter::DEFAULT_LIMIT
}

impl MediaFilter {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 100;

    /// Clamp limit/offset into the accepted range.
    pub fn normalized(mut self) -> Self {
        if self.limit <= 0 {
            self.limit = Self::DEFAULT_LIMIT;
        }
        self.limit = self.limit.min(Self::MAX_LIMIT);
        self.offset = self.offset.max(0);
        self
    }

    pub fn matches(&self, media: &Media) -> bool {
        self.storage_account_id
            .map_or(true, |id| media.storage_account_id == id)
            && self.group_id.map_or(true, |id| media.group_id == Some(id))
            && self.folder_id.map_or(true, |id| media.folder_id == Some(id))
            && self.media_type.map_or(true, |t| media.media_type == t)
            && self.status.map_or(true, |s| media.status == s)
            && self
                .uploaded_by
                .map_or(true, |u| media.uploaded_by == Some(u))
    }
}

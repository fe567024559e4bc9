use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::media::MediaType;

/// Declarative "this kind of upload goes to that account" rule.
///
/// Every condition that is set must match. Rules are evaluated by descending priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageRoutingRule {
    pub id: Uuid,
    pub name: String,
    pub priority: i32,
    pub media_group_id: Option<Uuid>,
    pub media_type: Option<MediaType>,
    pub min_size_bytes: Option<i64>,
    pub max_size_bytes: Option<i64>,
    pub mime_pattern: Option<String>,
    pub storage_account_id: Uuid,
    pub folder_prefix: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoutingRuleRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Rule name must be between 1 and 255 characters"
    ))]
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub media_group_id: Option<Uuid>,
    #[serde(default)]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub min_size_bytes: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub max_size_bytes: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub mime_pattern: Option<String>,
    pub storage_account_id: Uuid,
    #[serde(default)]
    pub folder_prefix: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CreateRoutingRuleRequest {
    pub fn into_rule(self) -> StorageRoutingRule {
        let now = Utc::now();
        StorageRoutingRule {
            id: Uuid::new_v4(),
            name: self.name,
            priority: self.priority,
            media_group_id: self.media_group_id,
            media_type: self.media_type,
            min_size_bytes: self.min_size_bytes,
            max_size_bytes: self.max_size_bytes,
            mime_pattern: self.mime_pattern,
            storage_account_id: self.storage_account_id,
            folder_prefix: self.folder_prefix,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named collection of media with an optional preferred storage account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaGroup {
    pub id: Uuid,
    pub name: String,
    pub default_storage_account_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

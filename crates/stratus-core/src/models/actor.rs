use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::media::Media;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

/// Already-authenticated caller, as handed over by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn member(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Member,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Uploader or admin.
    pub fn can_modify(&self, media: &Media) -> bool {
        self.is_admin() || media.uploaded_by == Some(self.user_id)
    }
}

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::field::{FieldKind, UpdatableField};

/// Fields a manager update may touch
pub const MANAGER_UPDATE_FIELDS: &[UpdatableField] =
    &[("name", FieldKind::OptionalText), ("status", FieldKind::Text)];

pub const MANAGER_ROLE: &str = "MANAGER";
pub const MANAGER_STATUS_ACTIVE: &str = "ACTIVE";

/// Manager-to-office assignment within a tenant.
///
/// At most one manager is expected per office; nothing in the store enforces
/// it, so lookups by office treat the first match as authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manager {
    pub org_alias: String,
    pub user_id: String,
    pub manager_email: String,
    pub name: Option<String>,
    pub role: String,
    pub assigned_office_id: Option<String>,
    pub status: String,
    pub created_at: i64,
}

impl Manager {
    pub fn new(org_alias: &str, email: &str, name: Option<String>, office_id: Option<String>) -> Self {
        Self {
            org_alias: org_alias.to_string(),
            user_id: Uuid::new_v4().to_string(),
            manager_email: email.to_string(),
            name,
            role: MANAGER_ROLE.to_string(),
            assigned_office_id: office_id,
            status: MANAGER_STATUS_ACTIVE.to_string(),
            created_at: Utc::now().timestamp(),
        }
    }

    /// Assigned office id, treating an empty string as unassigned
    pub fn office_id(&self) -> Option<&str> {
        self.assigned_office_id.as_deref().filter(|id| !id.is_empty())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::field::{FieldKind, UpdatableField};

/// Fields a profile update may touch
pub const PROFILE_UPDATE_FIELDS: &[UpdatableField] =
    &[("name", FieldKind::Text), ("email", FieldKind::Text)];

/// Per-identity profile, keyed by the identity subject id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub company_id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub office_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

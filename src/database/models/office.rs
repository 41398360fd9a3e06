use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::TenantEntity;
use super::field::{FieldKind, UpdatableField};

/// Fields an office update may touch
pub const OFFICE_UPDATE_FIELDS: &[UpdatableField] =
    &[("name", FieldKind::Text), ("address", FieldKind::OptionalText)];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Office {
    pub org_alias: String,
    pub entity_id: String,
    pub office_id: String,
    pub name: String,
    pub address: Option<String>,
    pub created_at: i64,
}

impl Office {
    /// New office with a generated id
    pub fn new(org_alias: &str, name: &str, address: Option<String>) -> Self {
        let office_id = Uuid::new_v4().to_string();
        Self {
            org_alias: org_alias.to_string(),
            entity_id: TenantEntity::office(office_id.clone()).to_string(),
            office_id,
            name: name.to_string(),
            address,
            created_at: Utc::now().timestamp(),
        }
    }
}

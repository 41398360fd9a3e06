use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::entity::TenantEntity;

/// The single organization row of a tenant partition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub org_alias: String,
    pub entity_id: String,
    pub admin_email: String,
    pub admin_name: String,
    pub user_sub: Option<String>,
    pub verified: bool,
    pub created_at: i64,
}

impl Organization {
    pub fn new(org_alias: &str, admin_email: &str, user_sub: Option<String>) -> Self {
        Self {
            org_alias: org_alias.to_string(),
            entity_id: TenantEntity::Organization.to_string(),
            admin_email: admin_email.to_string(),
            admin_name: display_name_from_email(admin_email),
            user_sub,
            verified: true,
            created_at: Utc::now().timestamp(),
        }
    }
}

/// Local part of an e-mail address, used as the default display name
pub fn display_name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

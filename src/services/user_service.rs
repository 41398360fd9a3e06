use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info};

use super::{allowed_fields, require, ServiceError, ServiceResult};
use crate::database::models::user::PROFILE_UPDATE_FIELDS;
use crate::database::models::UserProfile;
use crate::database::{Item, ManagerRegistry, StoreResult, TenantDirectory, UserDirectory};
use crate::identity::{IdentityError, IdentityProvider, UserAttribute};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserList {
    pub company_id: String,
    pub user_count: usize,
    pub users: Vec<UserProfile>,
}

/// User directory reads and profile edits
#[derive(Clone)]
pub struct UserService {
    identity: Arc<dyn IdentityProvider>,
    users: UserDirectory,
    tenants: TenantDirectory,
    managers: ManagerRegistry,
}

impl UserService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        users: UserDirectory,
        tenants: TenantDirectory,
        managers: ManagerRegistry,
    ) -> Self {
        Self {
            identity,
            users,
            tenants,
            managers,
        }
    }

    pub async fn list(&self, company_id: &str) -> ServiceResult<UserList> {
        require(&[("companyId", company_id)])?;
        let users = self.users.by_company(company_id).await?;
        Ok(UserList {
            company_id: company_id.to_string(),
            user_count: users.len(),
            users,
        })
    }

    /// Update allow-listed profile fields. A changed e-mail becomes the new
    /// login: the identity is renamed and the tenant records that name the old
    /// address follow it. Returns the attributes written.
    pub async fn update_profile(&self, user_id: &str, updates: &Map<String, Value>) -> ServiceResult<Item> {
        require(&[("userId", user_id)])?;

        let mut fields = allowed_fields(updates, PROFILE_UPDATE_FIELDS)?;
        let profile = self
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let new_email = fields
            .get("email")
            .and_then(Value::as_str)
            .filter(|email| *email != profile.email)
            .map(str::to_string);
        if let Some(email) = &new_email {
            match self.identity.admin_get_user(email).await {
                Ok(_) => {
                    return Err(ServiceError::Conflict(format!("An account with e-mail {} already exists", email)));
                }
                Err(IdentityError::UserNotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        fields.insert("updatedAt".to_string(), json!(Utc::now()));
        let written = fields.clone();
        self.users
            .update(user_id, fields)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        if let Some(email) = new_email {
            let attributes = [UserAttribute::Email(email.clone()), UserAttribute::EmailVerified(true)];
            if let Err(e) = self
                .identity
                .admin_update_user_attributes(user_id, &attributes)
                .await
            {
                error!("Profile {} updated but identity e-mail change failed: {}", user_id, e);
                return Err(ServiceError::Partial(format!(
                    "Profile updated in directory but identity update failed: {}",
                    e
                )));
            }
            info!("Changed identity e-mail for {} to {}", user_id, email);
            self.follow_email(&profile, &email).await?;
        }

        Ok(written)
    }

    /// Re-point the organization admin and manager assignments of the
    /// profile's company from the old address to `email`
    async fn follow_email(&self, profile: &UserProfile, email: &str) -> ServiceResult<()> {
        let company = profile.company_id.as_str();
        match self.move_records(company, &profile.email, email).await {
            Ok(moved) => {
                info!("Moved {} tenant record(s) in {} to {}", moved, company, email);
                Ok(())
            }
            Err(e) => {
                error!("Identity {} renamed but tenant records in {} were not: {}", profile.user_id, company, e);
                Err(ServiceError::Partial(format!(
                    "Profile and identity updated but organization records were not: {}",
                    e
                )))
            }
        }
    }

    async fn move_records(&self, company: &str, old_email: &str, new_email: &str) -> StoreResult<usize> {
        let mut moved = 0;
        if let Some(org) = self.tenants.organization(company).await? {
            if org.admin_email == old_email && self.tenants.set_admin_email(company, new_email).await? {
                moved += 1;
            }
        }
        moved += self.managers.reassign_email(company, old_email, new_email).await?;
        Ok(moved)
    }
}

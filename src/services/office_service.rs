use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::{allowed_fields, require, ServiceError, ServiceResult};
use crate::database::models::manager::MANAGER_UPDATE_FIELDS;
use crate::database::models::office::OFFICE_UPDATE_FIELDS;
use crate::database::models::organization::display_name_from_email;
use crate::database::models::{Manager, Office};
use crate::database::{ManagerRegistry, TenantDirectory};
use crate::identity::{IdentityError, IdentityProvider};
use crate::types::{UpdateTarget, ADMIN_GROUP, MANAGER_GROUP};

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone)]
pub struct NewOffice {
    pub org_alias: String,
    pub office_name: String,
    pub address: Option<String>,
    pub manager_email: String,
    pub manager_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOffice {
    pub office_id: String,
    pub manager_user_id: String,
    pub identity_created: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedOffice {
    pub office_id: String,
    pub manager_email: Option<String>,
    pub identity_deleted: bool,
}

/// Office row joined with its manager, placeholders when unassigned
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeSummary {
    pub office_id: String,
    pub name: String,
    pub address: Option<String>,
    pub created_at: i64,
    pub manager_name: String,
    pub manager_email: String,
    pub manager_role: String,
    pub manager_status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeManager {
    pub user_id: String,
    pub manager_name: Option<String>,
    pub manager_email: String,
    pub manager_role: String,
    pub manager_status: String,
    pub assigned_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeDetail {
    pub office_id: String,
    pub name: String,
    pub address: Option<String>,
    pub created_at: i64,
    pub org_alias: String,
    pub entity_id: String,
    pub manager: Option<OfficeManager>,
}

/// Office and manager administration within a tenant
#[derive(Clone)]
pub struct OfficeService {
    identity: Arc<dyn IdentityProvider>,
    tenants: TenantDirectory,
    managers: ManagerRegistry,
}

impl OfficeService {
    pub fn new(identity: Arc<dyn IdentityProvider>, tenants: TenantDirectory, managers: ManagerRegistry) -> Self {
        Self {
            identity,
            tenants,
            managers,
        }
    }

    /// Identity work happens first so a provider failure leaves no rows behind.
    /// Store writes after that are not rolled back.
    pub async fn create(&self, request: NewOffice) -> ServiceResult<CreatedOffice> {
        require(&[
            ("orgAlias", request.org_alias.as_str()),
            ("officeName", request.office_name.as_str()),
            ("managerEmail", request.manager_email.as_str()),
        ])?;

        let email = request.manager_email.trim();
        let manager_name = request
            .manager_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| display_name_from_email(email));

        let identity_created = match self.identity.admin_get_user(email).await {
            Ok(_) => {
                info!("Reusing existing identity {}", email);
                false
            }
            Err(IdentityError::UserNotFound) => {
                self.identity
                    .admin_create_user(email, email, Some(&manager_name))
                    .await?;
                true
            }
            Err(e) => return Err(e.into()),
        };
        self.identity.ensure_group(MANAGER_GROUP).await?;
        self.identity.add_user_to_group(email, MANAGER_GROUP).await?;

        let office = Office::new(&request.org_alias, &request.office_name, request.address);
        self.tenants.put_office(&office).await?;

        let manager = Manager::new(
            &request.org_alias,
            email,
            Some(manager_name),
            Some(office.office_id.clone()),
        );
        self.managers.put(&manager).await?;
        info!(
            "Created office {} in {} managed by {}",
            office.office_id, request.org_alias, email
        );

        Ok(CreatedOffice {
            office_id: office.office_id,
            manager_user_id: manager.user_id,
            identity_created,
        })
    }

    /// Apply allow-listed fields to an existing office or manager.
    /// Returns the names of the fields written.
    pub async fn update(
        &self,
        target: UpdateTarget,
        org_alias: &str,
        id: Option<&str>,
        updates: &Map<String, Value>,
    ) -> ServiceResult<Vec<String>> {
        require(&[("orgAlias", org_alias)])?;

        let (allowed, id_field) = match target {
            UpdateTarget::Office => (OFFICE_UPDATE_FIELDS, "officeId"),
            UpdateTarget::Manager => (MANAGER_UPDATE_FIELDS, "userId"),
        };
        let fields = allowed_fields(updates, allowed)?;
        let id = id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ServiceError::Validation(format!("{} is required for {} updates", id_field, target)))?;

        let updated_fields: Vec<String> = fields.keys().cloned().collect();
        let updated = match target {
            UpdateTarget::Office => self.tenants.update_office(org_alias, id, fields).await?,
            UpdateTarget::Manager => self.managers.update(org_alias, id, fields).await?,
        };
        if updated.is_none() {
            let kind = match target {
                UpdateTarget::Office => "Office",
                UpdateTarget::Manager => "Manager",
            };
            return Err(ServiceError::NotFound(format!("{} not found", kind)));
        }

        info!("Updated {} {} in {}: {:?}", target, id, org_alias, updated_fields);
        Ok(updated_fields)
    }

    /// Cleanup order: manager row, group membership, identity, office row
    pub async fn delete(&self, org_alias: &str, office_id: &str) -> ServiceResult<DeletedOffice> {
        require(&[("orgAlias", org_alias), ("officeId", office_id)])?;

        if self.tenants.office(org_alias, office_id).await?.is_none() {
            return Err(ServiceError::NotFound("Office not found".to_string()));
        }

        let mut deleted = DeletedOffice {
            office_id: office_id.to_string(),
            manager_email: None,
            identity_deleted: false,
        };

        if let Some(manager) = self.managers.find_by_office(org_alias, office_id).await? {
            self.managers.delete(org_alias, &manager.user_id).await?;
            let email = manager.manager_email;

            if let Err(e) = self.identity.remove_user_from_group(&email, MANAGER_GROUP).await {
                warn!("Could not remove {} from {}: {}", email, MANAGER_GROUP, e);
            }
            deleted.identity_deleted = self.retire_identity(&email).await;
            deleted.manager_email = Some(email);
        }

        self.tenants.delete_office(org_alias, office_id).await?;
        info!("Deleted office {} from {}", office_id, org_alias);
        Ok(deleted)
    }

    /// Delete the identity unless it still holds admin rights. Best-effort.
    async fn retire_identity(&self, email: &str) -> bool {
        let groups = match self.identity.list_groups_for_user(email).await {
            Ok(groups) => groups,
            Err(e) => {
                warn!("Could not list groups for {}, keeping identity: {}", email, e);
                return false;
            }
        };
        if groups.iter().any(|g| g == ADMIN_GROUP) {
            info!("Keeping identity {} since it is also an admin", email);
            return false;
        }
        match self.identity.admin_delete_user(email).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not delete identity {}: {}", email, e);
                false
            }
        }
    }

    pub async fn list(&self, org_alias: &str) -> ServiceResult<Vec<OfficeSummary>> {
        require(&[("orgAlias", org_alias)])?;

        let offices = self.tenants.offices(org_alias).await?;
        let managers = self.managers.list(org_alias).await?;

        Ok(offices
            .into_iter()
            .map(|office| {
                let manager = managers
                    .iter()
                    .find(|m| m.office_id() == Some(office.office_id.as_str()));
                let field = |value: Option<&str>| value.unwrap_or(NOT_AVAILABLE).to_string();
                OfficeSummary {
                    manager_name: field(manager.and_then(|m| m.name.as_deref())),
                    manager_email: field(manager.map(|m| m.manager_email.as_str())),
                    manager_role: field(manager.map(|m| m.role.as_str())),
                    manager_status: field(manager.map(|m| m.status.as_str())),
                    office_id: office.office_id,
                    name: office.name,
                    address: office.address,
                    created_at: office.created_at,
                }
            })
            .collect())
    }

    pub async fn detail(&self, org_alias: &str, office_id: &str) -> ServiceResult<OfficeDetail> {
        require(&[("orgAlias", org_alias), ("officeId", office_id)])?;

        let office = self
            .tenants
            .office(org_alias, office_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Office not found".to_string()))?;
        let manager = self
            .managers
            .find_by_office(org_alias, office_id)
            .await?
            .map(|m| OfficeManager {
                user_id: m.user_id,
                manager_name: m.name,
                manager_email: m.manager_email,
                manager_role: m.role,
                manager_status: m.status,
                assigned_at: m.created_at,
            });

        Ok(OfficeDetail {
            office_id: office.office_id,
            name: office.name,
            address: office.address,
            created_at: office.created_at,
            org_alias: office.org_alias,
            entity_id: office.entity_id,
            manager,
        })
    }
}

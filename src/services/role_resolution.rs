//! Effective role and scope for an authenticated identity.
//!
//! Group membership in the identity provider is only a claim; each role must
//! be corroborated by the tenant's own records before it grants access.

use thiserror::Error;
use tracing::{debug, warn};

use crate::database::{ManagerRegistry, TenantDirectory};
use crate::types::{Role, ADMIN_GROUP, MANAGER_GROUP};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("Access denied. Admin account not found in organization.")]
    AdminNotFound,

    #[error("Access denied. Manager account not assigned to any office.")]
    ManagerNotAssigned,

    #[error("Access denied. Your account is not registered in the system.")]
    Unrecognized,
}

/// Outcome of checking both roles for one identity within one tenant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleResolution {
    /// Tenant alias, set when the admin claim was corroborated
    pub admin_scope: Option<String>,
    /// Assigned office id (possibly empty), set when a manager record matched
    pub manager_office: Option<String>,
    /// Manager record id when a manager record matched
    pub manager_user_id: Option<String>,
    in_admin_group: bool,
    in_manager_group: bool,
}

impl RoleResolution {
    pub fn is_admin(&self) -> bool {
        self.admin_scope.is_some()
    }

    pub fn is_manager(&self) -> bool {
        self.manager_office.is_some()
    }

    pub fn has_access(&self) -> bool {
        self.is_admin() || self.is_manager()
    }

    /// Admin wins when both roles are corroborated
    pub fn role(&self) -> Option<Role> {
        if self.is_admin() {
            Some(Role::Admin)
        } else if self.is_manager() {
            Some(Role::Manager)
        } else {
            None
        }
    }

    fn assigned_office(&self) -> Option<&str> {
        self.manager_office.as_deref().filter(|id| !id.is_empty())
    }

    /// Assigned office when there is one, else the tenant alias for admins,
    /// else empty
    pub fn scope(&self) -> String {
        self.assigned_office()
            .or(self.admin_scope.as_deref())
            .unwrap_or_default()
            .to_string()
    }

    pub fn has_office(&self) -> bool {
        self.is_admin() || self.assigned_office().is_some()
    }

    /// The effective role, or why access is refused
    pub fn decision(&self) -> Result<Role, AccessDenied> {
        if let Some(role) = self.role() {
            return Ok(role);
        }
        if self.in_admin_group {
            Err(AccessDenied::AdminNotFound)
        } else if self.in_manager_group {
            Err(AccessDenied::ManagerNotAssigned)
        } else {
            Err(AccessDenied::Unrecognized)
        }
    }
}

/// Read-only resolver over the tenant directory and manager registry
#[derive(Clone)]
pub struct RoleResolver {
    tenants: TenantDirectory,
    managers: ManagerRegistry,
}

impl RoleResolver {
    pub fn new(tenants: TenantDirectory, managers: ManagerRegistry) -> Self {
        Self { tenants, managers }
    }

    /// Store failures count as "not corroborated" for that role only
    pub async fn resolve(&self, email: &str, groups: &[String], org_alias: &str) -> RoleResolution {
        let mut resolution = RoleResolution {
            in_admin_group: groups.iter().any(|g| g == ADMIN_GROUP),
            in_manager_group: groups.iter().any(|g| g == MANAGER_GROUP),
            ..RoleResolution::default()
        };

        if resolution.in_admin_group {
            match self.tenants.organization(org_alias).await {
                Ok(Some(org)) if org.admin_email == email => {
                    resolution.admin_scope = Some(org_alias.to_string());
                }
                Ok(Some(_)) => debug!("{} is not the admin of {}", email, org_alias),
                Ok(None) => debug!("Organization {} not found", org_alias),
                Err(e) => warn!("Admin lookup for {} in {} failed: {}", email, org_alias, e),
            }
        }

        if resolution.in_manager_group {
            match self.managers.find_by_email(org_alias, email).await {
                Ok(Some(manager)) => {
                    resolution.manager_office = Some(manager.assigned_office_id.clone().unwrap_or_default());
                    resolution.manager_user_id = Some(manager.user_id);
                }
                Ok(None) => debug!("No manager record for {} in {}", email, org_alias),
                Err(e) => warn!("Manager lookup for {} in {} failed: {}", email, org_alias, e),
            }
        }

        debug!(
            "Resolved {} in {}: admin={} manager={}",
            email,
            org_alias,
            resolution.is_admin(),
            resolution.is_manager()
        );
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Manager, Organization};
    use crate::database::InMemoryTable;
    use std::sync::Arc;

    async fn resolver() -> RoleResolver {
        let tenants = TenantDirectory::new(Arc::new(InMemoryTable::new("Office")));
        let managers = ManagerRegistry::new(Arc::new(InMemoryTable::new("Manager")));
        tenants.create_organization(&Organization::new("Acme", "a@x.com", None)).await.unwrap();
        managers.put(&Manager::new("Acme", "a@x.com", None, Some("office-1".into()))).await.unwrap();
        managers.put(&Manager::new("Acme", "idle@x.com", None, None)).await.unwrap();
        RoleResolver::new(tenants, managers)
    }

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|g| g.to_string()).collect()
    }

    #[tokio::test]
    async fn admin_only_is_scoped_to_tenant() {
        let tenants = TenantDirectory::new(Arc::new(InMemoryTable::new("Office")));
        tenants.create_organization(&Organization::new("Acme", "a@x.com", None)).await.unwrap();
        let resolver = RoleResolver::new(tenants, ManagerRegistry::new(Arc::new(InMemoryTable::new("Manager"))));

        let r = resolver.resolve("a@x.com", &groups(&["Admin"]), "Acme").await;
        assert_eq!(r.decision(), Ok(Role::Admin));
        assert_eq!(r.scope(), "Acme");
        assert!(r.has_office());
    }

    #[tokio::test]
    async fn admin_and_manager_prefers_admin_role_with_office_scope() {
        let r = resolver().await.resolve("a@x.com", &groups(&["Admin", "Manager"]), "Acme").await;
        assert_eq!(r.role(), Some(Role::Admin));
        assert_eq!(r.scope(), "office-1");
        assert!(r.has_office());
    }

    #[tokio::test]
    async fn manager_without_office_has_access_but_no_office() {
        let r = resolver().await.resolve("idle@x.com", &groups(&["Manager"]), "Acme").await;
        assert_eq!(r.decision(), Ok(Role::Manager));
        assert_eq!(r.scope(), "");
        assert!(!r.has_office());
    }

    #[tokio::test]
    async fn uncorroborated_claims_are_denied_with_reason() {
        let resolver = resolver().await;

        let r = resolver.resolve("b@x.com", &groups(&["Admin"]), "Acme").await;
        assert_eq!(r.decision(), Err(AccessDenied::AdminNotFound));

        let r = resolver.resolve("b@x.com", &groups(&["Manager"]), "Acme").await;
        assert_eq!(r.decision(), Err(AccessDenied::ManagerNotAssigned));

        let r = resolver.resolve("a@x.com", &[], "Acme").await;
        assert_eq!(r.decision(), Err(AccessDenied::Unrecognized));
    }

    #[tokio::test]
    async fn admin_of_another_tenant_is_not_admin_here() {
        let r = resolver().await.resolve("a@x.com", &groups(&["Admin"]), "Other").await;
        assert!(!r.has_access());
        assert_eq!(r.decision(), Err(AccessDenied::AdminNotFound));
    }
}

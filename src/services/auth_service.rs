use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::role_resolution::{RoleResolution, RoleResolver};
use super::{require, ServiceError, ServiceResult};
use crate::database::models::organization::display_name_from_email;
use crate::database::models::{Organization, UserProfile};
use crate::database::{Item, StoreError, TenantDirectory, UserDirectory};
use crate::identity::{AuthOutcome, AuthTokens, IdentityError, IdentityProvider, IdentityUser};
use crate::types::{Role, ADMIN_GROUP};

/// Tenant alias used when a confirmation does not name one
pub const DEFAULT_ORG_ALIAS: &str = "DefaultOrg";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResult {
    pub user_sub: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResult {
    pub email: String,
    pub org_alias: String,
}

fn organization_taken() -> ServiceError {
    ServiceError::Validation("Organization name already exists".to_string())
}

/// Identity and effective access returned after login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub org_alias: String,
    pub office_id: String,
    pub has_office: bool,
    pub cognito_groups: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginSession {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
    pub expires_in: i64,
    pub user: SessionUser,
}

#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(LoginSession),
    Challenge {
        challenge_name: String,
        session: String,
        username: String,
    },
}

#[derive(Debug, Serialize)]
pub struct PasswordChanged {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
    pub expires_in: i64,
    pub user: ChangedUser,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

/// Signup, confirmation, login and password flows
#[derive(Clone)]
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    tenants: TenantDirectory,
    users: UserDirectory,
    resolver: RoleResolver,
}

impl AuthService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        tenants: TenantDirectory,
        users: UserDirectory,
        resolver: RoleResolver,
    ) -> Self {
        Self {
            identity,
            tenants,
            users,
            resolver,
        }
    }

    pub async fn signup(&self, email: &str, password: &str, company_name: &str) -> ServiceResult<SignupResult> {
        require(&[("email", email), ("password", password), ("companyName", company_name)])?;

        match self.tenants.tenant_exists(company_name).await {
            Ok(true) => {
                return Err(ServiceError::Validation("Organization name already exists".to_string()));
            }
            Ok(false) => {}
            Err(e) => warn!("Could not check organization {}: {}", company_name, e),
        }

        let user_sub = self
            .identity
            .sign_up(email, password, email, &display_name_from_email(email))
            .await?;
        info!("Signed up {} for organization {}", email, company_name);

        Ok(SignupResult {
            user_sub,
            email: email.to_string(),
        })
    }

    /// Confirm the identity, grant it the admin group and record the organization
    pub async fn confirm(&self, email: &str, code: &str, company_name: Option<&str>) -> ServiceResult<ConfirmResult> {
        require(&[("email", email), ("code", code)])?;
        let org_alias = company_name
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .unwrap_or(DEFAULT_ORG_ALIAS);

        if !self.may_claim(org_alias, email).await? {
            return Err(organization_taken());
        }

        match self.identity.confirm_sign_up(email, code).await {
            Ok(()) => info!("Confirmed {}", email),
            Err(IdentityError::NotAuthorized(_)) => info!("{} was already confirmed", email),
            Err(e) => return Err(e.into()),
        }

        let user_sub = match self.identity.admin_get_user(email).await {
            Ok(user) => Some(user.sub),
            Err(e) => {
                warn!("Could not read subject id for {}: {}", email, e);
                None
            }
        };

        if let Err(e) = self.grant_admin(email).await {
            warn!("Could not add {} to {}: {}", email, ADMIN_GROUP, e);
        }

        let organization = Organization::new(org_alias, email, user_sub.clone());
        match self.tenants.create_organization(&organization).await {
            Ok(()) => info!("Created organization {}", org_alias),
            Err(StoreError::ConditionFailed { .. }) => {
                if !self.may_claim(org_alias, email).await? {
                    return Err(organization_taken());
                }
                if let Err(e) = self
                    .tenants
                    .reverify_organization(org_alias, user_sub.as_deref())
                    .await
                {
                    warn!("Could not re-verify organization {}: {}", org_alias, e);
                }
            }
            Err(e) => return Err(e.into()),
        }

        Ok(ConfirmResult {
            email: email.to_string(),
            org_alias: org_alias.to_string(),
        })
    }

    /// An alias is free, or already held by this admin
    async fn may_claim(&self, org_alias: &str, email: &str) -> ServiceResult<bool> {
        Ok(self
            .tenants
            .organization(org_alias)
            .await?
            .map_or(true, |org| org.admin_email == email))
    }

    async fn grant_admin(&self, email: &str) -> Result<(), IdentityError> {
        self.identity.ensure_group(ADMIN_GROUP).await?;
        self.identity.add_user_to_group(email, ADMIN_GROUP).await
    }

    pub async fn resend_code(&self, email: &str) -> ServiceResult<()> {
        require(&[("email", email)])?;
        self.identity.resend_confirmation_code(email).await?;
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str, org_alias: &str) -> ServiceResult<LoginOutcome> {
        require(&[("email", email), ("password", password), ("orgAlias", org_alias)])?;

        let tokens = match self.identity.initiate_auth(email, password).await {
            Ok(AuthOutcome::Authenticated(tokens)) => tokens,
            Ok(AuthOutcome::Challenge { name, session }) => {
                info!("{} must answer {} before logging in", email, name);
                return Ok(LoginOutcome::Challenge {
                    challenge_name: name,
                    session,
                    username: email.to_string(),
                });
            }
            Err(IdentityError::NotAuthorized(_)) => {
                return Err(IdentityError::NotAuthorized("Invalid username or password".to_string()).into());
            }
            Err(e) => return Err(e.into()),
        };

        let identity = self.identity.get_user(&tokens.access_token).await?;
        let resolution = self
            .resolver
            .resolve(&identity.email, &identity.groups, org_alias)
            .await;
        let role = resolution.decision().map_err(|denied| {
            warn!("Denied login for {} in {}: {}", email, org_alias, denied);
            denied
        })?;

        self.record_login(&identity, org_alias, role, &resolution).await;
        info!("{} logged in to {} as {}", email, org_alias, role);

        Ok(LoginOutcome::Authenticated(LoginSession {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            id_token: tokens.id_token,
            expires_in: tokens.expires_in,
            user: SessionUser {
                user_id: identity.sub.clone(),
                email: identity.email.clone(),
                name: identity
                    .name
                    .clone()
                    .unwrap_or_else(|| display_name_from_email(&identity.email)),
                role,
                org_alias: org_alias.to_string(),
                office_id: resolution.scope(),
                has_office: resolution.has_office(),
                cognito_groups: identity.groups.clone(),
            },
        }))
    }

    /// Create the profile on first login; later logins only refresh role and timestamps
    async fn record_login(&self, identity: &IdentityUser, org_alias: &str, role: Role, resolution: &RoleResolution) {
        let now = Utc::now();
        let result = match self.users.get(&identity.sub).await {
            Ok(Some(_)) => {
                let mut fields = Item::new();
                fields.insert("role".into(), json!(role));
                fields.insert("lastLogin".into(), json!(now));
                fields.insert("updatedAt".into(), json!(now));
                self.users.update(&identity.sub, fields).await.map(|_| ())
            }
            Ok(None) => {
                let office_ids = resolution
                    .manager_office
                    .iter()
                    .filter(|id| !id.is_empty())
                    .cloned()
                    .collect();
                let profile = UserProfile {
                    user_id: identity.sub.clone(),
                    company_id: org_alias.to_string(),
                    name: identity
                        .name
                        .clone()
                        .unwrap_or_else(|| display_name_from_email(&identity.email)),
                    email: identity.email.clone(),
                    role: role.to_string(),
                    office_ids,
                    created_at: now,
                    updated_at: now,
                    last_login: Some(now),
                };
                self.users.put(&profile).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!("Could not record login for {}: {}", identity.email, e);
        }
    }

    pub async fn change_temporary_password(
        &self,
        username: &str,
        new_password: &str,
        session: &str,
    ) -> ServiceResult<PasswordChanged> {
        require(&[("username", username), ("newPassword", new_password), ("session", session)])?;

        let AuthTokens {
            access_token,
            id_token,
            refresh_token,
            expires_in,
            ..
        } = self
            .identity
            .respond_new_password_challenge(username, new_password, session)
            .await?;
        let identity = self.identity.get_user(&access_token).await?;
        info!("{} set a permanent password", username);

        Ok(PasswordChanged {
            access_token,
            refresh_token,
            id_token,
            expires_in,
            user: ChangedUser {
                user_id: identity.sub,
                name: identity
                    .name
                    .unwrap_or_else(|| display_name_from_email(&identity.email)),
                email: identity.email,
            },
        })
    }

    pub async fn forgot_password(&self, username: &str) -> ServiceResult<()> {
        require(&[("username", username)])?;
        self.identity.forgot_password(username).await?;
        Ok(())
    }

    pub async fn confirm_forgot_password(&self, username: &str, code: &str, new_password: &str) -> ServiceResult<()> {
        require(&[("username", username), ("code", code), ("newPassword", new_password)])?;
        self.identity
            .confirm_forgot_password(username, code, new_password)
            .await?;
        Ok(())
    }

    pub async fn logout(&self, access_token: &str) -> ServiceResult<()> {
        require(&[("access_token", access_token)])?;
        match self.identity.global_sign_out(access_token).await {
            Ok(()) => Ok(()),
            Err(IdentityError::NotAuthorized(_)) => {
                Err(IdentityError::NotAuthorized("Token expired or invalid".to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

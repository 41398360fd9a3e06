//! Identity provider contract.
//!
//! Services depend on [`IdentityProvider`] only; the in-process
//! [`LocalIdentityProvider`] implements it, optionally persisting its
//! directory through a `Table`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::StoreError;

pub mod local;
pub mod password;

pub use local::{LocalIdentityProvider, OutboxKind, OutboxMessage};

/// Challenge issued to users created with a temporary password
pub const NEW_PASSWORD_REQUIRED: &str = "NEW_PASSWORD_REQUIRED";

pub type IdentityResult<T> = Result<T, IdentityError>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{0}")]
    NotAuthorized(String),

    #[error("User does not exist")]
    UserNotFound,

    #[error("User is not confirmed")]
    UserNotConfirmed,

    #[error("User already exists")]
    UsernameExists,

    #[error("Invalid verification code provided")]
    CodeMismatch,

    #[error("Verification code has expired")]
    ExpiredCode,

    #[error("{0}")]
    InvalidPassword(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("Attempt limit exceeded, please try after some time")]
    LimitExceeded,

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Identity provider failure: {0}")]
    Upstream(String),

    #[error("Identity store: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Unconfirmed,
    Confirmed,
    ForceChangePassword,
}

/// Identity as seen by the provider
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUser {
    pub sub: String,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub email_verified: bool,
    pub status: UserStatus,
    pub groups: Vec<String>,
}

impl IdentityUser {
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// Result of a password authentication
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Authenticated(AuthTokens),
    Challenge { name: String, session: String },
}

/// Attribute that can be changed through `admin_update_user_attributes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAttribute {
    Email(String),
    EmailVerified(bool),
    Name(String),
}

/// Operations taking a `username` also accept the user's subject id.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register an unconfirmed user and send a confirmation code. Returns the subject id.
    async fn sign_up(&self, username: &str, password: &str, email: &str, name: &str) -> IdentityResult<String>;

    /// Confirming an already confirmed user fails with `NotAuthorized`
    async fn confirm_sign_up(&self, username: &str, code: &str) -> IdentityResult<()>;

    async fn resend_confirmation_code(&self, username: &str) -> IdentityResult<()>;

    async fn initiate_auth(&self, username: &str, password: &str) -> IdentityResult<AuthOutcome>;

    async fn respond_new_password_challenge(
        &self,
        username: &str,
        new_password: &str,
        session: &str,
    ) -> IdentityResult<AuthTokens>;

    /// Resolve the identity behind a valid access token
    async fn get_user(&self, access_token: &str) -> IdentityResult<IdentityUser>;

    async fn admin_get_user(&self, username: &str) -> IdentityResult<IdentityUser>;

    /// Create a confirmed user holding a generated temporary password
    async fn admin_create_user(&self, username: &str, email: &str, name: Option<&str>) -> IdentityResult<IdentityUser>;

    async fn admin_delete_user(&self, username: &str) -> IdentityResult<()>;

    async fn admin_update_user_attributes(&self, username: &str, attributes: &[UserAttribute]) -> IdentityResult<()>;

    /// Create the group if it does not exist yet
    async fn ensure_group(&self, group: &str) -> IdentityResult<()>;

    /// `GroupNotFound` when the group has never been created
    async fn add_user_to_group(&self, username: &str, group: &str) -> IdentityResult<()>;

    async fn remove_user_from_group(&self, username: &str, group: &str) -> IdentityResult<()>;

    async fn list_groups_for_user(&self, username: &str) -> IdentityResult<Vec<String>>;

    async fn forgot_password(&self, username: &str) -> IdentityResult<()>;

    async fn confirm_forgot_password(&self, username: &str, code: &str, new_password: &str) -> IdentityResult<()>;

    /// Invalidate every token issued to the owner of `access_token`
    async fn global_sign_out(&self, access_token: &str) -> IdentityResult<()>;
}

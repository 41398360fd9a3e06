//! In-process identity provider.
//!
//! Holds users, groups and pending codes in memory and signs HS256 tokens
//! with the configured secret. Built with [`LocalIdentityProvider::persistent`]
//! every user and group is written through to a `Table` and reloaded on start.
//!
//! Codes and temporary passwords that a hosted provider would e-mail are kept
//! in a small, expiring outbox instead. It is the delivery channel for
//! development and tests only.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::password::{check_policy, confirmation_code, temporary_password, PasswordHash};
use super::{
    AuthOutcome, AuthTokens, IdentityError, IdentityProvider, IdentityResult, IdentityUser,
    UserAttribute, UserStatus, NEW_PASSWORD_REQUIRED,
};
use crate::config::IdentityConfig;
use crate::database::store::{from_item, to_item};
use crate::database::{ItemKey, SortOrder, Table};

const REFRESH_TOKEN_DAYS: i64 = 30;

const USER_PARTITION: &str = "user";
const GROUP_PARTITION: &str = "group";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    email: String,
    token_use: String,
    #[serde(rename = "cognito:groups", default)]
    groups: Vec<String>,
    /// Sign-out generation the token was issued under
    generation: u64,
    iat: i64,
    exp: i64,
    jti: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxKind {
    ConfirmationCode,
    PasswordReset,
    TemporaryPassword,
}

/// A secret that would have been delivered to the user out of band
#[derive(Debug, Clone)]
pub struct OutboxMessage {
    pub recipient: String,
    pub kind: OutboxKind,
    pub secret: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingCode {
    code: String,
    expires_at: i64,
    attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalUser {
    sub: String,
    username: String,
    email: String,
    name: Option<String>,
    email_verified: bool,
    status: UserStatus,
    password: PasswordHash,
    groups: BTreeSet<String>,
    confirmation: Option<PendingCode>,
    reset: Option<PendingCode>,
    generation: u64,
}

impl LocalUser {
    fn view(&self) -> IdentityUser {
        IdentityUser {
            sub: self.sub.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            email_verified: self.email_verified,
            status: self.status,
            groups: self.groups.iter().cloned().collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoredGroup {
    name: String,
}

/// Outstanding `NEW_PASSWORD_REQUIRED` challenge
struct ChallengeSession {
    username: String,
    expires_at: i64,
}

#[derive(Default)]
struct Directory {
    users: HashMap<String, LocalUser>,
    groups: HashSet<String>,
    /// challenge session id -> owner
    sessions: HashMap<String, ChallengeSession>,
    outbox: VecDeque<OutboxMessage>,
}

impl Directory {
    /// Usernames are accepted as is or by subject id
    fn key_for(&self, username: &str) -> IdentityResult<String> {
        if self.users.contains_key(username) {
            return Ok(username.to_string());
        }
        self.users
            .values()
            .find(|u| u.sub == username)
            .map(|u| u.username.clone())
            .ok_or(IdentityError::UserNotFound)
    }

    fn user(&self, username: &str) -> IdentityResult<&LocalUser> {
        let key = self.key_for(username)?;
        self.users.get(&key).ok_or(IdentityError::UserNotFound)
    }

    /// Working copy of a user; changes land through `LocalIdentityProvider::commit`
    fn user_copy(&self, username: &str) -> IdentityResult<LocalUser> {
        self.user(username).cloned()
    }

    fn prune_sessions(&mut self, now: i64) {
        self.sessions.retain(|_, session| session.expires_at > now);
    }
}

pub struct LocalIdentityProvider {
    settings: IdentityConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    directory: RwLock<Directory>,
    store: Option<Arc<dyn Table>>,
}

impl LocalIdentityProvider {
    /// Provider whose directory lives only in memory
    pub fn new(settings: IdentityConfig) -> IdentityResult<Self> {
        if settings.token_secret.is_empty() {
            return Err(IdentityError::Upstream("token signing secret is not configured".to_string()));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(settings.token_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.token_secret.as_bytes()),
            settings,
            directory: RwLock::new(Directory::default()),
            store: None,
        })
    }

    /// Provider that loads its users and groups from `store` and writes every
    /// change back to it. Challenge sessions and the outbox stay in memory.
    pub async fn persistent(settings: IdentityConfig, store: Arc<dyn Table>) -> IdentityResult<Self> {
        let mut provider = Self::new(settings)?;

        let mut directory = Directory::default();
        for item in store.query(USER_PARTITION, SortOrder::Ascending, None).await? {
            let user: LocalUser = from_item(store.name(), item)?;
            directory.users.insert(user.username.clone(), user);
        }
        for item in store.query(GROUP_PARTITION, SortOrder::Ascending, None).await? {
            let group: StoredGroup = from_item(store.name(), item)?;
            directory.groups.insert(group.name);
        }
        info!(
            "Loaded identity directory from {}: {} users, {} groups",
            store.name(),
            directory.users.len(),
            directory.groups.len()
        );

        provider.directory = RwLock::new(directory);
        provider.store = Some(store);
        Ok(provider)
    }

    /// Undelivered secrets still within their lifetime, oldest first
    pub async fn outbox(&self) -> Vec<OutboxMessage> {
        let now = Utc::now().timestamp();
        self.directory
            .read()
            .await
            .outbox
            .iter()
            .filter(|m| m.expires_at > now)
            .cloned()
            .collect()
    }

    /// Most recent live secret of `kind` delivered to `recipient`
    pub async fn last_secret(&self, recipient: &str, kind: OutboxKind) -> Option<String> {
        let now = Utc::now().timestamp();
        self.directory
            .read()
            .await
            .outbox
            .iter()
            .rev()
            .find(|m| m.recipient == recipient && m.kind == kind && m.expires_at > now)
            .map(|m| m.secret.clone())
    }

    fn deliver(&self, directory: &mut Directory, recipient: &str, kind: OutboxKind, secret: String) {
        let capacity = self.settings.outbox_capacity;
        if capacity == 0 {
            return;
        }
        let now = Utc::now().timestamp();
        directory.outbox.retain(|m| m.expires_at > now);
        while directory.outbox.len() >= capacity {
            directory.outbox.pop_front();
        }
        directory.outbox.push_back(OutboxMessage {
            recipient: recipient.to_string(),
            kind,
            secret,
            expires_at: now + self.settings.code_ttl_secs,
        });
    }

    /// Persist `user`, then make it the live record
    async fn commit(&self, directory: &mut Directory, user: LocalUser) -> IdentityResult<()> {
        if let Some(store) = &self.store {
            let item = to_item(store.name(), &user)?;
            store.put(&ItemKey::new(USER_PARTITION, &user.username), item).await?;
        }
        directory.users.insert(user.username.clone(), user);
        Ok(())
    }

    async fn forget(&self, directory: &mut Directory, username: &str) -> IdentityResult<()> {
        if let Some(store) = &self.store {
            store.delete(&ItemKey::new(USER_PARTITION, username)).await?;
        }
        directory.users.remove(username);
        Ok(())
    }

    fn new_code(&self) -> PendingCode {
        PendingCode {
            code: confirmation_code(),
            expires_at: Utc::now().timestamp() + self.settings.code_ttl_secs,
            attempts: 0,
        }
    }

    fn check_code(&self, pending: &mut Option<PendingCode>, code: &str) -> IdentityResult<()> {
        let Some(current) = pending.as_mut() else {
            return Err(IdentityError::CodeMismatch);
        };
        if current.attempts >= self.settings.max_code_attempts {
            return Err(IdentityError::LimitExceeded);
        }
        if Utc::now().timestamp() > current.expires_at {
            return Err(IdentityError::ExpiredCode);
        }
        if current.code != code {
            current.attempts += 1;
            return Err(IdentityError::CodeMismatch);
        }
        *pending = None;
        Ok(())
    }

    fn check_password(&self, password: &str) -> IdentityResult<()> {
        check_policy(password, self.settings.min_password_length).map_err(IdentityError::InvalidPassword)
    }

    fn sign(&self, user: &LocalUser, token_use: &str, ttl: Duration) -> IdentityResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.sub.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            token_use: token_use.to_string(),
            groups: user.groups.iter().cloned().collect(),
            generation: user.generation,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| IdentityError::Upstream(format!("token generation failed: {}", e)))
    }

    fn issue_tokens(&self, user: &LocalUser) -> IdentityResult<AuthTokens> {
        let ttl = Duration::seconds(self.settings.access_token_ttl_secs);
        Ok(AuthTokens {
            access_token: self.sign(user, "access", ttl)?,
            id_token: self.sign(user, "id", ttl)?,
            refresh_token: self.sign(user, "refresh", Duration::days(REFRESH_TOKEN_DAYS))?,
            expires_in: self.settings.access_token_ttl_secs,
            token_type: "Bearer".to_string(),
        })
    }

    /// Decode an access token and check it has not been revoked. Tokens
    /// follow the subject id, so they survive a username change.
    fn verify_access<'a>(&self, directory: &'a Directory, token: &str) -> IdentityResult<&'a LocalUser> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => IdentityError::NotAuthorized("Access Token has expired".to_string()),
                _ => IdentityError::NotAuthorized("Invalid Access Token".to_string()),
            })?
            .claims;

        if claims.token_use != "access" {
            return Err(IdentityError::NotAuthorized("Invalid Access Token".to_string()));
        }
        let user = directory
            .users
            .values()
            .find(|u| u.sub == claims.sub)
            .ok_or_else(|| IdentityError::NotAuthorized("Invalid Access Token".to_string()))?;
        if user.generation != claims.generation {
            return Err(IdentityError::NotAuthorized("Access Token has been revoked".to_string()));
        }
        Ok(user)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(&self, username: &str, password: &str, email: &str, name: &str) -> IdentityResult<String> {
        self.check_password(password)?;
        let mut directory = self.directory.write().await;
        if directory.users.contains_key(username) {
            return Err(IdentityError::UsernameExists);
        }

        let pending = self.new_code();
        let code = pending.code.clone();
        let sub = Uuid::new_v4().to_string();
        let user = LocalUser {
            sub: sub.clone(),
            username: username.to_string(),
            email: email.to_string(),
            name: Some(name.to_string()),
            email_verified: false,
            status: UserStatus::Unconfirmed,
            password: PasswordHash::new(password),
            groups: BTreeSet::new(),
            confirmation: Some(pending),
            reset: None,
            generation: 0,
        };
        self.commit(&mut directory, user).await?;
        self.deliver(&mut directory, email, OutboxKind::ConfirmationCode, code);
        info!("Registered identity {}", username);
        Ok(sub)
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> IdentityResult<()> {
        let mut directory = self.directory.write().await;
        let mut user = directory.user_copy(username)?;
        if user.status != UserStatus::Unconfirmed {
            return Err(IdentityError::NotAuthorized(
                "User cannot be confirmed. Current status is CONFIRMED".to_string(),
            ));
        }
        let checked = self.check_code(&mut user.confirmation, code);
        if checked.is_ok() {
            user.status = UserStatus::Confirmed;
            user.email_verified = true;
        }
        // Failed attempts count towards the limit, so they are stored too
        self.commit(&mut directory, user).await?;
        checked?;

        info!("Confirmed identity {}", username);
        Ok(())
    }

    async fn resend_confirmation_code(&self, username: &str) -> IdentityResult<()> {
        let mut directory = self.directory.write().await;
        let mut user = directory.user_copy(username)?;
        if user.status != UserStatus::Unconfirmed {
            return Err(IdentityError::InvalidParameter("User is already confirmed.".to_string()));
        }
        let pending = self.new_code();
        let code = pending.code.clone();
        user.confirmation = Some(pending);
        let email = user.email.clone();
        self.commit(&mut directory, user).await?;
        self.deliver(&mut directory, &email, OutboxKind::ConfirmationCode, code);
        Ok(())
    }

    async fn initiate_auth(&self, username: &str, password: &str) -> IdentityResult<AuthOutcome> {
        let mut directory = self.directory.write().await;
        let user = directory.user(username)?;
        if !user.password.verify(password) {
            debug!("Password mismatch for {}", username);
            return Err(IdentityError::NotAuthorized("Incorrect username or password.".to_string()));
        }

        match user.status {
            UserStatus::Unconfirmed => Err(IdentityError::UserNotConfirmed),
            UserStatus::ForceChangePassword => {
                let owner = user.username.clone();
                let now = Utc::now().timestamp();
                directory.prune_sessions(now);
                // One outstanding challenge per user
                directory.sessions.retain(|_, session| session.username != owner);

                let session = Uuid::new_v4().to_string();
                directory.sessions.insert(
                    session.clone(),
                    ChallengeSession {
                        username: owner,
                        expires_at: now + self.settings.session_ttl_secs,
                    },
                );
                Ok(AuthOutcome::Challenge {
                    name: NEW_PASSWORD_REQUIRED.to_string(),
                    session,
                })
            }
            UserStatus::Confirmed => Ok(AuthOutcome::Authenticated(self.issue_tokens(user)?)),
        }
    }

    async fn respond_new_password_challenge(
        &self,
        username: &str,
        new_password: &str,
        session: &str,
    ) -> IdentityResult<AuthTokens> {
        self.check_password(new_password)?;
        let mut directory = self.directory.write().await;
        directory.prune_sessions(Utc::now().timestamp());
        let key = directory.key_for(username)?;
        if directory.sessions.get(session).map(|s| s.username.as_str()) != Some(key.as_str()) {
            return Err(IdentityError::NotAuthorized("Invalid session for the user.".to_string()));
        }

        let mut user = directory.user_copy(&key)?;
        user.password = PasswordHash::new(new_password);
        user.status = UserStatus::Confirmed;
        let tokens = self.issue_tokens(&user)?;
        self.commit(&mut directory, user).await?;
        directory.sessions.remove(session);
        info!("Identity {} replaced its temporary password", username);
        Ok(tokens)
    }

    async fn get_user(&self, access_token: &str) -> IdentityResult<IdentityUser> {
        let directory = self.directory.read().await;
        Ok(self.verify_access(&directory, access_token)?.view())
    }

    async fn admin_get_user(&self, username: &str) -> IdentityResult<IdentityUser> {
        let directory = self.directory.read().await;
        Ok(directory.user(username)?.view())
    }

    async fn admin_create_user(&self, username: &str, email: &str, name: Option<&str>) -> IdentityResult<IdentityUser> {
        let mut directory = self.directory.write().await;
        if directory.users.contains_key(username) {
            return Err(IdentityError::UsernameExists);
        }

        let temporary = temporary_password();
        let user = LocalUser {
            sub: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            name: name.map(str::to_string),
            email_verified: true,
            status: UserStatus::ForceChangePassword,
            password: PasswordHash::new(&temporary),
            groups: BTreeSet::new(),
            confirmation: None,
            reset: None,
            generation: 0,
        };
        let view = user.view();
        self.commit(&mut directory, user).await?;
        self.deliver(&mut directory, email, OutboxKind::TemporaryPassword, temporary);
        info!("Created identity {} with a temporary password", username);
        Ok(view)
    }

    async fn admin_delete_user(&self, username: &str) -> IdentityResult<()> {
        let mut directory = self.directory.write().await;
        let key = directory.key_for(username)?;
        self.forget(&mut directory, &key).await?;
        directory.sessions.retain(|_, session| session.username != key);
        info!("Deleted identity {}", username);
        Ok(())
    }

    /// A user whose username is its e-mail address is renamed along with an
    /// e-mail change, so the new address becomes the login
    async fn admin_update_user_attributes(&self, username: &str, attributes: &[UserAttribute]) -> IdentityResult<()> {
        let mut directory = self.directory.write().await;
        let old_key = directory.key_for(username)?;
        let mut user = directory.user_copy(&old_key)?;
        let login_is_email = user.username == user.email;

        for attribute in attributes {
            match attribute {
                UserAttribute::Email(email) => user.email = email.clone(),
                UserAttribute::EmailVerified(verified) => user.email_verified = *verified,
                UserAttribute::Name(name) => user.name = Some(name.clone()),
            }
        }

        if !login_is_email || user.email == old_key {
            return self.commit(&mut directory, user).await;
        }
        if directory.users.contains_key(&user.email) {
            return Err(IdentityError::UsernameExists);
        }

        let new_key = user.email.clone();
        user.username = new_key.clone();
        self.commit(&mut directory, user).await?;
        self.forget(&mut directory, &old_key).await?;
        for session in directory.sessions.values_mut() {
            if session.username == old_key {
                session.username = new_key.clone();
            }
        }
        info!("Renamed identity {} to {}", old_key, new_key);
        Ok(())
    }

    async fn ensure_group(&self, group: &str) -> IdentityResult<()> {
        let mut directory = self.directory.write().await;
        if directory.groups.contains(group) {
            return Ok(());
        }
        if let Some(store) = &self.store {
            let item = to_item(store.name(), &StoredGroup { name: group.to_string() })?;
            store.put(&ItemKey::new(GROUP_PARTITION, group), item).await?;
        }
        directory.groups.insert(group.to_string());
        info!("Created group {}", group);
        Ok(())
    }

    async fn add_user_to_group(&self, username: &str, group: &str) -> IdentityResult<()> {
        let mut directory = self.directory.write().await;
        if !directory.groups.contains(group) {
            return Err(IdentityError::GroupNotFound(group.to_string()));
        }
        let mut user = directory.user_copy(username)?;
        if user.groups.insert(group.to_string()) {
            self.commit(&mut directory, user).await?;
        }
        Ok(())
    }

    async fn remove_user_from_group(&self, username: &str, group: &str) -> IdentityResult<()> {
        let mut directory = self.directory.write().await;
        if !directory.groups.contains(group) {
            return Err(IdentityError::GroupNotFound(group.to_string()));
        }
        let mut user = directory.user_copy(username)?;
        if user.groups.remove(group) {
            self.commit(&mut directory, user).await?;
        }
        Ok(())
    }

    async fn list_groups_for_user(&self, username: &str) -> IdentityResult<Vec<String>> {
        let directory = self.directory.read().await;
        Ok(directory.user(username)?.groups.iter().cloned().collect())
    }

    async fn forgot_password(&self, username: &str) -> IdentityResult<()> {
        let mut directory = self.directory.write().await;
        let mut user = directory.user_copy(username)?;
        if !user.email_verified {
            return Err(IdentityError::InvalidParameter(
                "Cannot reset password for the user as there is no registered/verified email".to_string(),
            ));
        }
        let pending = self.new_code();
        let code = pending.code.clone();
        user.reset = Some(pending);
        let email = user.email.clone();
        self.commit(&mut directory, user).await?;
        self.deliver(&mut directory, &email, OutboxKind::PasswordReset, code);
        Ok(())
    }

    async fn confirm_forgot_password(&self, username: &str, code: &str, new_password: &str) -> IdentityResult<()> {
        self.check_password(new_password)?;
        let mut directory = self.directory.write().await;
        let mut user = directory.user_copy(username)?;
        let checked = self.check_code(&mut user.reset, code);
        if checked.is_ok() {
            user.password = PasswordHash::new(new_password);
            if user.status == UserStatus::ForceChangePassword {
                user.status = UserStatus::Confirmed;
            }
        }
        self.commit(&mut directory, user).await?;
        checked?;

        info!("Identity {} reset its password", username);
        Ok(())
    }

    async fn global_sign_out(&self, access_token: &str) -> IdentityResult<()> {
        let mut directory = self.directory.write().await;
        let mut user = self.verify_access(&directory, access_token)?.clone();
        user.generation += 1;
        let username = user.username.clone();
        self.commit(&mut directory, user).await?;
        info!("Signed out identity {} everywhere", username);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::InMemoryTable;

    fn provider() -> LocalIdentityProvider {
        LocalIdentityProvider::new(AppConfig::development().identity).unwrap()
    }

    async fn confirmed(idp: &LocalIdentityProvider, email: &str) {
        idp.sign_up(email, "P@ssw0rd!", email, "a").await.unwrap();
        let code = idp.last_secret(email, OutboxKind::ConfirmationCode).await.unwrap();
        idp.confirm_sign_up(email, &code).await.unwrap();
    }

    fn tokens(outcome: AuthOutcome) -> AuthTokens {
        match outcome {
            AuthOutcome::Authenticated(tokens) => tokens,
            AuthOutcome::Challenge { name, .. } => panic!("unexpected challenge {}", name),
        }
    }

    #[tokio::test]
    async fn empty_secret_is_rejected() {
        let mut settings = AppConfig::development().identity;
        settings.token_secret.clear();
        assert!(LocalIdentityProvider::new(settings).is_err());
    }

    #[tokio::test]
    async fn unconfirmed_users_cannot_log_in() {
        let idp = provider();
        idp.sign_up("a@x.com", "P@ssw0rd!", "a@x.com", "a").await.unwrap();
        let err = idp.initiate_auth("a@x.com", "P@ssw0rd!").await.unwrap_err();
        assert!(matches!(err, IdentityError::UserNotConfirmed));
        let err = idp.sign_up("a@x.com", "P@ssw0rd!", "a@x.com", "a").await.unwrap_err();
        assert!(matches!(err, IdentityError::UsernameExists));
    }

    #[tokio::test]
    async fn confirmation_checks_code_then_rejects_repeat() {
        let idp = provider();
        idp.sign_up("a@x.com", "P@ssw0rd!", "a@x.com", "a").await.unwrap();
        let code = idp.last_secret("a@x.com", OutboxKind::ConfirmationCode).await.unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        assert!(matches!(idp.confirm_sign_up("a@x.com", wrong).await, Err(IdentityError::CodeMismatch)));
        idp.confirm_sign_up("a@x.com", &code).await.unwrap();
        assert!(matches!(idp.confirm_sign_up("a@x.com", &code).await, Err(IdentityError::NotAuthorized(_))));
        assert!(matches!(
            idp.resend_confirmation_code("a@x.com").await,
            Err(IdentityError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn repeated_wrong_codes_hit_the_attempt_limit() {
        let idp = provider();
        idp.sign_up("a@x.com", "P@ssw0rd!", "a@x.com", "a").await.unwrap();
        let code = idp.last_secret("a@x.com", OutboxKind::ConfirmationCode).await.unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };
        for _ in 0..5 {
            let _ = idp.confirm_sign_up("a@x.com", wrong).await;
        }
        assert!(matches!(idp.confirm_sign_up("a@x.com", &code).await, Err(IdentityError::LimitExceeded)));
    }

    #[tokio::test]
    async fn tokens_resolve_to_user_until_global_sign_out() {
        let idp = provider();
        confirmed(&idp, "a@x.com").await;
        idp.ensure_group("Admin").await.unwrap();
        idp.add_user_to_group("a@x.com", "Admin").await.unwrap();

        let tokens = tokens(idp.initiate_auth("a@x.com", "P@ssw0rd!").await.unwrap());
        let user = idp.get_user(&tokens.access_token).await.unwrap();
        assert!(user.in_group("Admin"));
        assert!(user.email_verified);

        assert!(idp.get_user(&tokens.id_token).await.is_err());
        idp.global_sign_out(&tokens.access_token).await.unwrap();
        assert!(matches!(idp.get_user(&tokens.access_token).await, Err(IdentityError::NotAuthorized(_))));

        let fresh = self::tokens(idp.initiate_auth("a@x.com", "P@ssw0rd!").await.unwrap());
        assert!(idp.get_user(&fresh.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn admin_created_users_must_replace_temporary_password() {
        let idp = provider();
        idp.admin_create_user("m@x.com", "m@x.com", Some("m")).await.unwrap();
        let temporary = idp.last_secret("m@x.com", OutboxKind::TemporaryPassword).await.unwrap();

        let AuthOutcome::Challenge { name, session } = idp.initiate_auth("m@x.com", &temporary).await.unwrap() else {
            panic!("expected a challenge");
        };
        assert_eq!(name, NEW_PASSWORD_REQUIRED);
        assert!(matches!(
            idp.respond_new_password_challenge("m@x.com", "N3w-Passw0rd", "bogus").await,
            Err(IdentityError::NotAuthorized(_))
        ));
        idp.respond_new_password_challenge("m@x.com", "N3w-Passw0rd", &session).await.unwrap();
        assert!(matches!(idp.initiate_auth("m@x.com", "N3w-Passw0rd").await, Ok(AuthOutcome::Authenticated(_))));
    }

    #[tokio::test]
    async fn challenge_sessions_expire_and_are_replaced() {
        let mut settings = AppConfig::development().identity;
        settings.session_ttl_secs = -1;
        let idp = LocalIdentityProvider::new(settings).unwrap();
        idp.admin_create_user("m@x.com", "m@x.com", None).await.unwrap();
        let temporary = idp.last_secret("m@x.com", OutboxKind::TemporaryPassword).await.unwrap();

        let AuthOutcome::Challenge { session, .. } = idp.initiate_auth("m@x.com", &temporary).await.unwrap() else {
            panic!("expected a challenge");
        };
        assert!(matches!(
            idp.respond_new_password_challenge("m@x.com", "N3w-Passw0rd", &session).await,
            Err(IdentityError::NotAuthorized(_))
        ));
        assert!(idp.directory.read().await.sessions.is_empty());

        let idp = provider();
        idp.admin_create_user("m@x.com", "m@x.com", None).await.unwrap();
        let temporary = idp.last_secret("m@x.com", OutboxKind::TemporaryPassword).await.unwrap();
        for _ in 0..3 {
            idp.initiate_auth("m@x.com", &temporary).await.unwrap();
        }
        assert_eq!(idp.directory.read().await.sessions.len(), 1);
    }

    #[tokio::test]
    async fn outbox_keeps_only_the_newest_live_secrets() {
        let mut settings = AppConfig::development().identity;
        settings.outbox_capacity = 2;
        let idp = LocalIdentityProvider::new(settings).unwrap();
        for email in ["a@x.com", "b@x.com", "c@x.com"] {
            idp.sign_up(email, "P@ssw0rd!", email, "n").await.unwrap();
        }
        let recipients: Vec<_> = idp.outbox().await.into_iter().map(|m| m.recipient).collect();
        assert_eq!(recipients, vec!["b@x.com", "c@x.com"]);
        assert!(idp.last_secret("a@x.com", OutboxKind::ConfirmationCode).await.is_none());

        let mut settings = AppConfig::development().identity;
        settings.code_ttl_secs = -1;
        let idp = LocalIdentityProvider::new(settings).unwrap();
        idp.sign_up("a@x.com", "P@ssw0rd!", "a@x.com", "a").await.unwrap();
        assert!(idp.outbox().await.is_empty());
    }

    #[tokio::test]
    async fn email_change_renames_an_email_login() {
        let idp = provider();
        confirmed(&idp, "a@x.com").await;
        let token = tokens(idp.initiate_auth("a@x.com", "P@ssw0rd!").await.unwrap()).access_token;
        let sub = idp.admin_get_user("a@x.com").await.unwrap().sub;

        idp.admin_update_user_attributes(&sub, &[UserAttribute::Email("b@x.com".into())])
            .await
            .unwrap();
        assert!(matches!(idp.admin_get_user("a@x.com").await, Err(IdentityError::UserNotFound)));
        assert!(matches!(idp.initiate_auth("b@x.com", "P@ssw0rd!").await, Ok(AuthOutcome::Authenticated(_))));
        assert_eq!(idp.get_user(&token).await.unwrap().username, "b@x.com");
        idp.global_sign_out(&token).await.unwrap();
        assert!(idp.get_user(&token).await.is_err());

        confirmed(&idp, "c@x.com").await;
        assert!(matches!(
            idp.admin_update_user_attributes("c@x.com", &[UserAttribute::Email("b@x.com".into())]).await,
            Err(IdentityError::UsernameExists)
        ));
        assert_eq!(idp.admin_get_user("c@x.com").await.unwrap().email, "c@x.com");
    }

    #[tokio::test]
    async fn persistent_directory_survives_a_restart() {
        let table: Arc<dyn Table> = Arc::new(InMemoryTable::new("Identity"));
        let settings = AppConfig::development().identity;

        let before = LocalIdentityProvider::persistent(settings.clone(), table.clone()).await.unwrap();
        confirmed(&before, "a@x.com").await;
        before.ensure_group("Admin").await.unwrap();
        before.add_user_to_group("a@x.com", "Admin").await.unwrap();
        before.admin_create_user("m@x.com", "m@x.com", None).await.unwrap();
        before.admin_delete_user("m@x.com").await.unwrap();
        let token = tokens(before.initiate_auth("a@x.com", "P@ssw0rd!").await.unwrap()).access_token;

        let after = LocalIdentityProvider::persistent(settings, table).await.unwrap();
        assert!(matches!(after.initiate_auth("a@x.com", "P@ssw0rd!").await, Ok(AuthOutcome::Authenticated(_))));
        assert_eq!(after.list_groups_for_user("a@x.com").await.unwrap(), vec!["Admin".to_string()]);
        assert!(after.get_user(&token).await.is_ok());
        assert!(matches!(after.admin_get_user("m@x.com").await, Err(IdentityError::UserNotFound)));
        after.ensure_group("Admin").await.unwrap();
        assert!(after.outbox().await.is_empty());
    }

    #[tokio::test]
    async fn group_membership_requires_existing_group() {
        let idp = provider();
        confirmed(&idp, "a@x.com").await;
        assert!(matches!(
            idp.add_user_to_group("a@x.com", "Manager").await,
            Err(IdentityError::GroupNotFound(_))
        ));
        idp.ensure_group("Manager").await.unwrap();
        idp.ensure_group("Manager").await.unwrap();
        idp.add_user_to_group("a@x.com", "Manager").await.unwrap();
        assert_eq!(idp.list_groups_for_user("a@x.com").await.unwrap(), vec!["Manager".to_string()]);
        idp.remove_user_from_group("a@x.com", "Manager").await.unwrap();
        assert!(idp.list_groups_for_user("a@x.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn forgot_password_flow_resets_credentials() {
        let idp = provider();
        confirmed(&idp, "a@x.com").await;
        idp.forgot_password("a@x.com").await.unwrap();
        let code = idp.last_secret("a@x.com", OutboxKind::PasswordReset).await.unwrap();

        assert!(matches!(
            idp.confirm_forgot_password("a@x.com", &code, "weak").await,
            Err(IdentityError::InvalidPassword(_))
        ));
        idp.confirm_forgot_password("a@x.com", &code, "An0ther-Pass").await.unwrap();
        assert!(matches!(
            idp.initiate_auth("a@x.com", "P@ssw0rd!").await,
            Err(IdentityError::NotAuthorized(_))
        ));
        assert!(idp.initiate_auth("a@x.com", "An0ther-Pass").await.is_ok());
    }
}

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use smart_office_api::app::{router, AppState, StorageHealth, Tables};
use smart_office_api::config::AppConfig;
use smart_office_api::device::local::LocalDeviceRegistry;
use smart_office_api::identity::local::{LocalIdentityProvider, OutboxKind};

pub const PASSWORD: &str = "Sup3r-secret!";

/// An in-process server on an ephemeral port with in-memory backends
pub struct TestServer {
    pub base_url: String,
    pub identity: Arc<LocalIdentityProvider>,
    client: reqwest::Client,
}

pub async fn spawn_server() -> Result<TestServer> {
    let config = AppConfig::development();
    let identity = Arc::new(LocalIdentityProvider::new(config.identity.clone())?);
    let devices = Arc::new(LocalDeviceRegistry::new([config.devices.policy_name.clone()])?);
    let state = AppState::new(
        &config,
        Tables::in_memory(&config.tables),
        identity.clone(),
        devices,
        StorageHealth::Memory,
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let base_url = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(state)).await;
    });

    Ok(TestServer {
        base_url,
        identity,
        client: reqwest::Client::new(),
    })
}

impl TestServer {
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut request = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let res = request.send().await?;
        let status = res.status();
        let body = res.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::POST, path, token, Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::DELETE, path, Some(token), Some(body)).await
    }

    /// Latest secret the identity provider "e-mailed" to `email`
    pub async fn secret(&self, email: &str, kind: OutboxKind) -> Result<String> {
        self.identity
            .last_secret(email, kind)
            .await
            .with_context(|| format!("no {:?} delivered to {}", kind, email))
    }

    pub async fn login(&self, email: &str, password: &str, org_alias: &str) -> Result<(StatusCode, Value)> {
        self.post(
            "/auth/login",
            None,
            json!({ "email": email, "password": password, "orgAlias": org_alias }),
        )
        .await
    }

    /// Sign up and confirm an administrator for `org_alias`, returning an access token
    pub async fn admin_session(&self, email: &str, org_alias: &str) -> Result<String> {
        let (status, body) = self
            .post(
                "/auth/signup",
                None,
                json!({ "email": email, "password": PASSWORD, "companyName": org_alias }),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "signup failed: {}", body);

        let code = self.secret(email, OutboxKind::ConfirmationCode).await?;
        let (status, body) = self
            .post(
                "/auth/confirm",
                None,
                json!({ "email": email, "code": code, "companyName": org_alias }),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "confirm failed: {}", body);

        let (status, body) = self.login(email, PASSWORD, org_alias).await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed: {}", body);
        access_token(&body)
    }

    /// Create an office with a fresh manager identity, returning the office id
    pub async fn create_office(&self, token: &str, org_alias: &str, name: &str, manager_email: &str) -> Result<String> {
        let (status, body) = self
            .post(
                "/api/offices",
                Some(token),
                json!({
                    "orgAlias": org_alias,
                    "officeName": name,
                    "address": "1 Main St",
                    "managerEmail": manager_email,
                    "managerName": "Mia Manager"
                }),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "create office failed: {}", body);
        body["data"]["officeId"]
            .as_str()
            .map(str::to_string)
            .context("officeId missing")
    }

    /// Answer the temporary-password challenge of a new manager, then log in
    pub async fn manager_session(&self, email: &str, org_alias: &str) -> Result<(StatusCode, Value)> {
        let temporary = self.secret(email, OutboxKind::TemporaryPassword).await?;
        let (status, body) = self.login(email, &temporary, org_alias).await?;
        anyhow::ensure!(status == StatusCode::OK, "temporary login failed: {}", body);
        anyhow::ensure!(
            body["data"]["challengeName"] == "NEW_PASSWORD_REQUIRED",
            "expected challenge: {}",
            body
        );

        let session = body["data"]["session"].as_str().context("session missing")?;
        let (status, body) = self
            .post(
                "/auth/change-password",
                None,
                json!({ "username": email, "newPassword": PASSWORD, "session": session }),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "change password failed: {}", body);

        self.login(email, PASSWORD, org_alias).await
    }
}

pub fn access_token(body: &Value) -> Result<String> {
    body["data"]["access_token"]
        .as_str()
        .map(str::to_string)
        .with_context(|| format!("access_token missing: {}", body))
}

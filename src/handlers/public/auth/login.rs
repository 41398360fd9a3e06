// handlers/public/auth/login.rs - POST /auth/login handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::{LoginOutcome, LoginSession};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub org_alias: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LoginResponse {
    Session(LoginSession),
    #[serde(rename_all = "camelCase")]
    Challenge {
        challenge_name: String,
        session: String,
        username: String,
        message: String,
    },
}

/// POST /auth/login - Authenticate and resolve the caller's role in a tenant
///
/// ```json
/// { "email": "a@x.com", "password": "P@ssw0rd!", "orgAlias": "Acme" }
/// ```
///
/// Success returns `access_token`, `refresh_token`, `id_token` and a `user`
/// block with `role`, `officeId` (access scope) and `hasOffice`. Identities
/// still on a temporary password get a `NEW_PASSWORD_REQUIRED` challenge
/// instead, answered through `/auth/change-password`.
///
/// - 401: bad credentials
/// - 403: unconfirmed, or no role corroborated by the tenant's records
/// - 404: unknown user
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(body) = payload?;
    let outcome = state
        .auth
        .login(body.email.trim(), &body.password, body.org_alias.trim())
        .await?;

    let response = match outcome {
        LoginOutcome::Authenticated(session) => LoginResponse::Session(session),
        LoginOutcome::Challenge {
            challenge_name,
            session,
            username,
        } => LoginResponse::Challenge {
            challenge_name,
            session,
            username,
            message: "New password required".to_string(),
        },
    };
    Ok(ApiResponse::success(response))
}

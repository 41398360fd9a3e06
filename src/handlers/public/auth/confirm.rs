use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
    pub company_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    #[serde(default)]
    pub email: String,
}

/// POST /auth/confirm - Confirm signup and create the organization
///
/// Confirming an already confirmed identity is not an error; the
/// organization record is re-verified instead.
pub async fn confirm_post(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    let result = state
        .auth
        .confirm(body.email.trim(), body.code.trim(), body.company_name.as_deref())
        .await?;

    Ok(ApiResponse::success(json!({
        "message": "Account verified successfully",
        "email": result.email,
        "orgAlias": result.org_alias,
    })))
}

/// POST /auth/resend-code - Send a new confirmation code
pub async fn resend_code_post(
    State(state): State<AppState>,
    payload: Result<Json<ResendRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    state.auth.resend_code(body.email.trim()).await?;
    Ok(ApiResponse::success(json!({
        "message": "Verification code resent",
        "email": body.email.trim(),
    })))
}

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::PasswordChanged;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub session: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmForgotPasswordRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub code: String,
    #[serde(default, alias = "newPassword")]
    pub new_password: String,
}

/// POST /auth/change-password - Answer the new-password challenge with a permanent password
pub async fn change_password_post(
    State(state): State<AppState>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<PasswordChanged> {
    let Json(body) = payload?;
    let changed = state
        .auth
        .change_temporary_password(body.username.trim(), &body.new_password, &body.session)
        .await?;
    Ok(ApiResponse::success(changed))
}

/// POST /auth/forgot-password - Send a password reset code
pub async fn forgot_password_post(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    state.auth.forgot_password(body.username.trim()).await?;
    Ok(ApiResponse::success(json!({
        "message": "Password reset code sent"
    })))
}

/// POST /auth/confirm-forgot-password - Set a new password using the reset code
pub async fn confirm_forgot_password_post(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmForgotPasswordRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    state
        .auth
        .confirm_forgot_password(body.username.trim(), body.code.trim(), &body.new_password)
        .await?;
    Ok(ApiResponse::success(json!({
        "message": "Password has been reset successfully"
    })))
}

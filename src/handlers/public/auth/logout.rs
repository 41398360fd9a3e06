use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub access_token: String,
}

/// POST /auth/logout - Revoke every token issued to the caller
pub async fn logout_post(
    State(state): State<AppState>,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    state.auth.logout(body.access_token.trim()).await?;
    Ok(ApiResponse::success(json!({
        "message": "Logged out successfully"
    })))
}

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::user_service::UserList;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    #[serde(default)]
    pub company_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub updates: Map<String, Value>,
}

/// GET /api/users?companyId= - User profiles of a company
pub async fn list_get(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<UserList> {
    let Query(query) = query?;
    Ok(ApiResponse::success(state.users.list(query.company_id.trim()).await?))
}

/// PUT /api/users/profile - Update a profile's name or e-mail
pub async fn profile_put(
    State(state): State<AppState>,
    payload: Result<Json<ProfileUpdateRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    let written = state
        .users
        .update_profile(body.user_id.trim(), &body.updates)
        .await?;
    Ok(ApiResponse::success(json!({
        "message": "Profile updated successfully",
        "updatedAttributes": written,
    })))
}

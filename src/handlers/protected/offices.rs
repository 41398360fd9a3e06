use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Extension, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::office_service::{NewOffice, OfficeSummary};
use crate::types::UpdateTarget;

const DELETE_OFFICE_ACTION: &str = "DELETE_OFFICE";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantQuery {
    #[serde(default)]
    pub org_alias: String,
    #[serde(default)]
    pub office_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfficeRequest {
    #[serde(default)]
    pub org_alias: String,
    #[serde(default)]
    pub office_name: String,
    pub address: Option<String>,
    #[serde(default)]
    pub manager_email: String,
    pub manager_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOfficeRequest {
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub org_alias: String,
    pub office_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub updates: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOfficeRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub org_alias: String,
    #[serde(default)]
    pub office_id: String,
}

/// GET /api/offices?orgAlias= - Offices of a tenant joined with their managers
pub async fn list_get(
    State(state): State<AppState>,
    query: Result<Query<TenantQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(query) = query?;
    let offices: Vec<OfficeSummary> = state.offices.list(query.org_alias.trim()).await?;
    Ok(ApiResponse::success(json!({
        "count": offices.len(),
        "offices": offices,
    })))
}

/// GET /api/offices/detail?orgAlias=&officeId= - One office with its manager
pub async fn detail_get(
    State(state): State<AppState>,
    query: Result<Query<TenantQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(query) = query?;
    let office = state
        .offices
        .detail(query.org_alias.trim(), query.office_id.trim())
        .await?;
    Ok(ApiResponse::success(json!({ "office": office })))
}

/// POST /api/offices - Create an office and its manager identity
///
/// ```json
/// { "orgAlias": "Acme", "officeName": "HQ", "address": "1 Main St",
///   "managerEmail": "m@x.com", "managerName": "Mia" }
/// ```
///
/// An existing identity for `managerEmail` is reused; otherwise one is
/// created with a temporary password.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    payload: Result<Json<CreateOfficeRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    info!("{} creating office {} in {}", auth_user.email, body.office_name, body.org_alias);

    let created = state
        .offices
        .create(NewOffice {
            org_alias: body.org_alias.trim().to_string(),
            office_name: body.office_name.trim().to_string(),
            address: body.address,
            manager_email: body.manager_email.trim().to_string(),
            manager_name: body.manager_name,
        })
        .await?;

    Ok(ApiResponse::success(json!({
        "message": "Office and manager created successfully",
        "officeId": created.office_id,
        "managerUserId": created.manager_user_id,
        "identityCreated": created.identity_created,
    })))
}

/// PUT /api/offices - Update allow-listed fields of an office or manager
///
/// `target` is `OFFICE` (fields `name`, `address`; needs `officeId`) or
/// `MANAGER` (fields `name`, `status`; needs `userId`).
pub async fn update_put(
    State(state): State<AppState>,
    payload: Result<Json<UpdateOfficeRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    let target: UpdateTarget = body.target.trim().parse().map_err(ApiError::bad_request)?;
    let id = match target {
        UpdateTarget::Office => body.office_id.as_deref(),
        UpdateTarget::Manager => body.user_id.as_deref(),
    };

    let updated_fields = state
        .offices
        .update(target, body.org_alias.trim(), id, &body.updates)
        .await?;
    Ok(ApiResponse::success(json!({
        "message": format!("{} updated successfully", target),
        "updatedFields": updated_fields,
    })))
}

/// DELETE /api/offices - Delete an office together with its manager
///
/// ```json
/// { "action": "DELETE_OFFICE", "orgAlias": "Acme", "officeId": "..." }
/// ```
pub async fn delete_office(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    payload: Result<Json<DeleteOfficeRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    if body.action != DELETE_OFFICE_ACTION {
        return Err(ApiError::bad_request(format!(
            "Invalid action. Expected {}",
            DELETE_OFFICE_ACTION
        )));
    }
    info!("{} deleting office {} in {}", auth_user.email, body.office_id, body.org_alias);

    let deleted = state
        .offices
        .delete(body.org_alias.trim(), body.office_id.trim())
        .await?;
    Ok(ApiResponse::success(json!({
        "message": "Office deleted successfully",
        "officeId": deleted.office_id,
        "managerEmail": deleted.manager_email,
        "identityDeleted": deleted.identity_deleted,
    })))
}

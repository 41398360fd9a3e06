use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Extension, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::app::AppState;
use crate::database::models::Room;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::room_service::{ProvisionedRoom, RoomList};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomQuery {
    #[serde(default)]
    pub office_id: String,
    #[serde(default)]
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    #[serde(default)]
    pub office_id: String,
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub org_alias: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdateRequest {
    #[serde(default)]
    pub office_id: String,
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub updates: Map<String, Value>,
}

/// POST /api/rooms - Provision a room with a new device identity
///
/// The private key in the response is not stored anywhere; it must be
/// delivered to the device by the caller. 409 if the room already exists.
pub async fn provision_post(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    payload: Result<Json<ProvisionRequest>, JsonRejection>,
) -> ApiResult<ProvisionedRoom> {
    let Json(body) = payload?;
    info!("{} provisioning room {} in office {}", auth_user.email, body.room_id, body.office_id);
    let provisioned = state
        .rooms
        .provision(body.org_alias.trim(), body.office_id.trim(), body.room_id.trim())
        .await?;
    Ok(ApiResponse::success(provisioned))
}

/// GET /api/rooms?officeId= - Rooms provisioned in an office
pub async fn list_get(
    State(state): State<AppState>,
    query: Result<Query<RoomQuery>, QueryRejection>,
) -> ApiResult<RoomList> {
    let Query(query) = query?;
    Ok(ApiResponse::success(state.rooms.list(query.office_id.trim()).await?))
}

/// GET /api/rooms/config?officeId=&roomId= - Current room configuration
pub async fn config_get(
    State(state): State<AppState>,
    query: Result<Query<RoomQuery>, QueryRejection>,
) -> ApiResult<Room> {
    let Query(query) = query?;
    let room = state
        .rooms
        .config(query.office_id.trim(), query.room_id.trim())
        .await?;
    Ok(ApiResponse::success(room))
}

/// PUT /api/rooms/config - Update allow-listed control fields of a room
pub async fn config_put(
    State(state): State<AppState>,
    payload: Result<Json<ConfigUpdateRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    let written = state
        .rooms
        .update_config(body.office_id.trim(), body.room_id.trim(), &body.updates)
        .await?;
    Ok(ApiResponse::success(json!({
        "message": "Room config updated successfully",
        "updatedAttributes": written,
    })))
}

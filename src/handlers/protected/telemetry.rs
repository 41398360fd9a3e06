use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::app::AppState;
use crate::database::models::SensorReading;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::telemetry_service::TelemetryWindow;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryQuery {
    #[serde(default)]
    pub room_id: String,
    pub limit: Option<usize>,
}

/// A device sample; everything besides `roomId` and `timestamp` is stored as-is
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingRequest {
    #[serde(default)]
    pub room_id: String,
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

/// GET /api/telemetry?roomId=&limit= - Latest readings of a room, oldest first
pub async fn telemetry_get(
    State(state): State<AppState>,
    query: Result<Query<TelemetryQuery>, QueryRejection>,
) -> ApiResult<TelemetryWindow> {
    let Query(query) = query?;
    let window = state
        .telemetry
        .recent(query.room_id.trim(), query.limit)
        .await?;
    Ok(ApiResponse::success(window))
}

/// POST /api/telemetry - Append one reading (millisecond timestamp, defaults to now)
pub async fn telemetry_post(
    State(state): State<AppState>,
    payload: Result<Json<ReadingRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    let reading = SensorReading {
        room_id: body.room_id.trim().to_string(),
        timestamp: body.timestamp.unwrap_or_else(|| Utc::now().timestamp_millis()),
        values: body.values,
    };
    state.telemetry.record(&reading).await?;
    Ok(ApiResponse::success(json!({
        "roomId": reading.room_id,
        "timestamp": reading.timestamp,
    })))
}

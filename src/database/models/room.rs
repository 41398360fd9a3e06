use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::field::{FieldKind, UpdatableField};
use crate::types::ConnectionStatus;

/// Configuration fields a room update may touch
pub const ROOM_CONFIG_FIELDS: &[UpdatableField] = &[
    ("temperatureMode", FieldKind::Text),
    ("humidityMode", FieldKind::Text),
    ("lightMode", FieldKind::Text),
    ("targetTemperature", FieldKind::Scalar),
    ("targetHumidity", FieldKind::Scalar),
    ("targetLight", FieldKind::Scalar),
    ("autoOnTime", FieldKind::OptionalText),
    ("autoOffTime", FieldKind::OptionalText),
];

/// A provisioned room bound to a device identity.
///
/// Control-mode fields are kept as JSON in `config`; updates are shape-checked
/// against `ROOM_CONFIG_FIELDS` before they are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: String,
    pub office_id: String,
    pub thing_name: String,
    pub certificate_arn: String,
    pub created_at: i64,
    pub connection_status: ConnectionStatus,
    #[serde(flatten)]
    pub config: Map<String, Value>,
}

impl Room {
    pub fn provisioned(office_id: &str, room_id: &str, thing_name: &str, certificate_arn: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            office_id: office_id.to_string(),
            thing_name: thing_name.to_string(),
            certificate_arn: certificate_arn.to_string(),
            created_at: Utc::now().timestamp(),
            connection_status: ConnectionStatus::Offline,
            config: default_config(),
        }
    }
}

/// Control-mode values every new room starts with
pub fn default_config() -> Map<String, Value> {
    let defaults = json!({
        "temperatureMode": "auto",
        "targetTemperature": 26,
        "humidityMode": "auto",
        "targetHumidity": 60,
        "lightMode": "auto",
        "targetLight": "300",
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

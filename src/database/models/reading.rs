use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One append-only sensor sample for a room
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub room_id: String,
    pub timestamp: i64,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl SensorReading {
    /// Zero-padded so lexical order of sort keys matches numeric order.
    /// Only meaningful for non-negative timestamps.
    pub fn sort_key(&self) -> String {
        format!("{:020}", self.timestamp)
    }
}

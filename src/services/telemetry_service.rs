use serde::Serialize;
use tracing::debug;

use super::{require, ServiceError, ServiceResult};
use crate::database::models::SensorReading;
use crate::database::TelemetryStore;

/// Readings for one room in chronological order
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryWindow {
    pub room_id: String,
    #[serde(rename = "data_count")]
    pub data_count: usize,
    pub data: Vec<SensorReading>,
}

#[derive(Clone)]
pub struct TelemetryService {
    readings: TelemetryStore,
    default_limit: usize,
}

impl TelemetryService {
    pub fn new(readings: TelemetryStore, default_limit: usize) -> Self {
        Self {
            readings,
            default_limit,
        }
    }

    pub async fn record(&self, reading: &SensorReading) -> ServiceResult<()> {
        require(&[("roomId", reading.room_id.as_str())])?;
        if reading.timestamp < 0 {
            return Err(ServiceError::Validation("timestamp must not be negative".to_string()));
        }
        self.readings.append(reading).await?;
        Ok(())
    }

    /// The most recent `limit` readings, oldest first
    pub async fn recent(&self, room_id: &str, limit: Option<usize>) -> ServiceResult<TelemetryWindow> {
        require(&[("roomId", room_id)])?;
        let limit = limit.unwrap_or(self.default_limit);

        let mut data = self.readings.latest(room_id, limit).await?;
        data.reverse();
        debug!("Read {} readings for room {}", data.len(), room_id);

        Ok(TelemetryWindow {
            room_id: room_id.to_string(),
            data_count: data.len(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryTable;
    use serde_json::{json, Map};
    use std::sync::Arc;

    fn reading(ts: i64) -> SensorReading {
        let mut values = Map::new();
        values.insert("temperature".into(), json!(20 + ts));
        SensorReading {
            room_id: "r1".into(),
            timestamp: ts,
            values,
        }
    }

    #[tokio::test]
    async fn recent_returns_latest_window_in_order() {
        let service = TelemetryService::new(TelemetryStore::new(Arc::new(InMemoryTable::new("SensorLog"))), 50);
        for ts in 1..=5 {
            service.record(&reading(ts)).await.unwrap();
        }

        let all = service.recent("r1", None).await.unwrap();
        assert_eq!(all.data.iter().map(|r| r.timestamp).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);

        let window = service.recent("r1", Some(2)).await.unwrap();
        assert_eq!(window.data_count, 2);
        assert_eq!(window.data.iter().map(|r| r.timestamp).collect::<Vec<_>>(), vec![4, 5]);
    }

    #[tokio::test]
    async fn negative_timestamps_are_rejected() {
        let service = TelemetryService::new(TelemetryStore::new(Arc::new(InMemoryTable::new("SensorLog"))), 50);
        assert!(matches!(service.record(&reading(-1)).await, Err(ServiceError::Validation(_))));
        assert!(matches!(service.record(&reading(-2)).await, Err(ServiceError::Validation(_))));
        service.record(&reading(0)).await.unwrap();

        let window = service.recent("r1", Some(usize::MAX)).await.unwrap();
        assert_eq!(window.data.iter().map(|r| r.timestamp).collect::<Vec<_>>(), vec![0]);
    }

    #[tokio::test]
    async fn room_id_is_required() {
        let service = TelemetryService::new(TelemetryStore::new(Arc::new(InMemoryTable::new("SensorLog"))), 50);
        assert!(service.recent(" ", None).await.is_err());
    }
}

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::event::DeviceEvent;

pub mod memory;
pub mod postgres;
pub mod queries;

/// One persisted telemetry event. The extracted columns serve queries; the
/// payload column keeps the full device JSON for status merging.
#[derive(Debug, Clone, Serialize)]
pub struct StoredEvent {
    pub device_id: String,
    pub event_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub event_time: Option<DateTime<Utc>>,
    pub received_at: DateTime<Utc>,
    pub chase_session_id: Option<Uuid>,
    pub payload: Value,
}

impl StoredEvent {
    /// Builds the record for an accepted event. The receive time is injected
    /// into the payload as `last_seen` so status consumers see it even when
    /// the device omits its own clock; the chase session id rides along for
    /// correlation.
    pub fn from_event(
        event: &DeviceEvent,
        device_id: &str,
        chase_session_id: Option<Uuid>,
    ) -> Self {
        let received_at = Utc::now();
        let mut payload = serde_json::to_value(event).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut payload {
            map.insert(
                "last_seen".to_string(),
                Value::String(received_at.to_rfc3339()),
            );
            if let Some(session) = chase_session_id {
                map.insert(
                    "chase_session_id".to_string(),
                    Value::String(session.to_string()),
                );
            }
        }
        Self {
            device_id: device_id.to_string(),
            event_type: event.event_type.clone(),
            latitude: event.latitude,
            longitude: event.longitude,
            battery_voltage: event.battery_voltage,
            event_time: event.timestamp,
            received_at,
            chase_session_id,
            payload,
        }
    }
}

/// Event history persistence. Appends run fire-and-forget off the request
/// path; reads serve the status and history endpoints in receive order.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: StoredEvent) -> Result<()>;

    async fn device_history(&self, device_id: &str) -> Result<Vec<StoredEvent>>;

    async fn all_events(&self) -> Result<Vec<StoredEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_event_injects_last_seen_and_session() {
        let event: DeviceEvent = serde_json::from_value(json!({
            "device_id": "TB-1",
            "event_type": "movement",
            "latitude": 20.0,
            "longitude": -100.0
        }))
        .unwrap();
        let session = Uuid::new_v4();

        let stored = StoredEvent::from_event(&event, "TB-1", Some(session));

        assert_eq!(stored.device_id, "TB-1");
        assert_eq!(stored.event_type.as_deref(), Some("movement"));
        assert_eq!(stored.latitude, Some(20.0));
        assert_eq!(stored.chase_session_id, Some(session));
        let payload = stored.payload.as_object().unwrap();
        assert!(payload.contains_key("last_seen"));
        assert_eq!(
            payload["chase_session_id"],
            json!(session.to_string())
        );
    }

    #[test]
    fn from_event_without_session_leaves_payload_clean() {
        let event: DeviceEvent =
            serde_json::from_value(json!({"device_id": "TB-2"})).unwrap();
        let stored = StoredEvent::from_event(&event, "TB-2", None);
        let payload = stored.payload.as_object().unwrap();
        assert!(payload.contains_key("last_seen"));
        assert!(!payload.contains_key("chase_session_id"));
        assert!(stored.event_time.is_none());
    }
}

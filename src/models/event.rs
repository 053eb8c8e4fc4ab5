use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One telemetry report from a tracker.
///
/// Devices in the field are loose about types: coordinates and voltages
/// arrive as numbers or as strings ("+20.652494"), timestamps as RFC 3339,
/// `YYYY-MM-DD HH:MM:SS` or epoch seconds, and `movement_confirmed` as any
/// of true/"true"/1/"1". All of that is normalized at this boundary. Fields
/// the backend does not know about ride along in `extra` so the stored
/// payload matches what the device sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(
        default,
        deserialize_with = "parse_f64_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub latitude: Option<f64>,
    #[serde(
        default,
        deserialize_with = "parse_f64_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub longitude: Option<f64>,
    #[serde(
        default,
        deserialize_with = "parse_timestamp_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "parse_truthy_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub movement_confirmed: Option<bool>,
    #[serde(
        default,
        deserialize_with = "parse_f64_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub battery_voltage: Option<f64>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl DeviceEvent {
    /// Both coordinates of a GPS fix, when the event carries one.
    pub fn fix(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// Whether the event explicitly confirms movement, as opposed to the
    /// server-side distance inference.
    pub fn confirms_movement(&self) -> bool {
        self.movement_confirmed == Some(true)
            || self.event_type.as_deref() == Some("movement")
            || self.state.as_deref() == Some("demo_chase")
    }

    /// Whether the event is a re-arm signal from the device.
    pub fn is_rearm(&self) -> bool {
        self.state.as_deref() == Some("demo_armed")
            || self.event_type.as_deref() == Some("demo_armed")
    }
}

/// Truth table for boolean-ish device fields: `true`, `"true"`, `1` and
/// `"1"` are true, everything else is false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s == "true" || s == "1",
        _ => false,
    }
}

fn parse_truthy_option<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Option<Value> = Option::deserialize(deserializer)?;
    Ok(v.map(|v| truthy(&v)))
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}

fn parse_timestamp_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum EpochOrText {
        Epoch(f64),
        Text(String),
    }

    let v: Option<EpochOrText> = Option::deserialize(deserializer)?;
    match v {
        None => Ok(None),
        Some(EpochOrText::Epoch(secs)) => Ok(DateTime::from_timestamp(secs as i64, 0)),
        Some(EpochOrText::Text(s)) => {
            if s.trim().is_empty() {
                return Ok(None);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
                return Ok(Some(dt.with_timezone(&Utc)));
            }
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(&s, format) {
                    return Ok(Some(naive.and_utc()));
                }
            }
            Err(serde::de::Error::custom(format!("invalid timestamp: '{s}'")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parsing_realistic_payload() {
        let payload = r#"
        {
            "device_id": "TB-0848086072",
            "event_type": "movement",
            "state": "demo_chase",
            "latitude": "+20.652494",
            "longitude": "-100.391404",
            "timestamp": "2025-11-29 06:15:15",
            "movement_confirmed": "1",
            "battery_voltage": "12.34",
            "firmware": "1.0.17",
            "satellites": 9
        }
        "#;

        let event: DeviceEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.device_id.as_deref(), Some("TB-0848086072"));
        assert_eq!(event.latitude, Some(20.652494));
        assert_eq!(event.longitude, Some(-100.391404));
        assert_eq!(event.battery_voltage, Some(12.34));
        assert_eq!(event.movement_confirmed, Some(true));
        assert_eq!(
            event.timestamp.unwrap().to_rfc3339(),
            "2025-11-29T06:15:15+00:00"
        );
        assert!(event.confirms_movement());
        assert!(event.fix().is_some());
        assert_eq!(event.extra["firmware"], json!("1.0.17"));
        assert_eq!(event.extra["satellites"], json!(9));
    }

    #[test]
    fn truthy_truth_table() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!("true")));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("1")));

        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!("false")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("0")));
        assert!(!truthy(&json!("yes")));
        assert!(!truthy(&json!(2)));
        assert!(!truthy(&json!(1.5)));
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!([1])));
    }

    #[test]
    fn timestamp_accepts_rfc3339_and_epoch() {
        let rfc: DeviceEvent =
            serde_json::from_value(json!({"timestamp": "2025-11-29T06:15:15Z"})).unwrap();
        let epoch: DeviceEvent =
            serde_json::from_value(json!({"timestamp": 1764396915})).unwrap();
        assert!(rfc.timestamp.is_some());
        assert_eq!(
            epoch.timestamp.unwrap().to_rfc3339(),
            "2025-11-29T06:15:15+00:00"
        );
    }

    #[test]
    fn empty_strings_and_missing_fields_are_none() {
        let event: DeviceEvent = serde_json::from_value(json!({
            "device_id": "D1",
            "latitude": "",
            "timestamp": ""
        }))
        .unwrap();
        assert_eq!(event.latitude, None);
        assert_eq!(event.timestamp, None);
        assert_eq!(event.movement_confirmed, None);
        assert!(event.fix().is_none());
        assert!(!event.confirms_movement());
    }

    #[test]
    fn rearm_markers() {
        let by_state: DeviceEvent =
            serde_json::from_value(json!({"device_id": "D1", "state": "demo_armed"})).unwrap();
        let by_type: DeviceEvent =
            serde_json::from_value(json!({"device_id": "D1", "event_type": "demo_armed"}))
                .unwrap();
        let plain: DeviceEvent = serde_json::from_value(json!({"device_id": "D1"})).unwrap();
        assert!(by_state.is_rearm());
        assert!(by_type.is_rearm());
        assert!(!plain.is_rearm());
    }

    #[test]
    fn absent_optionals_are_not_serialized() {
        let event: DeviceEvent = serde_json::from_value(json!({"device_id": "D1"})).unwrap();
        let value = serde_json::to_value(&event).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("device_id"));
        assert!(!obj.contains_key("latitude"));
        assert!(!obj.contains_key("timestamp"));
        assert!(!obj.contains_key("movement_confirmed"));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operating mode of a tracker as inferred from its event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMode {
    Offline,
    Heartbeat,
    Chase,
}

/// Per-device alerting state. One instance per device_id, owned by the
/// alert engine; everything the escalation ladder needs to decide whether
/// to notify lives here.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceAlertState {
    pub device_id: String,
    pub mode: DeviceMode,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_event_time: Option<DateTime<Utc>>,
    /// One SMS per alert cycle; cleared by reset or re-arm.
    pub sms_sent: bool,
    pub call_attempts: u32,
    /// Set when a call was answered or the attempt cap was reached. A
    /// locked device places no further calls until reset.
    pub call_lock: bool,
    pub low_battery_sent: bool,
    pub chase_session_id: Option<Uuid>,
}

impl DeviceAlertState {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            mode: DeviceMode::Heartbeat,
            last_latitude: None,
            last_longitude: None,
            last_event_time: None,
            sms_sent: false,
            call_attempts: 0,
            call_lock: false,
            low_battery_sent: false,
            chase_session_id: None,
        }
    }

    /// Clears the escalation flags and nothing else. The battery latch and
    /// the chase session survive so a reset does not re-trigger either.
    pub fn clear_escalation(&mut self) {
        self.sms_sent = false;
        self.call_attempts = 0;
        self.call_lock = false;
    }

    pub fn last_fix(&self) -> Option<(f64, f64)> {
        match (self.last_latitude, self.last_longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

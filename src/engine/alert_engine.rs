use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::geo;
use crate::models::event::DeviceEvent;
use crate::models::state::{DeviceAlertState, DeviceMode};
use crate::notify::Notifier;

pub const MAX_CALL_ATTEMPTS: u32 = 10;
pub const MOVEMENT_THRESHOLD_METERS: f64 = 10.0;
pub const OFFLINE_AFTER_SECS: i64 = 20;
pub const LOW_BATTERY_VOLTS: f64 = 12.0;
pub const BATTERY_RECOVERY_VOLTS: f64 = 12.5;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("event is missing a device_id")]
    MissingDeviceId,

    #[error("unknown device: {0}")]
    UnknownDevice(String),
}

/// Escalation targets and thresholds, resolved from the environment at
/// startup.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub alert_phone: Option<String>,
    pub alert_from: Option<String>,
    pub voice_url: Option<String>,
    pub status_callback_url: Option<String>,
    /// Minimum `CallDuration` for a completed call to count as answered.
    pub answered_call_min_secs: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            alert_phone: None,
            alert_from: None,
            voice_url: None,
            status_callback_url: None,
            answered_call_min_secs: 2,
        }
    }
}

impl EngineSettings {
    fn sms_target(&self) -> Option<(&str, &str)> {
        self.alert_phone.as_deref().zip(self.alert_from.as_deref())
    }

    fn call_target(&self) -> Option<(&str, &str, &str)> {
        match (
            self.alert_phone.as_deref(),
            self.alert_from.as_deref(),
            self.voice_url.as_deref(),
        ) {
            (Some(to), Some(from), Some(url)) => Some((to, from, url)),
            _ => None,
        }
    }
}

/// What the engine decided for one accepted event. The chase session id is
/// handed to the event store for correlation.
#[derive(Debug, Clone, PartialEq)]
pub struct EventOutcome {
    pub device_id: String,
    pub mode: DeviceMode,
    pub chase_session_id: Option<Uuid>,
}

enum Dispatch {
    Sms {
        to: String,
        from: String,
        body: String,
    },
    Call {
        to: String,
        from: String,
        voice_url: String,
        status_callback: Option<String>,
    },
}

/// Per-device alert state machine and call/SMS escalation ladder.
///
/// Each device's state lives in one dashmap entry; the whole
/// read-modify-write for an event runs under that entry's guard with no
/// suspension points, so concurrent events for one device cannot interleave.
/// Outbound notifications are queued under the guard and spawned after it is
/// released.
pub struct AlertEngine {
    devices: DashMap<String, DeviceAlertState>,
    notifier: Arc<dyn Notifier>,
    settings: EngineSettings,
}

impl AlertEngine {
    pub fn new(notifier: Arc<dyn Notifier>, settings: EngineSettings) -> Self {
        Self {
            devices: DashMap::new(),
            notifier,
            settings,
        }
    }

    /// Processes one telemetry event: re-arm handling, staleness, movement
    /// classification, battery hysteresis and the escalation ladder, in that
    /// order.
    pub fn handle_event(&self, event: &DeviceEvent) -> Result<EventOutcome, EngineError> {
        // 1. Validate device id
        let device_id = event
            .device_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(EngineError::MissingDeviceId)?;

        info!(
            "Incoming event for device {}: type={:?} state={:?}",
            device_id, event.event_type, event.state
        );

        let now = Utc::now();
        let sms_target = if self.notifier.is_ready() {
            self.settings.sms_target()
        } else {
            None
        };
        let call_target = if self.notifier.is_ready() {
            self.settings.call_target()
        } else {
            None
        };

        let mut dispatches: Vec<Dispatch> = Vec::new();
        let outcome;
        {
            let mut entry = self
                .devices
                .entry(device_id.to_string())
                .or_insert_with(|| DeviceAlertState::new(device_id));
            let state = entry.value_mut();

            // 2. Re-arm resets the escalation ladder and ends the chase
            if event.is_rearm() {
                state.clear_escalation();
                state.chase_session_id = None;
                info!("Device {} re-armed", device_id);
                return Ok(outcome_of(state));
            }

            // 3. Record when we heard from the device; without a GPS fix
            // there is nothing more to classify
            let event_time = event.timestamp.unwrap_or(now);
            state.last_event_time = Some(event_time);
            let Some((lat, lon)) = event.fix() else {
                return Ok(outcome_of(state));
            };

            // 4. A fix older than the staleness window means the device is
            // offline; the stale position is not taken over
            if now - event_time > Duration::seconds(OFFLINE_AFTER_SECS) {
                state.mode = DeviceMode::Offline;
                debug!(
                    "Stale fix for device {} ({}s old), marking offline",
                    device_id,
                    (now - event_time).num_seconds()
                );
                return Ok(outcome_of(state));
            }

            // 5. Movement classification against the previous fix
            let moved = match state.last_fix() {
                Some((prev_lat, prev_lon)) => {
                    geo::haversine_distance(prev_lat, prev_lon, lat, lon)
                        >= MOVEMENT_THRESHOLD_METERS
                }
                None => false,
            };
            state.mode = if moved {
                DeviceMode::Chase
            } else {
                DeviceMode::Heartbeat
            };
            state.last_latitude = Some(lat);
            state.last_longitude = Some(lon);
            if moved && state.chase_session_id.is_none() {
                let session = Uuid::new_v4();
                state.chase_session_id = Some(session);
                info!("Chase session {} opened for device {}", session, device_id);
            }

            // 6. Battery hysteresis: alert below 12.0 V, re-arm at 12.5 V
            if let Some(volts) = event.battery_voltage {
                if volts < LOW_BATTERY_VOLTS && !state.low_battery_sent {
                    if let Some((to, from)) = sms_target {
                        state.low_battery_sent = true;
                        warn!("Low battery on device {}: {} V", device_id, volts);
                        dispatches.push(Dispatch::Sms {
                            to: to.to_string(),
                            from: from.to_string(),
                            body: format!("Low battery on tracker {}: {} V", device_id, volts),
                        });
                    }
                } else if volts >= BATTERY_RECOVERY_VOLTS && state.low_battery_sent {
                    state.low_battery_sent = false;
                    info!("Battery recovered on device {}", device_id);
                }
            }

            // 7. Escalation ladder, only on explicit movement confirmation
            // and only while the call engine is not locked
            if event.confirms_movement() && !state.call_lock {
                info!("MOVEMENT EVENT for {}", device_id);

                if !state.sms_sent {
                    if let Some((to, from)) = sms_target {
                        state.sms_sent = true;
                        dispatches.push(Dispatch::Sms {
                            to: to.to_string(),
                            from: from.to_string(),
                            body: format!("Movement detected on tracker {}", device_id),
                        });
                    }
                }

                if state.call_attempts >= MAX_CALL_ATTEMPTS {
                    state.call_lock = true;
                    warn!(
                        "Device {} reached {} call attempts, locking call engine",
                        device_id, MAX_CALL_ATTEMPTS
                    );
                } else if let Some((to, from, voice_url)) = call_target {
                    state.call_attempts += 1;
                    info!(
                        "Placing call {} of {} for device {}",
                        state.call_attempts, MAX_CALL_ATTEMPTS, device_id
                    );
                    dispatches.push(Dispatch::Call {
                        to: to.to_string(),
                        from: from.to_string(),
                        voice_url: voice_url.to_string(),
                        status_callback: self.settings.status_callback_url.clone(),
                    });
                } else {
                    debug!("Call engine prerequisites missing, skip call for {}", device_id);
                }
            }

            outcome = outcome_of(state);
        }

        self.spawn_dispatches(dispatches);
        Ok(outcome)
    }

    /// Applies the call-outcome rule: a completed call that lasted at least
    /// the configured threshold is a real human answer, which locks the call
    /// engine for every tracked device. Returns whether the lock was applied.
    pub fn handle_call_callback(&self, call_status: &str, call_duration_secs: i64) -> bool {
        info!(
            "Call callback: status={} duration={}s",
            call_status, call_duration_secs
        );

        if call_status != "completed"
            || call_duration_secs < self.settings.answered_call_min_secs
        {
            return false;
        }

        warn!("Real answer detected, locking call engine for all devices");
        for mut entry in self.devices.iter_mut() {
            entry.value_mut().call_lock = true;
        }
        true
    }

    /// Clears `sms_sent`, `call_attempts` and `call_lock` for one device.
    /// Position, mode, battery latch and chase session are left alone.
    pub fn reset_device(&self, device_id: &str) -> Result<(), EngineError> {
        match self.devices.get_mut(device_id) {
            Some(mut entry) => {
                entry.value_mut().clear_escalation();
                info!("Alert engine reset for device {}", device_id);
                Ok(())
            }
            None => Err(EngineError::UnknownDevice(device_id.to_string())),
        }
    }

    /// Point-in-time copy of every device state.
    pub fn snapshot(&self) -> Vec<DeviceAlertState> {
        self.devices
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn device_status(&self, device_id: &str) -> Option<DeviceAlertState> {
        self.devices.get(device_id).map(|entry| entry.value().clone())
    }

    fn spawn_dispatches(&self, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            let notifier = self.notifier.clone();
            tokio::spawn(async move {
                let result = match &dispatch {
                    Dispatch::Sms { to, from, body } => notifier.send_sms(to, from, body).await,
                    Dispatch::Call {
                        to,
                        from,
                        voice_url,
                        status_callback,
                    } => {
                        notifier
                            .place_call(to, from, voice_url, status_callback.as_deref())
                            .await
                    }
                };
                if let Err(e) = result {
                    warn!("Notification dispatch failed: {}", e);
                }
            });
        }
    }
}

fn outcome_of(state: &DeviceAlertState) -> EventOutcome {
    EventOutcome {
        device_id: state.device_id.clone(),
        mode: state.mode,
        chase_session_id: state.chase_session_id,
    }
}

use axum::extract::{Path, State};
use axum::{Form, Json};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{error, info};

use crate::http::error::ApiResult;
use crate::http::AppState;
use crate::models::callback::CallStatusCallback;
use crate::models::event::DeviceEvent;
use crate::models::state::DeviceMode;
use crate::store::StoredEvent;

/// GET /
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "Trackblock backend is LIVE" }))
}

/// GET /status
///
/// Latest status of every device: the event log folded per device in
/// receive order (later fields override earlier ones), with the engine's
/// mode and escalation flags overlaid.
pub async fn device_statuses(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let events = state.store.all_events().await?;

    let mut latest: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for event in events {
        let merged = latest.entry(event.device_id.clone()).or_default();
        if let Value::Object(payload) = event.payload {
            for (key, value) in payload {
                merged.insert(key, value);
            }
        }
    }
    // A device the engine tracks can be missing from the log while its
    // first append is still in flight
    for device in state.engine.snapshot() {
        latest.entry(device.device_id).or_default();
    }

    let devices: Vec<Value> = latest
        .into_iter()
        .map(|(device_id, mut merged)| {
            // Rows built from the engine union alone have no payload to
            // carry the id
            merged
                .entry("device_id")
                .or_insert_with(|| Value::String(device_id.clone()));
            match state.engine.device_status(&device_id) {
                Some(alert) => {
                    merged.insert("mode".to_string(), json!(alert.mode));
                    merged.insert("smsSent".to_string(), json!(alert.sms_sent));
                    merged.insert("callAttempts".to_string(), json!(alert.call_attempts));
                    merged.insert("callLock".to_string(), json!(alert.call_lock));
                }
                // History loaded from the database can predate the engine;
                // such a device has not reported since startup
                None => {
                    merged.insert("mode".to_string(), json!(DeviceMode::Offline));
                    merged.insert("smsSent".to_string(), json!(false));
                    merged.insert("callAttempts".to_string(), json!(0));
                    merged.insert("callLock".to_string(), json!(false));
                }
            }
            Value::Object(merged)
        })
        .collect();

    Ok(Json(Value::Array(devices)))
}

/// POST /event
///
/// Telemetry ingestion. The engine runs inline; the history append is
/// fire-and-forget so a slow store never delays the acknowledgement.
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(event): Json<DeviceEvent>,
) -> ApiResult<Json<Value>> {
    let outcome = state.engine.handle_event(&event)?;

    let stored = StoredEvent::from_event(&event, &outcome.device_id, outcome.chase_session_id);
    let store = state.store.clone();
    tokio::spawn(async move {
        if let Err(e) = store.append(stored).await {
            error!("Error storing event: {:#}", e);
        }
    });

    Ok(Json(json!({ "ok": true })))
}

/// GET /device/{id}/events
pub async fn device_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let history = state.store.device_history(&id).await?;
    let payloads: Vec<Value> = history.into_iter().map(|e| e.payload).collect();
    Ok(Json(Value::Array(payloads)))
}

/// POST /device/{id}/reset
pub async fn reset_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.engine.reset_device(&id)?;
    Ok(Json(json!({ "ok": true, "device_id": id })))
}

/// POST /twilio/voice-status
///
/// Form-encoded provider callback. Always 200; the provider retries non-2xx
/// deliveries and there is nothing useful to retry here.
pub async fn voice_status(
    State(state): State<AppState>,
    Form(callback): Form<CallStatusCallback>,
) -> Json<Value> {
    info!(
        "Voice status for call {}: answered_by={}",
        callback.call_sid.as_deref().unwrap_or("-"),
        callback.answered_by.as_deref().unwrap_or("-")
    );
    let locked = state
        .engine
        .handle_call_callback(callback.status(), callback.duration_secs());
    Json(json!({ "ok": true, "locked": locked }))
}

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use trackblock::engine::alert_engine::{AlertEngine, EngineSettings};
use trackblock::http::{build_router, AppState};
use trackblock::notify::{DispatchError, Notifier};
use trackblock::store::memory::MemoryEventStore;
use trackblock::store::{EventStore, StoredEvent};

/// Ready notifier that records dispatches instead of calling out.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sms: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_sms(&self, _to: &str, _from: &str, body: &str) -> Result<(), DispatchError> {
        self.sms.lock().unwrap().push(body.to_string());
        Ok(())
    }

    async fn place_call(
        &self,
        to: &str,
        _from: &str,
        _voice_url: &str,
        _status_callback_url: Option<&str>,
    ) -> Result<(), DispatchError> {
        self.calls.lock().unwrap().push(to.to_string());
        Ok(())
    }
}

/// Store whose appends always fail, as when the database is down.
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn append(&self, _event: StoredEvent) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("event log unavailable"))
    }

    async fn device_history(&self, _device_id: &str) -> anyhow::Result<Vec<StoredEvent>> {
        Ok(Vec::new())
    }

    async fn all_events(&self) -> anyhow::Result<Vec<StoredEvent>> {
        Ok(Vec::new())
    }
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        alert_phone: Some("+15550001111".to_string()),
        alert_from: Some("+15550002222".to_string()),
        voice_url: Some("https://example.com/twiml".to_string()),
        status_callback_url: None,
        answered_call_min_secs: 2,
    }
}

/// Builds the full application router on the in-memory store, mirroring the
/// construction in `main.rs` so tests exercise the production stack.
pub fn build_test_app() -> (Arc<RecordingNotifier>, Router) {
    build_app_with_store(Arc::new(MemoryEventStore::new()))
}

/// Same wiring with a caller-chosen store, for exercising store failures
/// and pre-seeded history.
pub fn build_app_with_store(store: Arc<dyn EventStore>) -> (Arc<RecordingNotifier>, Router) {
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = Arc::new(AlertEngine::new(notifier.clone(), test_settings()));

    let state = AppState { engine, store };
    let app = build_router(state, &["http://localhost:3000".to_string()]);
    (notifier, app)
}

/// Lets the fire-and-forget store/notify tasks run on the current-thread
/// test runtime before asserting on their effects.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

pub async fn get(app: Router, path: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_json(app: Router, path: &str, body: Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_form(app: Router, path: &str, body: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

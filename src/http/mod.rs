use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::alert_engine::AlertEngine;
use crate::store::EventStore;

pub mod error;
pub mod handlers;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AlertEngine>,
    pub store: Arc<dyn EventStore>,
}

/// Builds the application [`Router`]. Used by both the binary and the
/// integration tests so they run the same middleware stack.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let cors = build_cors_layer(cors_origins);

    Router::new()
        .route("/", get(handlers::health))
        .route("/status", get(handlers::device_statuses))
        .route("/event", post(handlers::ingest_event))
        .route("/device/{id}/events", get(handlers::device_events))
        .route("/device/{id}/reset", post(handlers::reset_device))
        .route("/twilio/voice-status", post(handlers::voice_status))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the dashboard origins. Invalid origins abort startup.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
}

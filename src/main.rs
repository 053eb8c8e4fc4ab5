use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use trackblock::config::AppConfig;
use trackblock::engine::alert_engine::{AlertEngine, EngineSettings};
use trackblock::http::{build_router, AppState};
use trackblock::notify::{NoopNotifier, Notifier, TwilioNotifier};
use trackblock::store::memory::MemoryEventStore;
use trackblock::store::postgres::{init_pool, PgEventStore};
use trackblock::store::EventStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Trackblock backend...");

    // Notification dispatcher
    let notifier: Arc<dyn Notifier> = if config.has_twilio_credentials() {
        info!("Twilio client initialised");
        Arc::new(TwilioNotifier::new(
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
        ))
    } else {
        info!("Twilio credentials missing, call engine disabled");
        Arc::new(NoopNotifier)
    };

    // Event store: Postgres when configured, in-memory otherwise
    let store: Arc<dyn EventStore> = match &config.database_url {
        Some(database_url) => {
            let pool = init_pool(database_url).await?;
            info!("Connected to database");
            Arc::new(PgEventStore::new(pool))
        }
        None => {
            info!("No DATABASE_URL set, using in-memory event store");
            Arc::new(MemoryEventStore::new())
        }
    };

    let settings = EngineSettings {
        alert_phone: config.alert_phone.clone(),
        alert_from: config.twilio_from.clone(),
        voice_url: config.twiml_voice_url.clone(),
        status_callback_url: config.twilio_status_callback_url.clone(),
        answered_call_min_secs: config.answered_call_min_secs,
    };
    let engine = Arc::new(AlertEngine::new(notifier, settings));

    let state = AppState { engine, store };
    let app = build_router(state, &config.cors_origins);

    let addr = format!("{}:{}", config.http_host, config.http_port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

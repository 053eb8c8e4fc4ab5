use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, Pool, Postgres};
use uuid::Uuid;

use super::{queries, EventStore, StoredEvent};

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(50)
        .connect(database_url)
        .await?;
    Ok(pool)
}

#[derive(Debug, FromRow)]
struct EventRow {
    device_id: String,
    event_type: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    battery_voltage: Option<f64>,
    event_time: Option<DateTime<Utc>>,
    received_at: DateTime<Utc>,
    chase_session_id: Option<Uuid>,
    payload: Json<Value>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            device_id: row.device_id,
            event_type: row.event_type,
            latitude: row.latitude,
            longitude: row.longitude,
            battery_voltage: row.battery_voltage,
            event_time: row.event_time,
            received_at: row.received_at,
            chase_session_id: row.chase_session_id,
            payload: row.payload.0,
        }
    }
}

/// Event log backed by the `device_events` table.
pub struct PgEventStore {
    pool: DbPool,
}

impl PgEventStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(&self, event: StoredEvent) -> Result<()> {
        sqlx::query(queries::INSERT_DEVICE_EVENT)
            .bind(&event.device_id)
            .bind(&event.event_type)
            .bind(event.latitude)
            .bind(event.longitude)
            .bind(event.battery_voltage)
            .bind(event.event_time)
            .bind(event.received_at)
            .bind(event.chase_session_id)
            .bind(Json(&event.payload))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn device_history(&self, device_id: &str) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(queries::SELECT_DEVICE_EVENTS)
            .bind(device_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }

    async fn all_events(&self) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(queries::SELECT_ALL_EVENTS)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }
}

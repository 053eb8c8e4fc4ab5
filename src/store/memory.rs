use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{EventStore, StoredEvent};

/// In-memory event log. The default store when no `DATABASE_URL` is set;
/// history disappears on restart.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<StoredEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, event: StoredEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn device_history(&self, device_id: &str) -> Result<Vec<StoredEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| e.device_id == device_id)
            .cloned()
            .collect())
    }

    async fn all_events(&self) -> Result<Vec<StoredEvent>> {
        Ok(self.events.read().await.clone())
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::{ProcessedEventStore, Result};

#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessedEventStore {
    processed: Arc<RwLock<HashMap<(String, String), Instant>>>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of remembered events.
    pub async fn len(&self) -> usize {
        self.processed.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.processed.read().await.is_empty()
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn is_processed(&self, consumer: &str, event_id: &str) -> Result<bool> {
        Ok(self
            .processed
            .read()
            .await
            .contains_key(&(consumer.to_string(), event_id.to_string())))
    }

    async fn mark_processed(&self, consumer: &str, event_id: &str) -> Result<bool> {
        let mut processed = self.processed.write().await;
        let key = (consumer.to_string(), event_id.to_string());
        if processed.contains_key(&key) {
            return Ok(false);
        }
        processed.insert(key, Instant::now());
        Ok(true)
    }

    async fn purge_older_than(&self, retention: Duration) -> Result<u64> {
        let mut processed = self.processed.write().await;
        let before = processed.len();
        let now = Instant::now();
        processed.retain(|_, at| now.duration_since(*at) <= retention);
        Ok((before - processed.len()) as u64)
    }
}

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// Remembers which upstream events a consumer has fully handled.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    async fn is_processed(&self, consumer: &str, event_id: &str) -> Result<bool>;

    /// Records the event as handled. Returns false if it already was.
    async fn mark_processed(&self, consumer: &str, event_id: &str) -> Result<bool>;

    /// Forgets events handled more than `retention` ago. Returns how many
    /// were removed. Redeliveries older than the retention are not deduplicated.
    async fn purge_older_than(&self, retention: Duration) -> Result<u64>;
}

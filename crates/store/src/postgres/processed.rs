use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{ProcessedEventStore, Result};

#[derive(Clone)]
pub struct PostgresProcessedEventStore {
    pool: PgPool,
}

impl PostgresProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresProcessedEventStore {
    async fn is_processed(&self, consumer: &str, event_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM processed_events WHERE consumer = $1 AND event_id = $2)",
        )
        .bind(consumer)
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn mark_processed(&self, consumer: &str, event_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (consumer, event_id)
            VALUES ($1, $2)
            ON CONFLICT (consumer, event_id) DO NOTHING
            "#,
        )
        .bind(consumer)
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_older_than(&self, retention: Duration) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM processed_events WHERE processed_at < NOW() - make_interval(secs => $1)",
        )
        .bind(retention.as_secs_f64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

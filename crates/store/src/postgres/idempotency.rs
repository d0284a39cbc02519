use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{IdempotencyStore, Result};

/// Idempotency markers kept in the `idempotency_keys` table.
#[derive(Clone)]
pub struct PostgresIdempotencyStore {
    pool: PgPool,
}

impl PostgresIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdempotencyStore for PostgresIdempotencyStore {
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool> {
        let stored: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO idempotency_keys (key, expires_at)
            VALUES ($1, NOW() + make_interval(secs => $2))
            ON CONFLICT (key) DO UPDATE
                SET expires_at = EXCLUDED.expires_at
                WHERE idempotency_keys.expires_at <= NOW()
            RETURNING key
            "#,
        )
        .bind(key)
        .bind(ttl.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(stored.is_some())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM idempotency_keys WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM idempotency_keys WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{LockManager, LockToken, StoreError};

/// Lease locks kept in the `payment_locks` table.
///
/// Expiry is evaluated against the database clock so every instance agrees.
#[derive(Clone)]
pub struct PostgresLockManager {
    pool: PgPool,
}

impl PostgresLockManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockManager for PostgresLockManager {
    async fn try_acquire(
        &self,
        key: &str,
        holder: LockToken,
        lease: Duration,
    ) -> Result<bool, StoreError> {
        // Takes over an existing row only once its lease has run out.
        let acquired: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO payment_locks (lock_key, holder, expires_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            ON CONFLICT (lock_key) DO UPDATE
                SET holder = EXCLUDED.holder, expires_at = EXCLUDED.expires_at
                WHERE payment_locks.expires_at <= NOW()
            RETURNING holder
            "#,
        )
        .bind(key)
        .bind(holder.as_uuid())
        .bind(lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(acquired == Some(holder.as_uuid()))
    }

    async fn release(&self, key: &str, holder: LockToken) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM payment_locks WHERE lock_key = $1 AND holder = $2")
            .bind(key)
            .bind(holder.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

//! PostgreSQL-backed implementations.
//!
//! Schema lives in `migrations/` at the workspace root.

mod idempotency;
mod lock;
mod processed;
mod repository;

pub use idempotency::PostgresIdempotencyStore;
pub use lock::PostgresLockManager;
pub use processed::PostgresProcessedEventStore;
pub use repository::PostgresPaymentRepository;

use sqlx::PgPool;

/// Runs the database migrations.
pub async fn run_migrations(pool: &PgPool) -> crate::Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

//! Persistence and coordination for the payment service.
//!
//! Four capabilities, each a trait with an in-memory and a PostgreSQL
//! implementation:
//! - [`PaymentRepository`]: load and save payments with an optimistic version check
//! - [`LockManager`]: per-key leases, driven by [`PaymentLockCoordinator`]
//! - [`IdempotencyStore`]: TTL markers, wrapped by the fail-open [`IdempotencyGuard`]
//! - [`ProcessedEventStore`]: remembers which upstream events a consumer handled

pub mod error;
pub mod idempotency;
pub mod lock;
pub mod memory;
pub mod postgres;
pub mod processed;
pub mod repository;

pub use error::{Result, StoreError};
pub use idempotency::{IdempotencyGuard, IdempotencyStore};
pub use lock::{LockError, LockManager, LockSettings, LockToken, PaymentLockCoordinator};
pub use memory::{
    InMemoryIdempotencyStore, InMemoryLockManager, InMemoryPaymentRepository,
    InMemoryProcessedEventStore,
};
pub use postgres::{
    PostgresIdempotencyStore, PostgresLockManager, PostgresPaymentRepository,
    PostgresProcessedEventStore, run_migrations,
};
pub use processed::ProcessedEventStore;
pub use repository::{PaymentPage, PaymentRepository};

//! In-memory implementations for tests and single-process deployments.
//!
//! Locks and idempotency markers only coordinate callers within this process.

mod idempotency;
mod lock;
mod processed;
mod repository;

pub use idempotency::InMemoryIdempotencyStore;
pub use lock::InMemoryLockManager;
pub use processed::InMemoryProcessedEventStore;
pub use repository::InMemoryPaymentRepository;

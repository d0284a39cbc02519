use common::{OrderId, PaymentId, Version};
use thiserror::Error;

/// Errors that can occur when interacting with the payment stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version did not match the version the payment was read at.
    #[error(
        "Concurrency conflict for payment {payment_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        payment_id: PaymentId,
        expected: Version,
        actual: Version,
    },

    /// A different payment already exists for the order.
    #[error("A payment already exists for order {0}")]
    DuplicateOrder(OrderId),

    /// A stored row could not be mapped back to the domain.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// The backing store is unreachable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true for conflicts a caller may resolve by reloading and retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. } | StoreError::DuplicateOrder(_)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

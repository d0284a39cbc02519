//! Coordinator error types.

use std::time::Duration;

use common::{OrderId, PaymentId};
use domain::{EventFactoryError, PaymentError};
use message_log::MessageLogError;
use store::{LockError, StoreError};
use thiserror::Error;

/// Errors that can occur while coordinating payment operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The aggregate rejected the operation.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// An event could not be built from the post-transition state.
    #[error("Event factory error: {0}")]
    EventFactory(#[from] EventFactoryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The payment's lock could not be taken in time. Nothing was applied.
    #[error("Timed out after {waited:?} waiting for the lock on payment {payment_id}")]
    LockTimeout {
        payment_id: PaymentId,
        waited: Duration,
    },

    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    #[error("No payment found for order: {0}")]
    PaymentNotFoundForOrder(OrderId),

    /// The order collaborator already links the order to another payment.
    #[error("Order {0} already has a payment")]
    OrderAlreadyHasPayment(OrderId),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Order service error: {0}")]
    OrderService(String),

    #[error("Message log error: {0}")]
    MessageLog(#[from] MessageLogError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<LockError> for CoordinatorError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout { payment_id, waited } => {
                CoordinatorError::LockTimeout { payment_id, waited }
            }
            LockError::Store(e) => CoordinatorError::Store(e),
        }
    }
}

impl CoordinatorError {
    /// Returns true if retrying the same request may succeed.
    ///
    /// State violations, bad arguments and missing payments are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoordinatorError::LockTimeout { .. }
            | CoordinatorError::Gateway(_)
            | CoordinatorError::OrderService(_)
            | CoordinatorError::MessageLog(_) => true,
            CoordinatorError::Store(e) => !matches!(
                e,
                StoreError::DuplicateOrder(_) | StoreError::InvalidData(_)
            ),
            CoordinatorError::Payment(_)
            | CoordinatorError::EventFactory(_)
            | CoordinatorError::PaymentNotFound(_)
            | CoordinatorError::PaymentNotFoundForOrder(_)
            | CoordinatorError::OrderAlreadyHasPayment(_)
            | CoordinatorError::Serialization(_) => false,
        }
    }
}

/// Convenience type alias for coordinator results.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

//! Payment aggregate and related types.

mod aggregate;
mod events;
mod factory;
mod history;
mod status;
mod value_objects;

pub use aggregate::{Payment, PaymentRecord};
pub use events::{
    EventHeader, PaymentCancelledData, PaymentCompletedData, PaymentEvent, PaymentFailedData,
    PaymentRefundCompletedData, PaymentRefundRequestedData, PaymentRequestedData,
};
pub use factory::{EventFactoryError, PaymentEventFactory};
pub use history::{HistoryEntry, PaymentEventType};
pub use status::{PaymentAction, PaymentStatus};
pub use value_objects::{CancellationReason, ChargeDetails, Money, PaymentMethod};

use common::PaymentId;
use thiserror::Error;

/// Errors raised by payment commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    /// The payment is not in a state that allows the action.
    #[error("Invalid state transition: cannot {action} from {current_status} state")]
    InvalidStateTransition {
        current_status: PaymentStatus,
        action: PaymentAction,
    },

    /// An argument is out of range or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Stock confirmation was already recorded for this payment.
    #[error("Reservation already finalized for payment {0}")]
    ReservationAlreadyFinalized(PaymentId),
}

//! Domain layer for the payment service.
//!
//! Pure logic with no I/O:
//! - the `Payment` aggregate and its state machine
//! - the append-only payment history
//! - domain events and the factory that builds them from a transitioned payment

pub mod payment;

pub use payment::{
    CancellationReason, ChargeDetails, EventFactoryError, EventHeader, HistoryEntry, Money,
    Payment, PaymentAction, PaymentCancelledData, PaymentCompletedData, PaymentError,
    PaymentEvent, PaymentEventFactory, PaymentEventType, PaymentFailedData, PaymentMethod,
    PaymentRecord, PaymentRefundCompletedData, PaymentRefundRequestedData, PaymentRequestedData,
    PaymentStatus,
};

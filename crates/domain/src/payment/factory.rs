//! Builds domain events from a payment that has just transitioned.

use thiserror::Error;

use super::{
    CancellationReason, EventHeader, Payment, PaymentCancelledData, PaymentCompletedData,
    PaymentEvent, PaymentFailedData, PaymentRefundCompletedData, PaymentRefundRequestedData,
    PaymentRequestedData, PaymentStatus,
};

/// Raised when an event is built from a payment in the wrong state.
///
/// This always indicates a programming error: a stale snapshot or a factory
/// call placed before the transition it reports.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventFactoryError {
    #[error("Cannot build {event}: payment is {actual}, expected {expected}")]
    UnexpectedStatus {
        event: &'static str,
        expected: PaymentStatus,
        actual: PaymentStatus,
    },

    #[error("Cannot build {event}: {field} is not set")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },
}

type Result<T> = std::result::Result<T, EventFactoryError>;

/// Creates one event per transition after validating the post-condition.
pub struct PaymentEventFactory;

impl PaymentEventFactory {
    pub fn payment_requested(payment: &Payment) -> Result<PaymentEvent> {
        const EVENT: &str = "PaymentRequested";
        expect_status(payment, EVENT, PaymentStatus::Request)?;
        let charge = required(payment.charge().copied(), EVENT, "charge details")?;

        Ok(PaymentEvent::PaymentRequested(PaymentRequestedData {
            header: header(payment),
            pg_transaction_id: required(
                payment.pg_transaction_id().map(str::to_owned),
                EVENT,
                "pg_transaction_id",
            )?,
            total_amount: charge.total_amount(),
            payment_amount: charge.payment_amount(),
            discount_amount: charge.discount_amount(),
            delivery_fee: charge.delivery_fee(),
            payment_method: charge.method(),
            requested_at: required(payment.requested_at(), EVENT, "requested_at")?,
        }))
    }

    pub fn payment_completed(payment: &Payment) -> Result<PaymentEvent> {
        const EVENT: &str = "PaymentCompleted";
        expect_status(payment, EVENT, PaymentStatus::Completed)?;
        let charge = required(payment.charge().copied(), EVENT, "charge details")?;

        Ok(PaymentEvent::PaymentCompleted(PaymentCompletedData {
            header: header(payment),
            total_amount: charge.total_amount(),
            payment_amount: charge.payment_amount(),
            payment_method: charge.method(),
            pg_approval_number: required(
                payment.pg_approval_number().map(str::to_owned),
                EVENT,
                "pg_approval_number",
            )?,
            completed_at: required(payment.completed_at(), EVENT, "completed_at")?,
        }))
    }

    pub fn payment_failed(payment: &Payment) -> Result<PaymentEvent> {
        const EVENT: &str = "PaymentFailed";
        expect_status(payment, EVENT, PaymentStatus::Failed)?;

        Ok(PaymentEvent::PaymentFailed(PaymentFailedData {
            header: header(payment),
            failure_reason: required(
                payment.failure_reason().map(str::to_owned),
                EVENT,
                "failure_reason",
            )?,
            failed_at: required(payment.failed_at(), EVENT, "failed_at")?,
        }))
    }

    /// `previous_status` is the status observed before `cancel` was applied.
    pub fn payment_cancelled(
        payment: &Payment,
        previous_status: PaymentStatus,
    ) -> Result<PaymentEvent> {
        const EVENT: &str = "PaymentCancelled";
        expect_status(payment, EVENT, PaymentStatus::Cancelled)?;
        let reason = required(
            payment.cancellation_reason().map(str::to_owned),
            EVENT,
            "cancellation_reason",
        )?;

        Ok(PaymentEvent::PaymentCancelled(PaymentCancelledData {
            header: header(payment),
            previous_status,
            cancellation_reason: CancellationReason::from_text(&reason),
            reason_detail: reason,
            cancelled_at: required(payment.cancelled_at(), EVENT, "cancelled_at")?,
        }))
    }

    pub fn refund_requested(payment: &Payment) -> Result<PaymentEvent> {
        const EVENT: &str = "PaymentRefundRequested";
        expect_status(payment, EVENT, PaymentStatus::RefundRequested)?;

        Ok(PaymentEvent::PaymentRefundRequested(
            PaymentRefundRequestedData {
                header: header(payment),
                refund_amount: required(payment.refund_amount(), EVENT, "refund_amount")?,
                refund_reason: required(
                    payment.refund_reason().map(str::to_owned),
                    EVENT,
                    "refund_reason",
                )?,
                requested_at: required(
                    payment.refund_requested_at(),
                    EVENT,
                    "refund_requested_at",
                )?,
            },
        ))
    }

    pub fn refund_completed(payment: &Payment) -> Result<PaymentEvent> {
        const EVENT: &str = "PaymentRefundCompleted";
        expect_status(payment, EVENT, PaymentStatus::RefundCompleted)?;

        Ok(PaymentEvent::PaymentRefundCompleted(
            PaymentRefundCompletedData {
                header: header(payment),
                refund_transaction_id: required(
                    payment.refund_transaction_id().map(str::to_owned),
                    EVENT,
                    "refund_transaction_id",
                )?,
                refund_amount: required(payment.refund_amount(), EVENT, "refund_amount")?,
                refunded_at: required(payment.refunded_at(), EVENT, "refunded_at")?,
            },
        ))
    }
}

fn header(payment: &Payment) -> EventHeader {
    EventHeader::new(payment.id(), payment.order_id(), payment.user_id())
}

fn expect_status(payment: &Payment, event: &'static str, expected: PaymentStatus) -> Result<()> {
    if payment.status() == expected {
        Ok(())
    } else {
        Err(EventFactoryError::UnexpectedStatus {
            event,
            expected,
            actual: payment.status(),
        })
    }
}

fn required<T>(value: Option<T>, event: &'static str, field: &'static str) -> Result<T> {
    value.ok_or(EventFactoryError::MissingField { event, field })
}

#[cfg(test)]
mod tests {
    use common::{OrderId, UserId};

    use super::*;
    use crate::payment::{ChargeDetails, Money, PaymentMethod};

    fn requested() -> Payment {
        let mut payment = Payment::create(OrderId::new(), UserId::new());
        let charge = ChargeDetails::new(
            Money::new(50_000),
            Money::new(48_000),
            Money::new(5_000),
            Money::new(3_000),
            PaymentMethod::TossPay,
        )
        .unwrap();
        payment.request_payment("PG-TX-1", charge).unwrap();
        payment
    }

    #[test]
    fn test_completed_event_carries_approval() {
        let mut payment = requested();
        payment.complete("A1").unwrap();

        let event = PaymentEventFactory::payment_completed(&payment).unwrap();
        let PaymentEvent::PaymentCompleted(data) = event else {
            panic!("wrong variant");
        };
        assert_eq!(data.pg_approval_number, "A1");
        assert_eq!(data.payment_amount, Money::new(48_000));
        assert_eq!(data.header.payment_id, payment.id());
        assert_eq!(Some(data.completed_at), payment.completed_at());
    }

    #[test]
    fn test_stale_snapshot_is_rejected() {
        let payment = requested();
        let err = PaymentEventFactory::payment_completed(&payment).unwrap_err();
        assert_eq!(
            err,
            EventFactoryError::UnexpectedStatus {
                event: "PaymentCompleted",
                expected: PaymentStatus::Completed,
                actual: PaymentStatus::Request,
            }
        );
    }

    #[test]
    fn test_cancelled_event_maps_reason() {
        let mut payment = requested();
        payment.cancel("timeout").unwrap();

        let event =
            PaymentEventFactory::payment_cancelled(&payment, PaymentStatus::Request).unwrap();
        let PaymentEvent::PaymentCancelled(data) = event else {
            panic!("wrong variant");
        };
        assert_eq!(data.cancellation_reason, CancellationReason::Timeout);
        assert_eq!(data.reason_detail, "timeout");
        assert_eq!(data.previous_status, PaymentStatus::Request);
    }

    #[test]
    fn test_each_event_gets_a_fresh_id() {
        let payment = requested();
        let a = PaymentEventFactory::payment_requested(&payment).unwrap();
        let b = PaymentEventFactory::payment_requested(&payment).unwrap();
        assert_ne!(a.event_id(), b.event_id());
    }

    #[test]
    fn test_refund_events() {
        let mut payment = requested();
        payment.complete("A1").unwrap();
        payment.request_refund("damaged", Money::new(10_000)).unwrap();
        let requested = PaymentEventFactory::refund_requested(&payment).unwrap();
        assert_eq!(requested.event_type(), "PaymentRefundRequested");

        assert!(PaymentEventFactory::refund_completed(&payment).is_err());
        payment.complete_refund("RF-1").unwrap();
        let completed = PaymentEventFactory::refund_completed(&payment).unwrap();
        let PaymentEvent::PaymentRefundCompleted(data) = completed else {
            panic!("wrong variant");
        };
        assert_eq!(data.refund_amount, Money::new(10_000));
        assert_eq!(data.refund_transaction_id, "RF-1");
    }
}

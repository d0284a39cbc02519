//! Message log topic names.

use domain::PaymentEvent;

pub const PAYMENT_REQUESTED: &str = "payment.requested";
pub const PAYMENT_COMPLETED: &str = "payment.completed";
pub const PAYMENT_FAILED: &str = "payment.failed";
pub const PAYMENT_CANCELLED: &str = "payment.cancelled";
pub const PAYMENT_REFUND_REQUESTED: &str = "payment.refund-requested";
pub const PAYMENT_REFUND_COMPLETED: &str = "payment.refund-completed";

pub const ORDER_CREATED: &str = "order.created";
pub const ORDER_CONFIRMED: &str = "order.confirmed";
pub const STOCK_CONFIRMED: &str = "stock.confirmed";

/// Topics the SAGA listener subscribes to.
pub const INBOUND: [&str; 3] = [ORDER_CREATED, ORDER_CONFIRMED, STOCK_CONFIRMED];

/// Topic an outbound payment event is published to.
pub fn for_event(event: &PaymentEvent) -> &'static str {
    match event {
        PaymentEvent::PaymentRequested(_) => PAYMENT_REQUESTED,
        PaymentEvent::PaymentCompleted(_) => PAYMENT_COMPLETED,
        PaymentEvent::PaymentFailed(_) => PAYMENT_FAILED,
        PaymentEvent::PaymentCancelled(_) => PAYMENT_CANCELLED,
        PaymentEvent::PaymentRefundRequested(_) => PAYMENT_REFUND_REQUESTED,
        PaymentEvent::PaymentRefundCompleted(_) => PAYMENT_REFUND_COMPLETED,
    }
}

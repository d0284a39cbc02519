//! Domain events emitted after a payment transition.

use chrono::{DateTime, Utc};
use common::{EventId, OrderId, PaymentId, UserId};
use serde::{Deserialize, Serialize};

use super::{CancellationReason, Money, PaymentMethod, PaymentStatus};

/// Fields carried by every payment event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    /// Unique per event. Consumers deduplicate on it.
    pub event_id: EventId,
    /// Milliseconds since the Unix epoch.
    pub event_timestamp: i64,
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
}

impl EventHeader {
    pub fn new(payment_id: PaymentId, order_id: OrderId, user_id: UserId) -> Self {
        Self {
            event_id: EventId::new(),
            event_timestamp: Utc::now().timestamp_millis(),
            payment_id,
            order_id,
            user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequestedData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub pg_transaction_id: String,
    pub total_amount: Money,
    pub payment_amount: Money,
    pub discount_amount: Money,
    pub delivery_fee: Money,
    pub payment_method: PaymentMethod,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCompletedData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub total_amount: Money,
    pub payment_amount: Money,
    pub payment_method: PaymentMethod,
    pub pg_approval_number: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub failure_reason: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCancelledData {
    #[serde(flatten)]
    pub header: EventHeader,
    /// Status the payment was cancelled from.
    pub previous_status: PaymentStatus,
    pub cancellation_reason: CancellationReason,
    /// Free text supplied with the cancellation.
    pub reason_detail: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRefundRequestedData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub refund_amount: Money,
    pub refund_reason: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRefundCompletedData {
    #[serde(flatten)]
    pub header: EventHeader,
    pub refund_transaction_id: String,
    pub refund_amount: Money,
    pub refunded_at: DateTime<Utc>,
}

/// Events emitted by the payment aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PaymentEvent {
    PaymentRequested(PaymentRequestedData),
    PaymentCompleted(PaymentCompletedData),
    PaymentFailed(PaymentFailedData),
    PaymentCancelled(PaymentCancelledData),
    PaymentRefundRequested(PaymentRefundRequestedData),
    PaymentRefundCompleted(PaymentRefundCompletedData),
}

impl PaymentEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentRequested(_) => "PaymentRequested",
            PaymentEvent::PaymentCompleted(_) => "PaymentCompleted",
            PaymentEvent::PaymentFailed(_) => "PaymentFailed",
            PaymentEvent::PaymentCancelled(_) => "PaymentCancelled",
            PaymentEvent::PaymentRefundRequested(_) => "PaymentRefundRequested",
            PaymentEvent::PaymentRefundCompleted(_) => "PaymentRefundCompleted",
        }
    }

    pub fn header(&self) -> &EventHeader {
        match self {
            PaymentEvent::PaymentRequested(d) => &d.header,
            PaymentEvent::PaymentCompleted(d) => &d.header,
            PaymentEvent::PaymentFailed(d) => &d.header,
            PaymentEvent::PaymentCancelled(d) => &d.header,
            PaymentEvent::PaymentRefundRequested(d) => &d.header,
            PaymentEvent::PaymentRefundCompleted(d) => &d.header,
        }
    }

    pub fn event_id(&self) -> EventId {
        self.header().event_id
    }

    pub fn payment_id(&self) -> PaymentId {
        self.header().payment_id
    }

    pub fn order_id(&self) -> OrderId {
        self.header().order_id
    }

    /// Serializes the variant's fields without the enum tag, as sent on the wire.
    pub fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            PaymentEvent::PaymentRequested(d) => serde_json::to_value(d),
            PaymentEvent::PaymentCompleted(d) => serde_json::to_value(d),
            PaymentEvent::PaymentFailed(d) => serde_json::to_value(d),
            PaymentEvent::PaymentCancelled(d) => serde_json::to_value(d),
            PaymentEvent::PaymentRefundRequested(d) => serde_json::to_value(d),
            PaymentEvent::PaymentRefundCompleted(d) => serde_json::to_value(d),
        }
    }
}

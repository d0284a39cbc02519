//! Append-only audit trail kept on every payment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PaymentError;

/// Kind of transition a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentEventType {
    PaymentCreated,
    PaymentRequested,
    PaymentCompleted,
    PaymentFailed,
    PaymentCancelled,
    RefundRequested,
    RefundCompleted,
    ReservationFinalized,
}

impl PaymentEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentEventType::PaymentCreated => "PAYMENT_CREATED",
            PaymentEventType::PaymentRequested => "PAYMENT_REQUESTED",
            PaymentEventType::PaymentCompleted => "PAYMENT_COMPLETED",
            PaymentEventType::PaymentFailed => "PAYMENT_FAILED",
            PaymentEventType::PaymentCancelled => "PAYMENT_CANCELLED",
            PaymentEventType::RefundRequested => "REFUND_REQUESTED",
            PaymentEventType::RefundCompleted => "REFUND_COMPLETED",
            PaymentEventType::ReservationFinalized => "RESERVATION_FINALIZED",
        }
    }
}

impl std::fmt::Display for PaymentEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentEventType {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAYMENT_CREATED" => Ok(PaymentEventType::PaymentCreated),
            "PAYMENT_REQUESTED" => Ok(PaymentEventType::PaymentRequested),
            "PAYMENT_COMPLETED" => Ok(PaymentEventType::PaymentCompleted),
            "PAYMENT_FAILED" => Ok(PaymentEventType::PaymentFailed),
            "PAYMENT_CANCELLED" => Ok(PaymentEventType::PaymentCancelled),
            "REFUND_REQUESTED" => Ok(PaymentEventType::RefundRequested),
            "REFUND_COMPLETED" => Ok(PaymentEventType::RefundCompleted),
            "RESERVATION_FINALIZED" => Ok(PaymentEventType::ReservationFinalized),
            other => Err(PaymentError::InvalidArgument(format!(
                "unknown history event type: {other}"
            ))),
        }
    }
}

/// One recorded transition. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub event_type: PaymentEventType,
    /// Human-readable description of what changed.
    pub summary: String,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(event_type: PaymentEventType, summary: impl Into<String>) -> Self {
        Self {
            event_type,
            summary: summary.into(),
            recorded_at: Utc::now(),
        }
    }
}

//! Payment state machine.

use serde::{Deserialize, Serialize};

use super::PaymentError;

/// The state of a payment in its lifecycle.
///
/// State transitions:
/// ```text
/// Wait ──► Request ──► Completed ──► RefundRequested ──► RefundCompleted
///   │         │
///   │         ├──► Failed
///   └─────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    /// Created after stock reservation, no amounts yet.
    #[default]
    #[serde(rename = "PAYMENT_WAIT")]
    Wait,

    /// Sent to the gateway, waiting for its callback.
    #[serde(rename = "PAYMENT_REQUEST")]
    Request,

    /// Gateway approved the charge.
    #[serde(rename = "PAYMENT_COMPLETED")]
    Completed,

    /// Gateway rejected the charge (terminal state).
    #[serde(rename = "PAYMENT_FAILED")]
    Failed,

    /// Cancelled before completion (terminal state).
    #[serde(rename = "PAYMENT_CANCELLED")]
    Cancelled,

    /// Refund has been asked of the gateway.
    #[serde(rename = "REFUND_REQUESTED")]
    RefundRequested,

    /// Refund settled (terminal state).
    #[serde(rename = "REFUND_COMPLETED")]
    RefundCompleted,
}

/// Every operation the payment aggregate exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentAction {
    Request,
    Complete,
    Cancel,
    RequestRefund,
    CompleteRefund,
    MarkFailed,
    FinalizeReservation,
}

impl PaymentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentAction::Request => "request",
            PaymentAction::Complete => "complete",
            PaymentAction::Cancel => "cancel",
            PaymentAction::RequestRefund => "request refund",
            PaymentAction::CompleteRefund => "complete refund",
            PaymentAction::MarkFailed => "mark failed",
            PaymentAction::FinalizeReservation => "finalize reservation",
        }
    }

    /// Label used for the `action` metric dimension.
    pub fn metric_label(&self) -> &'static str {
        match self {
            PaymentAction::Request => "request",
            PaymentAction::Complete => "complete",
            PaymentAction::Cancel => "cancel",
            PaymentAction::RequestRefund => "request_refund",
            PaymentAction::CompleteRefund => "complete_refund",
            PaymentAction::MarkFailed => "mark_failed",
            PaymentAction::FinalizeReservation => "finalize_reservation",
        }
    }
}

impl std::fmt::Display for PaymentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PaymentStatus {
    pub fn can_request(&self) -> bool {
        matches!(self, PaymentStatus::Wait)
    }

    pub fn can_complete(&self) -> bool {
        matches!(self, PaymentStatus::Request)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, PaymentStatus::Wait | PaymentStatus::Request)
    }

    pub fn can_request_refund(&self) -> bool {
        matches!(self, PaymentStatus::Completed)
    }

    pub fn can_complete_refund(&self) -> bool {
        matches!(self, PaymentStatus::RefundRequested)
    }

    pub fn can_fail(&self) -> bool {
        matches!(self, PaymentStatus::Request)
    }

    pub fn can_finalize_reservation(&self) -> bool {
        matches!(self, PaymentStatus::Completed)
    }

    /// Returns true if `action` is legal from this state.
    pub fn allows(&self, action: PaymentAction) -> bool {
        match action {
            PaymentAction::Request => self.can_request(),
            PaymentAction::Complete => self.can_complete(),
            PaymentAction::Cancel => self.can_cancel(),
            PaymentAction::RequestRefund => self.can_request_refund(),
            PaymentAction::CompleteRefund => self.can_complete_refund(),
            PaymentAction::MarkFailed => self.can_fail(),
            PaymentAction::FinalizeReservation => self.can_finalize_reservation(),
        }
    }

    /// Fails with `InvalidStateTransition` unless `action` is legal from this state.
    pub fn check(&self, action: PaymentAction) -> Result<(), PaymentError> {
        if self.allows(action) {
            Ok(())
        } else {
            Err(PaymentError::InvalidStateTransition {
                current_status: *self,
                action,
            })
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::RefundCompleted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Wait => "PAYMENT_WAIT",
            PaymentStatus::Request => "PAYMENT_REQUEST",
            PaymentStatus::Completed => "PAYMENT_COMPLETED",
            PaymentStatus::Failed => "PAYMENT_FAILED",
            PaymentStatus::Cancelled => "PAYMENT_CANCELLED",
            PaymentStatus::RefundRequested => "REFUND_REQUESTED",
            PaymentStatus::RefundCompleted => "REFUND_COMPLETED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAYMENT_WAIT" => Ok(PaymentStatus::Wait),
            "PAYMENT_REQUEST" => Ok(PaymentStatus::Request),
            "PAYMENT_COMPLETED" => Ok(PaymentStatus::Completed),
            "PAYMENT_FAILED" => Ok(PaymentStatus::Failed),
            "PAYMENT_CANCELLED" => Ok(PaymentStatus::Cancelled),
            "REFUND_REQUESTED" => Ok(PaymentStatus::RefundRequested),
            "REFUND_COMPLETED" => Ok(PaymentStatus::RefundCompleted),
            other => Err(PaymentError::InvalidArgument(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

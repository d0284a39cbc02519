//! Payment aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, UserId, Version};

use super::{
    ChargeDetails, HistoryEntry, Money, PaymentAction, PaymentError, PaymentEventType,
    PaymentMethod, PaymentStatus,
};

/// Payment aggregate root.
///
/// One payment settles one order. State changes only through the command
/// methods below; each of them validates the current status first and leaves
/// the payment untouched when it fails. Every successful command appends
/// exactly one [`HistoryEntry`].
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    id: PaymentId,
    order_id: OrderId,
    user_id: UserId,

    /// Persisted version for optimistic concurrency.
    version: Version,

    status: PaymentStatus,

    /// Set together with the transition to `Request`.
    charge: Option<ChargeDetails>,

    created_at: DateTime<Utc>,
    requested_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    refund_requested_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    stock_confirmed_at: Option<DateTime<Utc>>,

    pg_transaction_id: Option<String>,
    pg_approval_number: Option<String>,
    refund_transaction_id: Option<String>,

    refund_amount: Option<Money>,
    refund_reason: Option<String>,
    cancellation_reason: Option<String>,
    failure_reason: Option<String>,

    history: Vec<HistoryEntry>,
}

// Query methods
impl Payment {
    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn charge(&self) -> Option<&ChargeDetails> {
        self.charge.as_ref()
    }

    pub fn total_amount(&self) -> Option<Money> {
        self.charge.map(|c| c.total_amount())
    }

    /// Amount actually charged to the user.
    pub fn payment_amount(&self) -> Option<Money> {
        self.charge.map(|c| c.payment_amount())
    }

    pub fn discount_amount(&self) -> Option<Money> {
        self.charge.map(|c| c.discount_amount())
    }

    pub fn delivery_fee(&self) -> Option<Money> {
        self.charge.map(|c| c.delivery_fee())
    }

    pub fn method(&self) -> Option<PaymentMethod> {
        self.charge.map(|c| c.method())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn failed_at(&self) -> Option<DateTime<Utc>> {
        self.failed_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn refund_requested_at(&self) -> Option<DateTime<Utc>> {
        self.refund_requested_at
    }

    pub fn refunded_at(&self) -> Option<DateTime<Utc>> {
        self.refunded_at
    }

    pub fn stock_confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.stock_confirmed_at
    }

    pub fn pg_transaction_id(&self) -> Option<&str> {
        self.pg_transaction_id.as_deref()
    }

    pub fn pg_approval_number(&self) -> Option<&str> {
        self.pg_approval_number.as_deref()
    }

    pub fn refund_transaction_id(&self) -> Option<&str> {
        self.refund_transaction_id.as_deref()
    }

    pub fn refund_amount(&self) -> Option<Money> {
        self.refund_amount
    }

    pub fn refund_reason(&self) -> Option<&str> {
        self.refund_reason.as_deref()
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Recorded transitions, oldest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Returns true once stock confirmation has been recorded.
    pub fn is_reservation_finalized(&self) -> bool {
        self.stock_confirmed_at.is_some()
    }
}

// Command methods
impl Payment {
    /// Creates a payment in `Wait` for an order whose stock is reserved.
    pub fn create(order_id: OrderId, user_id: UserId) -> Self {
        let mut payment = Self {
            id: PaymentId::new(),
            order_id,
            user_id,
            version: Version::initial(),
            status: PaymentStatus::Wait,
            charge: None,
            created_at: Utc::now(),
            requested_at: None,
            completed_at: None,
            failed_at: None,
            cancelled_at: None,
            refund_requested_at: None,
            refunded_at: None,
            stock_confirmed_at: None,
            pg_transaction_id: None,
            pg_approval_number: None,
            refund_transaction_id: None,
            refund_amount: None,
            refund_reason: None,
            cancellation_reason: None,
            failure_reason: None,
            history: Vec::new(),
        };
        payment.record(
            PaymentEventType::PaymentCreated,
            format!("payment created for order {order_id}"),
        );
        payment
    }

    /// Sends the payment to the gateway: `Wait` → `Request`.
    pub fn request_payment(
        &mut self,
        pg_transaction_id: impl Into<String>,
        charge: ChargeDetails,
    ) -> Result<(), PaymentError> {
        self.status.check(PaymentAction::Request)?;
        let pg_transaction_id = non_blank(pg_transaction_id.into(), "gateway transaction id")?;

        self.record(
            PaymentEventType::PaymentRequested,
            format!(
                "payment requested (tx: {pg_transaction_id}, amount: {}, method: {})",
                charge.payment_amount(),
                charge.method()
            ),
        );
        self.charge = Some(charge);
        self.pg_transaction_id = Some(pg_transaction_id);
        self.requested_at = Some(Utc::now());
        self.status = PaymentStatus::Request;
        Ok(())
    }

    /// Gateway approved the charge: `Request` → `Completed`.
    pub fn complete(&mut self, approval_number: impl Into<String>) -> Result<(), PaymentError> {
        self.status.check(PaymentAction::Complete)?;
        let approval_number = non_blank(approval_number.into(), "approval number")?;

        self.record(
            PaymentEventType::PaymentCompleted,
            format!("payment completed (approval: {approval_number})"),
        );
        self.pg_approval_number = Some(approval_number);
        self.completed_at = Some(Utc::now());
        self.status = PaymentStatus::Completed;
        Ok(())
    }

    /// `Wait` or `Request` → `Cancelled`.
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), PaymentError> {
        self.status.check(PaymentAction::Cancel)?;
        let reason = reason.into();

        self.record(
            PaymentEventType::PaymentCancelled,
            format!("payment cancelled: {reason}"),
        );
        self.cancellation_reason = Some(reason);
        self.cancelled_at = Some(Utc::now());
        self.status = PaymentStatus::Cancelled;
        Ok(())
    }

    /// `Completed` → `RefundRequested`. The amount must be in `(0, paid]`.
    pub fn request_refund(
        &mut self,
        reason: impl Into<String>,
        amount: Money,
    ) -> Result<(), PaymentError> {
        self.status.check(PaymentAction::RequestRefund)?;
        let paid = self.payment_amount().unwrap_or_default();
        if !amount.is_positive() || amount > paid {
            return Err(PaymentError::InvalidArgument(format!(
                "refund amount must be between 0 and payment amount {paid}, got {amount}"
            )));
        }
        let reason = reason.into();

        self.record(
            PaymentEventType::RefundRequested,
            format!("refund requested: {reason} (amount: {amount})"),
        );
        self.refund_amount = Some(amount);
        self.refund_reason = Some(reason);
        self.refund_requested_at = Some(Utc::now());
        self.status = PaymentStatus::RefundRequested;
        Ok(())
    }

    /// `RefundRequested` → `RefundCompleted`.
    pub fn complete_refund(
        &mut self,
        refund_transaction_id: impl Into<String>,
    ) -> Result<(), PaymentError> {
        self.status.check(PaymentAction::CompleteRefund)?;
        let refund_transaction_id =
            non_blank(refund_transaction_id.into(), "refund transaction id")?;

        self.record(
            PaymentEventType::RefundCompleted,
            format!("refund completed (tx: {refund_transaction_id})"),
        );
        self.refund_transaction_id = Some(refund_transaction_id);
        self.refunded_at = Some(Utc::now());
        self.status = PaymentStatus::RefundCompleted;
        Ok(())
    }

    /// Gateway rejected the charge: `Request` → `Failed`.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), PaymentError> {
        self.status.check(PaymentAction::MarkFailed)?;
        let reason = reason.into();

        self.record(
            PaymentEventType::PaymentFailed,
            format!("payment failed: {reason}"),
        );
        self.failure_reason = Some(reason);
        self.failed_at = Some(Utc::now());
        self.status = PaymentStatus::Failed;
        Ok(())
    }

    /// Records that stock for a completed payment has been confirmed.
    ///
    /// Status stays `Completed`. Allowed once.
    pub fn finalize_reservation(&mut self) -> Result<(), PaymentError> {
        self.status.check(PaymentAction::FinalizeReservation)?;
        if self.stock_confirmed_at.is_some() {
            return Err(PaymentError::ReservationAlreadyFinalized(self.id));
        }

        self.record(
            PaymentEventType::ReservationFinalized,
            "stock reservation confirmed",
        );
        self.stock_confirmed_at = Some(Utc::now());
        Ok(())
    }

    fn record(&mut self, event_type: PaymentEventType, summary: impl Into<String>) {
        self.history.push(HistoryEntry::new(event_type, summary));
    }
}

fn non_blank(value: String, field: &str) -> Result<String, PaymentError> {
    if value.trim().is_empty() {
        Err(PaymentError::InvalidArgument(format!("{field} must not be blank")))
    } else {
        Ok(value)
    }
}

/// Flat, persistence-facing view of a [`Payment`].
///
/// Repositories read and write this shape. It bypasses command validation,
/// so it must only carry state that was produced by the aggregate itself.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub version: Version,
    pub status: PaymentStatus,
    pub charge: Option<ChargeDetails>,
    pub created_at: DateTime<Utc>,
    pub requested_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refund_requested_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub stock_confirmed_at: Option<DateTime<Utc>>,
    pub pg_transaction_id: Option<String>,
    pub pg_approval_number: Option<String>,
    pub refund_transaction_id: Option<String>,
    pub refund_amount: Option<Money>,
    pub refund_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub failure_reason: Option<String>,
    pub history: Vec<HistoryEntry>,
}

impl From<PaymentRecord> for Payment {
    fn from(r: PaymentRecord) -> Self {
        Self {
            id: r.id,
            order_id: r.order_id,
            user_id: r.user_id,
            version: r.version,
            status: r.status,
            charge: r.charge,
            created_at: r.created_at,
            requested_at: r.requested_at,
            completed_at: r.completed_at,
            failed_at: r.failed_at,
            cancelled_at: r.cancelled_at,
            refund_requested_at: r.refund_requested_at,
            refunded_at: r.refunded_at,
            stock_confirmed_at: r.stock_confirmed_at,
            pg_transaction_id: r.pg_transaction_id,
            pg_approval_number: r.pg_approval_number,
            refund_transaction_id: r.refund_transaction_id,
            refund_amount: r.refund_amount,
            refund_reason: r.refund_reason,
            cancellation_reason: r.cancellation_reason,
            failure_reason: r.failure_reason,
            history: r.history,
        }
    }
}

impl From<&Payment> for PaymentRecord {
    fn from(p: &Payment) -> Self {
        Self {
            id: p.id,
            order_id: p.order_id,
            user_id: p.user_id,
            version: p.version,
            status: p.status,
            charge: p.charge,
            created_at: p.created_at,
            requested_at: p.requested_at,
            completed_at: p.completed_at,
            failed_at: p.failed_at,
            cancelled_at: p.cancelled_at,
            refund_requested_at: p.refund_requested_at,
            refunded_at: p.refunded_at,
            stock_confirmed_at: p.stock_confirmed_at,
            pg_transaction_id: p.pg_transaction_id.clone(),
            pg_approval_number: p.pg_approval_number.clone(),
            refund_transaction_id: p.refund_transaction_id.clone(),
            refund_amount: p.refund_amount,
            refund_reason: p.refund_reason.clone(),
            cancellation_reason: p.cancellation_reason.clone(),
            failure_reason: p.failure_reason.clone(),
            history: p.history.clone(),
        }
    }
}

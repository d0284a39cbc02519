use async_trait::async_trait;
use common::{OrderId, PaymentId, UserId};
use domain::{Payment, PaymentStatus};

use crate::Result;

/// One page of a user's payments.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPage {
    /// Newest first.
    pub payments: Vec<Payment>,
    /// Matching payments across all pages.
    pub total: u64,
}

/// Storage for payment aggregates.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn load_by_id(&self, id: PaymentId) -> Result<Option<Payment>>;

    async fn load_by_order_id(&self, order_id: OrderId) -> Result<Option<Payment>>;

    /// Lists the user's payments ordered by creation time, newest first,
    /// optionally restricted to one status. `page` counts from 1.
    async fn list_by_user(
        &self,
        user_id: UserId,
        status: Option<PaymentStatus>,
        page: u32,
        limit: u32,
    ) -> Result<PaymentPage>;

    /// Persists the payment and its new history entries.
    ///
    /// The stored version must equal `payment.version()`, otherwise the call
    /// fails with `ConcurrencyConflict`. A payment at the initial version is
    /// inserted. Returns the payment at its new version.
    async fn save(&self, payment: &Payment) -> Result<Payment>;
}

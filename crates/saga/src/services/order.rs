//! Order collaborator port and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{OrderId, PaymentId};
use serde::{Deserialize, Serialize};

use crate::error::CoordinatorError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
}

/// Order data shown alongside a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub order_number: String,
    pub items: Vec<OrderItem>,
}

/// A committed payment change the Order domain is told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    Requested,
    Completed,
    Failed { reason: String },
    Cancelled { reason: String },
    RefundRequested,
    RefundCompleted,
}

/// Trait for the Order domain as seen from payments.
///
/// Calls may be repeated after a failure, so implementations must tolerate
/// the same call arriving twice.
#[async_trait]
pub trait OrderPort: Send + Sync {
    async fn find_order_summary(
        &self,
        order_id: OrderId,
    ) -> Result<Option<OrderSummary>, CoordinatorError>;

    /// Links the order to its payment and moves it to payment-pending.
    async fn mark_pending(
        &self,
        order_id: OrderId,
        payment_id: PaymentId,
    ) -> Result<(), CoordinatorError>;

    async fn has_existing_payment(&self, order_id: OrderId) -> Result<bool, CoordinatorError>;

    /// Turns the order's stock reservation into a committed deduction.
    async fn confirm_reservation(&self, order_id: OrderId) -> Result<(), CoordinatorError>;

    /// Tells the order about a committed payment change.
    ///
    /// Calls are made after the payment lock is released and each runs on its
    /// own task, so two changes committed back to back may arrive in either
    /// order. Implementations must not assume arrival order matches commit
    /// order; the payment's own status is authoritative.
    async fn record_payment_outcome(
        &self,
        order_id: OrderId,
        payment_id: PaymentId,
        outcome: PaymentOutcome,
    ) -> Result<(), CoordinatorError>;
}

#[derive(Debug, Default)]
struct OrderEntry {
    summary: Option<OrderSummary>,
    payment_id: Option<PaymentId>,
    reservation_confirmed: bool,
    outcomes: Vec<PaymentOutcome>,
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: HashMap<OrderId, OrderEntry>,
    unavailable: bool,
    fail_on_confirm: bool,
}

/// In-memory Order domain for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderService {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_order(&self, summary: OrderSummary) {
        let order_id = summary.order_id;
        let mut state = self.state.write().unwrap();
        state.orders.entry(order_id).or_default().summary = Some(summary);
    }

    /// Makes every call fail as if the Order service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    pub fn set_fail_on_confirm(&self, fail: bool) {
        self.state.write().unwrap().fail_on_confirm = fail;
    }

    pub fn payment_for(&self, order_id: OrderId) -> Option<PaymentId> {
        self.state
            .read()
            .unwrap()
            .orders
            .get(&order_id)
            .and_then(|o| o.payment_id)
    }

    pub fn is_reservation_confirmed(&self, order_id: OrderId) -> bool {
        self.state
            .read()
            .unwrap()
            .orders
            .get(&order_id)
            .is_some_and(|o| o.reservation_confirmed)
    }

    pub fn outcomes(&self, order_id: OrderId) -> Vec<PaymentOutcome> {
        self.state
            .read()
            .unwrap()
            .orders
            .get(&order_id)
            .map(|o| o.outcomes.clone())
            .unwrap_or_default()
    }

    fn check_available(state: &InMemoryOrderState) -> Result<(), CoordinatorError> {
        if state.unavailable {
            return Err(CoordinatorError::OrderService(
                "order service unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderPort for InMemoryOrderService {
    async fn find_order_summary(
        &self,
        order_id: OrderId,
    ) -> Result<Option<OrderSummary>, CoordinatorError> {
        let state = self.state.read().unwrap();
        Self::check_available(&state)?;
        Ok(state
            .orders
            .get(&order_id)
            .and_then(|o| o.summary.clone()))
    }

    async fn mark_pending(
        &self,
        order_id: OrderId,
        payment_id: PaymentId,
    ) -> Result<(), CoordinatorError> {
        let mut state = self.state.write().unwrap();
        Self::check_available(&state)?;

        let entry = state.orders.entry(order_id).or_default();
        match entry.payment_id {
            Some(existing) if existing != payment_id => Err(CoordinatorError::OrderService(
                format!("order {order_id} is already linked to payment {existing}"),
            )),
            _ => {
                entry.payment_id = Some(payment_id);
                Ok(())
            }
        }
    }

    async fn has_existing_payment(&self, order_id: OrderId) -> Result<bool, CoordinatorError> {
        let state = self.state.read().unwrap();
        Self::check_available(&state)?;
        Ok(state
            .orders
            .get(&order_id)
            .is_some_and(|o| o.payment_id.is_some()))
    }

    async fn confirm_reservation(&self, order_id: OrderId) -> Result<(), CoordinatorError> {
        let mut state = self.state.write().unwrap();
        Self::check_available(&state)?;
        if state.fail_on_confirm {
            return Err(CoordinatorError::OrderService(format!(
                "stock reservation for order {order_id} could not be confirmed"
            )));
        }
        state.orders.entry(order_id).or_default().reservation_confirmed = true;
        Ok(())
    }

    async fn record_payment_outcome(
        &self,
        order_id: OrderId,
        _payment_id: PaymentId,
        outcome: PaymentOutcome,
    ) -> Result<(), CoordinatorError> {
        let mut state = self.state.write().unwrap();
        Self::check_available(&state)?;
        state.orders.entry(order_id).or_default().outcomes.push(outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_pending_links_once() {
        let orders = InMemoryOrderService::new();
        let order_id = OrderId::new();
        let payment_id = PaymentId::new();

        assert!(!orders.has_existing_payment(order_id).await.unwrap());
        orders.mark_pending(order_id, payment_id).await.unwrap();
        // Repeating the same link is fine.
        orders.mark_pending(order_id, payment_id).await.unwrap();
        assert!(orders.has_existing_payment(order_id).await.unwrap());

        let result = orders.mark_pending(order_id, PaymentId::new()).await;
        assert!(matches!(result, Err(CoordinatorError::OrderService(_))));
        assert_eq!(orders.payment_for(order_id), Some(payment_id));
    }

    #[tokio::test]
    async fn test_unavailable() {
        let orders = InMemoryOrderService::new();
        orders.set_unavailable(true);

        let result = orders.confirm_reservation(OrderId::new()).await;
        assert!(matches!(result, Err(CoordinatorError::OrderService(_))));
    }

    #[tokio::test]
    async fn test_summary_lookup() {
        let orders = InMemoryOrderService::new();
        let order_id = OrderId::new();
        assert!(orders.find_order_summary(order_id).await.unwrap().is_none());

        orders.add_order(OrderSummary {
            order_id,
            order_number: "ORD-20250101-001".to_string(),
            items: vec![OrderItem {
                product_id: "SKU-1".to_string(),
                product_name: "Keyboard".to_string(),
                quantity: 1,
            }],
        });
        let summary = orders.find_order_summary(order_id).await.unwrap().unwrap();
        assert_eq!(summary.order_number, "ORD-20250101-001");
    }

    #[tokio::test]
    async fn test_outcomes_accepted_in_any_order() {
        let orders = InMemoryOrderService::new();
        let order_id = OrderId::new();
        let payment_id = PaymentId::new();

        orders
            .record_payment_outcome(order_id, payment_id, PaymentOutcome::Completed)
            .await
            .unwrap();
        orders
            .record_payment_outcome(order_id, payment_id, PaymentOutcome::Requested)
            .await
            .unwrap();

        assert_eq!(
            orders.outcomes(order_id),
            vec![PaymentOutcome::Completed, PaymentOutcome::Requested]
        );
    }
}

//! Reactions to committed payment events inside this service.

use std::sync::Arc;

use async_trait::async_trait;
use domain::PaymentEvent;

use crate::Result;
use crate::dispatcher::EventHandler;
use crate::services::{OrderPort, PaymentOutcome};

/// Tells the Order domain about every committed payment change.
pub struct OrderSyncHandler {
    orders: Arc<dyn OrderPort>,
}

impl OrderSyncHandler {
    pub fn new(orders: Arc<dyn OrderPort>) -> Self {
        Self { orders }
    }
}

fn outcome_of(event: &PaymentEvent) -> PaymentOutcome {
    match event {
        PaymentEvent::PaymentRequested(_) => PaymentOutcome::Requested,
        PaymentEvent::PaymentCompleted(_) => PaymentOutcome::Completed,
        PaymentEvent::PaymentFailed(d) => PaymentOutcome::Failed {
            reason: d.failure_reason.clone(),
        },
        PaymentEvent::PaymentCancelled(d) => PaymentOutcome::Cancelled {
            reason: d.cancellation_reason.as_str().to_string(),
        },
        PaymentEvent::PaymentRefundRequested(_) => PaymentOutcome::RefundRequested,
        PaymentEvent::PaymentRefundCompleted(_) => PaymentOutcome::RefundCompleted,
    }
}

#[async_trait]
impl EventHandler for OrderSyncHandler {
    fn name(&self) -> &'static str {
        "order_sync"
    }

    async fn handle(&self, event: &PaymentEvent) -> Result<()> {
        let outcome = outcome_of(event);
        tracing::info!(
            order_id = %event.order_id(),
            payment_id = %event.payment_id(),
            ?outcome,
            "syncing payment outcome to order"
        );
        self.orders
            .record_payment_outcome(event.order_id(), event.payment_id(), outcome)
            .await
    }
}

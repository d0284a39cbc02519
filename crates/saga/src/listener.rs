//! Inbound SAGA listener for order and stock events.

use std::sync::Arc;

use message_log::Record;
use store::ProcessedEventStore;

use crate::coordinator::PaymentCoordinator;
use crate::error::Result;
use crate::topics;
use crate::upstream::{OrderConfirmed, OrderCreated, StockConfirmed};

/// Name under which handled upstream events are remembered.
pub const CONSUMER_NAME: &str = "payment-saga";

/// What the listener did with a record. Every variant may be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerOutcome {
    Processed,
    /// The upstream event id was handled before.
    Duplicate,
    /// The record can never be applied; retrying would not help.
    Skipped(String),
}

/// Applies upstream events to payments.
///
/// An `Err` means the record must not be committed and will be delivered
/// again. Handled event ids are stored so a redelivered record has no
/// second effect.
pub struct SagaListener {
    coordinator: Arc<PaymentCoordinator>,
    processed: Arc<dyn ProcessedEventStore>,
}

impl SagaListener {
    pub fn new(
        coordinator: Arc<PaymentCoordinator>,
        processed: Arc<dyn ProcessedEventStore>,
    ) -> Self {
        Self {
            coordinator,
            processed,
        }
    }

    #[tracing::instrument(
        skip(self, record),
        fields(topic = %record.topic, partition = record.partition, offset = %record.offset)
    )]
    pub async fn handle(&self, record: &Record) -> Result<ListenerOutcome> {
        match record.topic.as_str() {
            topics::ORDER_CREATED => {
                let Ok(event) = record.decode::<OrderCreated>() else {
                    return Ok(malformed(record));
                };
                tracing::info!(
                    order_id = %event.order_id,
                    user_id = %event.user_id,
                    total_amount = %event.total_amount,
                    "order created"
                );
                Ok(ListenerOutcome::Processed)
            }
            topics::ORDER_CONFIRMED => {
                let Ok(event) = record.decode::<OrderConfirmed>() else {
                    return Ok(malformed(record));
                };
                let (order_id, user_id) = (event.order_id, event.user_id);
                self.once(&event.event_id, move || async move {
                    tracing::info!(%order_id, "creating waiting payment");
                    self.coordinator
                        .create_waiting_payment(order_id, user_id)
                        .await
                        .map(|_| ())
                })
                .await
            }
            topics::STOCK_CONFIRMED => {
                let Ok(event) = record.decode::<StockConfirmed>() else {
                    return Ok(malformed(record));
                };
                let order_id = event.order_id;
                self.once(&event.event_id, move || async move {
                    tracing::info!(%order_id, "finalizing stock reservation");
                    self.coordinator
                        .finalize_reservation(order_id)
                        .await
                        .map(|_| ())
                })
                .await
            }
            other => Ok(ListenerOutcome::Skipped(format!("unexpected topic {other}"))),
        }
    }

    /// Runs `apply` unless `event_id` was handled before, then remembers it.
    ///
    /// Final business rejections are remembered too, as skipped.
    async fn once<F, Fut>(&self, event_id: &str, apply: F) -> Result<ListenerOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        if self.processed.is_processed(CONSUMER_NAME, event_id).await? {
            tracing::info!(event_id, "upstream event already processed");
            return Ok(ListenerOutcome::Duplicate);
        }

        let outcome = match apply().await {
            Ok(()) => ListenerOutcome::Processed,
            Err(e) if !e.is_retryable() => {
                tracing::warn!(event_id, error = %e, "upstream event rejected, skipping");
                ListenerOutcome::Skipped(e.to_string())
            }
            Err(e) => return Err(e),
        };

        self.processed.mark_processed(CONSUMER_NAME, event_id).await?;
        Ok(outcome)
    }
}

fn malformed(record: &Record) -> ListenerOutcome {
    tracing::warn!(event_id = %record.event_id, "malformed upstream event, skipping");
    ListenerOutcome::Skipped("malformed payload".to_string())
}

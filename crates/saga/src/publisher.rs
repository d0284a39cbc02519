//! Publishes committed payment events to the message log.

use std::sync::Arc;

use async_trait::async_trait;
use domain::PaymentEvent;
use message_log::{MessageLog, OutgoingMessage};

use crate::Result;
use crate::dispatcher::EventHandler;
use crate::topics;

/// Header carrying the event type on every outbound record.
pub const EVENT_TYPE_HEADER: &str = "event_type";

/// Writes each event to its topic, keyed by order id.
///
/// Keying by order keeps every event of one order on one partition, in the
/// order they were committed. A failed publish is logged and counted; the
/// payment change it reports stays committed.
pub struct OutboundPublisher {
    log: Arc<dyn MessageLog>,
}

impl OutboundPublisher {
    pub fn new(log: Arc<dyn MessageLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl EventHandler for OutboundPublisher {
    fn name(&self) -> &'static str {
        "outbound_publisher"
    }

    async fn handle(&self, event: &PaymentEvent) -> Result<()> {
        let topic = topics::for_event(event);
        let message = OutgoingMessage::new(topic, event.order_id().to_string(), event.to_payload()?)
            .with_event_id(event.event_id())
            .with_header(EVENT_TYPE_HEADER, event.event_type());

        match self.log.publish(message).await {
            Ok(metadata) => {
                metrics::counter!("payment_events_published_total", "topic" => topic).increment(1);
                tracing::info!(
                    topic,
                    payment_id = %event.payment_id(),
                    order_id = %event.order_id(),
                    partition = metadata.partition,
                    offset = %metadata.offset,
                    "payment event published"
                );
                Ok(())
            }
            Err(e) => {
                metrics::counter!("payment_publish_failures_total", "topic" => topic).increment(1);
                tracing::error!(
                    topic,
                    payment_id = %event.payment_id(),
                    order_id = %event.order_id(),
                    error = %e,
                    "failed to publish payment event"
                );
                Err(e.into())
            }
        }
    }
}

//! After-commit delivery of payment events.
//!
//! Write paths collect events in [`PendingEvents`] while the payment is being
//! mutated. Only a successful save turns them into [`CommittedEvents`], the
//! sole input the [`EventDispatcher`] accepts. An aborted write drops its
//! pending events, so no reaction ever fires for a change that was not stored.

use std::sync::Arc;

use async_trait::async_trait;
use domain::PaymentEvent;

use crate::Result;

/// Reacts to committed payment events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs and metrics labels.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &PaymentEvent) -> Result<()>;
}

/// Events produced by a write that has not been persisted yet.
#[derive(Debug, Default)]
pub struct PendingEvents {
    events: Vec<PaymentEvent>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: PaymentEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Marks the events as belonging to a persisted change.
    ///
    /// Call only after the save that produced them has succeeded.
    pub fn commit(self) -> CommittedEvents {
        CommittedEvents(self.events)
    }
}

/// Events whose originating change is durable.
#[derive(Debug, Default)]
pub struct CommittedEvents(Vec<PaymentEvent>);

impl CommittedEvents {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PaymentEvent> {
        self.0.iter()
    }
}

impl IntoIterator for CommittedEvents {
    type Item = PaymentEvent;
    type IntoIter = std::vec::IntoIter<PaymentEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Delivers committed events to every registered handler.
///
/// Each handler call runs in its own task. A handler that fails or panics is
/// logged and counted; it never affects the payment change that produced the
/// event, nor the other handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler. Handlers see each event in registration order.
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub async fn dispatch(&self, events: CommittedEvents) {
        for event in events {
            let event = Arc::new(event);
            for handler in &self.handlers {
                let name = handler.name();
                let task_handler = Arc::clone(handler);
                let task_event = Arc::clone(&event);

                let outcome =
                    tokio::spawn(async move { task_handler.handle(&task_event).await }).await;

                match outcome {
                    Ok(Ok(())) => {
                        tracing::debug!(
                            handler = name,
                            event_type = event.event_type(),
                            "event handled"
                        );
                    }
                    Ok(Err(e)) => {
                        metrics::counter!("payment_event_handler_failures_total", "handler" => name)
                            .increment(1);
                        tracing::error!(
                            handler = name,
                            event_type = event.event_type(),
                            payment_id = %event.payment_id(),
                            error = %e,
                            "event handler failed"
                        );
                    }
                    Err(join_error) => {
                        metrics::counter!("payment_event_handler_failures_total", "handler" => name)
                            .increment(1);
                        tracing::error!(
                            handler = name,
                            event_type = event.event_type(),
                            payment_id = %event.payment_id(),
                            error = %join_error,
                            "event handler panicked"
                        );
                    }
                }
            }
        }
    }
}

//! Payment coordination inside the order-fulfillment SAGA.
//!
//! This crate drives the payment aggregate from its three entry points:
//! commands, gateway callbacks and upstream SAGA events.
//!
//! - [`PaymentCoordinator`] runs every write under the payment's lock, with
//!   callbacks additionally guarded by an idempotency key
//! - [`EventDispatcher`] delivers events only once the change that produced
//!   them is saved, each handler isolated from the others
//! - [`OutboundPublisher`] and [`OrderSyncHandler`] are the after-commit
//!   reactions: the message log and the Order domain
//! - [`SagaListener`] and [`SagaConsumer`] consume `order.confirmed` and
//!   `stock.confirmed`, committing offsets only after a record is handled

pub mod config;
pub mod consumer;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod listener;
pub mod publisher;
pub mod services;
pub mod topics;
pub mod upstream;

pub use config::{ConsumerConfig, CoordinatorConfig};
pub use consumer::SagaConsumer;
pub use coordinator::{
    CommandOutcome, CoordinatorPorts, MAX_PAGE_SIZE, PaymentCoordinator, PaymentDetails,
    PaymentRequested, RequestPayment,
};
pub use dispatcher::{CommittedEvents, EventDispatcher, EventHandler, PendingEvents};
pub use error::{CoordinatorError, Result};
pub use handlers::OrderSyncHandler;
pub use listener::{CONSUMER_NAME, ListenerOutcome, SagaListener};
pub use publisher::OutboundPublisher;
pub use services::{
    GatewayRequest, InMemoryOrderService, InMemoryPaymentGateway, OrderItem, OrderPort,
    OrderSummary, PaymentGateway, PaymentOutcome,
};
pub use upstream::{OrderConfirmed, OrderCreated, StockConfirmed};

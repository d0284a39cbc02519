//! Collaborator ports and in-memory implementations.

pub mod gateway;
pub mod order;

pub use gateway::{GatewayRequest, InMemoryPaymentGateway, PaymentGateway};
pub use order::{InMemoryOrderService, OrderItem, OrderPort, OrderSummary, PaymentOutcome};

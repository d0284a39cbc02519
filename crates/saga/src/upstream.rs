//! Events consumed from the Order and Stock domains.

use common::{OrderId, PaymentId, UserId};
use domain::Money;
use serde::{Deserialize, Serialize};

/// An order was placed. Payments take no action on it yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub event_id: String,
    pub event_timestamp: i64,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total_amount: Money,
}

/// Stock for the order is reserved; a payment should now be awaited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub event_id: String,
    pub event_timestamp: i64,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total_amount: Money,
}

/// The reserved stock was deducted after the payment completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockConfirmed {
    pub event_id: String,
    pub event_timestamp: i64,
    pub order_id: OrderId,
    #[serde(default)]
    pub payment_id: Option<PaymentId>,
}

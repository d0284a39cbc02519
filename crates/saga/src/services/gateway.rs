//! Payment gateway port and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::PaymentId;
use domain::Money;

use crate::error::CoordinatorError;

/// What the gateway returns for an accepted payment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    /// Gateway-side transaction id. Callbacks refer to it.
    pub transaction_id: String,
    /// Where the buyer completes the payment.
    pub redirect_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Trait for the external payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a payment at the gateway for `amount`.
    async fn request_payment(
        &self,
        payment_id: PaymentId,
        amount: Money,
        order_reference: &str,
    ) -> Result<GatewayRequest, CoordinatorError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    requests: Vec<(PaymentId, Money, String)>,
    next_id: u32,
    fail_on_request: bool,
}

/// In-memory gateway for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following request fail as if the gateway were down.
    pub fn set_fail_on_request(&self, fail: bool) {
        self.state.write().unwrap().fail_on_request = fail;
    }

    pub fn request_count(&self) -> usize {
        self.state.read().unwrap().requests.len()
    }

    /// Amount and order reference of the last request for `payment_id`.
    pub fn last_request(&self, payment_id: PaymentId) -> Option<(Money, String)> {
        self.state
            .read()
            .unwrap()
            .requests
            .iter()
            .rev()
            .find(|(id, _, _)| *id == payment_id)
            .map(|(_, amount, reference)| (*amount, reference.clone()))
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn request_payment(
        &self,
        payment_id: PaymentId,
        amount: Money,
        order_reference: &str,
    ) -> Result<GatewayRequest, CoordinatorError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_request {
            return Err(CoordinatorError::Gateway(
                "gateway unavailable".to_string(),
            ));
        }

        state.next_id += 1;
        let transaction_id = format!("PG-{:04}", state.next_id);
        state
            .requests
            .push((payment_id, amount, order_reference.to_string()));

        Ok(GatewayRequest {
            redirect_url: format!("https://pay.example.com/checkout/{transaction_id}"),
            transaction_id,
            expires_at: Utc::now() + Duration::minutes(15),
        })
    }
}

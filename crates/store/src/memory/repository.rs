use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{OrderId, PaymentId, UserId};
use domain::{Payment, PaymentRecord, PaymentStatus};
use tokio::sync::RwLock;

use crate::{PaymentPage, PaymentRepository, Result, StoreError};

/// In-memory payment repository.
#[derive(Clone, Default)]
pub struct InMemoryPaymentRepository {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
    fail_on_save: Arc<AtomicBool>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail until reset.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.fail_on_save.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored payments.
    pub async fn payment_count(&self) -> usize {
        self.payments.read().await.len()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn load_by_id(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.payments.read().await.get(&id).cloned())
    }

    async fn load_by_order_id(&self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| p.order_id() == order_id)
            .cloned())
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        status: Option<PaymentStatus>,
        page: u32,
        limit: u32,
    ) -> Result<PaymentPage> {
        let store = self.payments.read().await;
        let mut matching: Vec<&Payment> = store
            .values()
            .filter(|p| p.user_id() == user_id)
            .filter(|p| status.is_none_or(|s| p.status() == s))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });

        let skip = page.saturating_sub(1) as usize * limit as usize;
        Ok(PaymentPage {
            total: matching.len() as u64,
            payments: matching
                .into_iter()
                .skip(skip)
                .take(limit as usize)
                .cloned()
                .collect(),
        })
    }

    async fn save(&self, payment: &Payment) -> Result<Payment> {
        if self.fail_on_save.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("saving disabled".to_string()));
        }

        let mut store = self.payments.write().await;

        let current = store
            .get(&payment.id())
            .map(|p| p.version())
            .unwrap_or_default();
        if current != payment.version() {
            return Err(StoreError::ConcurrencyConflict {
                payment_id: payment.id(),
                expected: payment.version(),
                actual: current,
            });
        }

        if payment.version().is_initial()
            && store.values().any(|p| p.order_id() == payment.order_id())
        {
            return Err(StoreError::DuplicateOrder(payment.order_id()));
        }

        let mut record = PaymentRecord::from(payment);
        record.version = payment.version().next();
        let saved = Payment::from(record);
        store.insert(saved.id(), saved.clone());
        Ok(saved)
    }
}

//! Payment coordinator: every write path of the payment service.
//!
//! A write runs as: take the payment's lock, check the callback's idempotency
//! key (callbacks only), load, apply the aggregate method, build the event,
//! save with the version check. The lock is released before committed events
//! are dispatched, so downstream reactions never extend the critical section.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, UserId};
use domain::{
    ChargeDetails, Money, Payment, PaymentAction, PaymentError, PaymentEvent,
    PaymentEventFactory, PaymentMethod, PaymentStatus,
};
use store::{
    IdempotencyGuard, IdempotencyStore, LockManager, PaymentLockCoordinator, PaymentPage,
    PaymentRepository, StoreError,
};

use crate::config::CoordinatorConfig;
use crate::dispatcher::{CommittedEvents, EventDispatcher, PendingEvents};
use crate::error::{CoordinatorError, Result};
use crate::services::{OrderPort, OrderSummary, PaymentGateway};

/// Result of a command that may be a replay of an earlier callback.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub payment: Payment,
    /// True when the idempotency key had already been used: nothing was
    /// applied and `payment` is the current stored state.
    pub already_processed: bool,
}

impl CommandOutcome {
    fn applied(payment: Payment) -> Self {
        Self {
            payment,
            already_processed: false,
        }
    }

    fn replayed(payment: Payment) -> Self {
        Self {
            payment,
            already_processed: true,
        }
    }
}

/// Amounts and method chosen when the buyer starts paying.
#[derive(Debug, Clone, Copy)]
pub struct RequestPayment {
    pub total_amount: Money,
    pub payment_amount: Money,
    pub discount_amount: Money,
    pub delivery_fee: Money,
    pub method: PaymentMethod,
}

/// Result of [`PaymentCoordinator::request_payment`].
#[derive(Debug, Clone)]
pub struct PaymentRequested {
    pub payment: Payment,
    pub redirect_url: String,
    pub expires_at: DateTime<Utc>,
}

/// A payment with the order data the Order domain could provide.
#[derive(Debug, Clone)]
pub struct PaymentDetails {
    pub payment: Payment,
    pub order: Option<OrderSummary>,
}

/// Largest page [`PaymentCoordinator::list_payments`] returns.
pub const MAX_PAGE_SIZE: u32 = 100;

/// The collaborators a [`PaymentCoordinator`] drives.
pub struct CoordinatorPorts {
    pub repository: Arc<dyn PaymentRepository>,
    pub locks: Arc<dyn LockManager>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub orders: Arc<dyn OrderPort>,
}

/// Coordinates payment commands, queries and their after-commit reactions.
pub struct PaymentCoordinator {
    repository: Arc<dyn PaymentRepository>,
    locks: PaymentLockCoordinator<Arc<dyn LockManager>>,
    idempotency: IdempotencyGuard<Arc<dyn IdempotencyStore>>,
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderPort>,
    dispatcher: EventDispatcher,
    config: CoordinatorConfig,
}

impl PaymentCoordinator {
    pub fn new(
        ports: CoordinatorPorts,
        dispatcher: EventDispatcher,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            repository: ports.repository,
            locks: PaymentLockCoordinator::new(ports.locks, config.lock),
            idempotency: IdempotencyGuard::new(ports.idempotency),
            gateway: ports.gateway,
            orders: ports.orders,
            dispatcher,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Creates the WAIT payment for an order whose stock has been reserved.
    ///
    /// Repeating the call for the same order returns the existing payment with
    /// `already_processed` set and re-links it to the order. No lock is taken:
    /// the repository admits one payment per order, and the loser of a
    /// creation race gets the winner's payment back as a replay.
    #[tracing::instrument(skip(self))]
    pub async fn create_waiting_payment(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<CommandOutcome> {
        if let Some(existing) = self.repository.load_by_order_id(order_id).await? {
            tracing::info!(payment_id = %existing.id(), "payment already exists for order");
            if existing.status() == PaymentStatus::Wait {
                self.orders.mark_pending(order_id, existing.id()).await?;
            }
            return Ok(CommandOutcome::replayed(existing));
        }

        if self.orders.has_existing_payment(order_id).await? {
            return Err(CoordinatorError::OrderAlreadyHasPayment(order_id));
        }

        let payment = Payment::create(order_id, user_id);
        let payment_id = payment.id();
        let saved = match self.repository.save(&payment).await {
            Ok(saved) => saved,
            Err(StoreError::DuplicateOrder(_)) => {
                let existing = self
                    .repository
                    .load_by_order_id(order_id)
                    .await?
                    .ok_or(CoordinatorError::OrderAlreadyHasPayment(order_id))?;
                tracing::info!(payment_id = %existing.id(), "lost creation race for order");
                return Ok(CommandOutcome::replayed(existing));
            }
            Err(e) => return Err(e.into()),
        };

        self.orders.mark_pending(order_id, payment_id).await?;
        metrics::counter!("payment_transitions_total", "action" => "create").increment(1);
        tracing::info!(%payment_id, "waiting payment created");

        Ok(CommandOutcome::applied(saved))
    }

    /// Opens the payment at the gateway: WAIT → REQUEST.
    #[tracing::instrument(skip(self, request), fields(method = %request.method))]
    pub async fn request_payment(
        &self,
        payment_id: PaymentId,
        request: RequestPayment,
    ) -> Result<PaymentRequested> {
        let (requested, committed) = self
            .locks
            .with_lock(payment_id, move || async move {
                let mut payment = self.load(payment_id).await?;
                // Reject before the gateway opens a payment that cannot be used.
                payment.status().check(PaymentAction::Request)?;
                let charge = ChargeDetails::new(
                    request.total_amount,
                    request.payment_amount,
                    request.discount_amount,
                    request.delivery_fee,
                    request.method,
                )?;

                let order_reference = format!("ORDER-{}", payment.order_id());
                let gateway = self
                    .gateway
                    .request_payment(payment_id, charge.payment_amount(), &order_reference)
                    .await?;
                tracing::info!(
                    pg_transaction_id = %gateway.transaction_id,
                    "gateway accepted payment request"
                );

                payment.request_payment(gateway.transaction_id, charge)?;
                let event = PaymentEventFactory::payment_requested(&payment)?;
                let (payment, committed) = self.persist(payment, Some(event)).await?;

                Ok::<_, CoordinatorError>((
                    PaymentRequested {
                        payment,
                        redirect_url: gateway.redirect_url,
                        expires_at: gateway.expires_at,
                    },
                    committed,
                ))
            })
            .await?;

        self.finish(PaymentAction::Request, committed).await;
        Ok(requested)
    }

    /// Gateway approval callback: REQUEST → COMPLETED.
    ///
    /// Confirms the order's stock reservation before the payment is saved.
    #[tracing::instrument(skip(self))]
    pub async fn complete_payment(
        &self,
        payment_id: PaymentId,
        approval_number: &str,
        idempotency_key: &str,
    ) -> Result<CommandOutcome> {
        self.run_command(
            payment_id,
            PaymentAction::Complete,
            Some(idempotency_key),
            || async move {
                let mut payment = self.load(payment_id).await?;
                payment.complete(approval_number)?;
                self.orders.confirm_reservation(payment.order_id()).await?;
                let event = PaymentEventFactory::payment_completed(&payment)?;
                self.persist(payment, Some(event)).await
            },
        )
        .await
    }

    /// Gateway rejection callback: REQUEST → FAILED.
    #[tracing::instrument(skip(self))]
    pub async fn mark_failed(
        &self,
        payment_id: PaymentId,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<CommandOutcome> {
        self.run_command(
            payment_id,
            PaymentAction::MarkFailed,
            Some(idempotency_key),
            || async move {
                let mut payment = self.load(payment_id).await?;
                payment.mark_failed(reason)?;
                let event = PaymentEventFactory::payment_failed(&payment)?;
                self.persist(payment, Some(event)).await
            },
        )
        .await
    }

    /// {WAIT, REQUEST} → CANCELLED.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_payment(&self, payment_id: PaymentId, reason: &str) -> Result<Payment> {
        let outcome = self
            .run_command(payment_id, PaymentAction::Cancel, None, || async move {
                let mut payment = self.load(payment_id).await?;
                let previous_status = payment.status();
                payment.cancel(reason)?;
                let event = PaymentEventFactory::payment_cancelled(&payment, previous_status)?;
                self.persist(payment, Some(event)).await
            })
            .await?;
        Ok(outcome.payment)
    }

    /// COMPLETED → REFUND_REQUESTED.
    #[tracing::instrument(skip(self))]
    pub async fn request_refund(
        &self,
        payment_id: PaymentId,
        reason: &str,
        amount: Money,
    ) -> Result<Payment> {
        let outcome = self
            .run_command(payment_id, PaymentAction::RequestRefund, None, || async move {
                let mut payment = self.load(payment_id).await?;
                payment.request_refund(reason, amount)?;
                let event = PaymentEventFactory::refund_requested(&payment)?;
                self.persist(payment, Some(event)).await
            })
            .await?;
        Ok(outcome.payment)
    }

    /// Gateway refund callback: REFUND_REQUESTED → REFUND_COMPLETED.
    #[tracing::instrument(skip(self))]
    pub async fn complete_refund(
        &self,
        payment_id: PaymentId,
        refund_transaction_id: &str,
        idempotency_key: &str,
    ) -> Result<CommandOutcome> {
        self.run_command(
            payment_id,
            PaymentAction::CompleteRefund,
            Some(idempotency_key),
            || async move {
                let mut payment = self.load(payment_id).await?;
                payment.complete_refund(refund_transaction_id)?;
                let event = PaymentEventFactory::refund_completed(&payment)?;
                self.persist(payment, Some(event)).await
            },
        )
        .await
    }

    /// Records that the stock of the order's completed payment is confirmed.
    #[tracing::instrument(skip(self))]
    pub async fn finalize_reservation(&self, order_id: OrderId) -> Result<Payment> {
        let payment_id = self.get_payment_by_order(order_id).await?.id();
        let outcome = self
            .run_command(
                payment_id,
                PaymentAction::FinalizeReservation,
                None,
                || async move {
                    let mut payment = self.load(payment_id).await?;
                    payment.finalize_reservation()?;
                    self.persist(payment, None).await
                },
            )
            .await?;
        Ok(outcome.payment)
    }

    /// Reads a payment without taking its lock.
    pub async fn get_payment(&self, payment_id: PaymentId) -> Result<Payment> {
        self.load(payment_id).await
    }

    pub async fn get_payment_by_order(&self, order_id: OrderId) -> Result<Payment> {
        self.repository
            .load_by_order_id(order_id)
            .await?
            .ok_or(CoordinatorError::PaymentNotFoundForOrder(order_id))
    }

    /// Lists a user's payments newest first, optionally by status.
    ///
    /// `page` counts from 1 and `limit` must be between 1 and
    /// [`MAX_PAGE_SIZE`].
    #[tracing::instrument(skip(self))]
    pub async fn list_payments(
        &self,
        user_id: UserId,
        status: Option<PaymentStatus>,
        page: u32,
        limit: u32,
    ) -> Result<PaymentPage> {
        if page == 0 {
            return Err(PaymentError::InvalidArgument("page starts at 1".to_string()).into());
        }
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(PaymentError::InvalidArgument(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}"
            ))
            .into());
        }

        let listed = self
            .repository
            .list_by_user(user_id, status, page, limit)
            .await?;
        tracing::debug!(total = listed.total, returned = listed.payments.len(), "listed payments");
        Ok(listed)
    }

    /// Reads a payment together with its order's summary.
    ///
    /// The summary is left out when the Order domain cannot provide it.
    pub async fn get_payment_details(&self, payment_id: PaymentId) -> Result<PaymentDetails> {
        let payment = self.load(payment_id).await?;
        let order = match self.orders.find_order_summary(payment.order_id()).await {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(
                    %payment_id,
                    order_id = %payment.order_id(),
                    error = %e,
                    "order summary unavailable"
                );
                None
            }
        };
        Ok(PaymentDetails { payment, order })
    }

    async fn load(&self, payment_id: PaymentId) -> Result<Payment> {
        self.repository
            .load_by_id(payment_id)
            .await?
            .ok_or(CoordinatorError::PaymentNotFound(payment_id))
    }

    /// Saves the payment; its events count as committed only if that works.
    async fn persist(
        &self,
        payment: Payment,
        event: Option<PaymentEvent>,
    ) -> Result<(Payment, CommittedEvents)> {
        let mut pending = PendingEvents::new();
        if let Some(event) = event {
            pending.push(event);
        }
        let saved = self.repository.save(&payment).await?;
        Ok((saved, pending.commit()))
    }

    /// Runs `body` under the payment's lock, behind the idempotency key if one
    /// is given, then dispatches what it committed.
    async fn run_command<F, Fut>(
        &self,
        payment_id: PaymentId,
        action: PaymentAction,
        idempotency_key: Option<&str>,
        body: F,
    ) -> Result<CommandOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(Payment, CommittedEvents)>>,
    {
        let (outcome, committed) = self
            .locks
            .with_lock(payment_id, move || async move {
                if let Some(key) = idempotency_key
                    && !self
                        .idempotency
                        .ensure(key, self.config.idempotency_ttl)
                        .await
                {
                    let payment = self.load(payment_id).await?;
                    tracing::info!(
                        %payment_id,
                        idempotency_key = key,
                        status = %payment.status(),
                        "callback already processed"
                    );
                    return Ok::<_, CoordinatorError>((CommandOutcome::replayed(payment), None));
                }

                match body().await {
                    Ok((payment, committed)) => {
                        Ok((CommandOutcome::applied(payment), Some(committed)))
                    }
                    Err(e) => {
                        if let Some(key) = idempotency_key {
                            self.idempotency.release(key).await;
                        }
                        Err(e)
                    }
                }
            })
            .await?;

        if let Some(committed) = committed {
            self.finish(action, committed).await;
        }
        Ok(outcome)
    }

    async fn finish(&self, action: PaymentAction, committed: CommittedEvents) {
        metrics::counter!("payment_transitions_total", "action" => action.metric_label())
            .increment(1);
        self.dispatcher.dispatch(committed).await;
    }
}

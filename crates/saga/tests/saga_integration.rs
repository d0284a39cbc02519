//! Integration tests for payment coordination and the inbound SAGA flow.

use std::sync::Arc;
use std::time::Duration;

use common::{OrderId, PaymentId, UserId};
use domain::{Money, PaymentError, PaymentEventType, PaymentMethod, PaymentStatus};
use message_log::{InMemoryMessageLog, MessageLog, MessageLogExt, Offset};
use saga::{
    CONSUMER_NAME, ConsumerConfig, CoordinatorConfig, CoordinatorError, CoordinatorPorts,
    EventDispatcher, InMemoryOrderService, InMemoryPaymentGateway, ListenerOutcome, OrderItem,
    OrderSummary, OrderSyncHandler, OutboundPublisher, PaymentCoordinator, PaymentOutcome,
    RequestPayment, SagaConsumer, SagaListener, topics,
};
use serde_json::json;
use store::{
    InMemoryIdempotencyStore, InMemoryLockManager, InMemoryPaymentRepository,
    InMemoryProcessedEventStore, LockManager, LockSettings, LockToken, PaymentRepository,
    ProcessedEventStore, lock::lock_key,
};
use tokio::sync::watch;

struct TestHarness {
    coordinator: Arc<PaymentCoordinator>,
    repository: InMemoryPaymentRepository,
    locks: InMemoryLockManager,
    processed: InMemoryProcessedEventStore,
    gateway: InMemoryPaymentGateway,
    orders: InMemoryOrderService,
    log: InMemoryMessageLog,
    listener: Arc<SagaListener>,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    fn with_config(config: CoordinatorConfig) -> Self {
        let repository = InMemoryPaymentRepository::new();
        let locks = InMemoryLockManager::new();
        let idempotency = InMemoryIdempotencyStore::new();
        let processed = InMemoryProcessedEventStore::new();
        let gateway = InMemoryPaymentGateway::new();
        let orders = InMemoryOrderService::new();
        let log = InMemoryMessageLog::new(3);

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Arc::new(OutboundPublisher::new(Arc::new(log.clone()))));
        dispatcher.register(Arc::new(OrderSyncHandler::new(Arc::new(orders.clone()))));

        let coordinator = Arc::new(PaymentCoordinator::new(
            CoordinatorPorts {
                repository: Arc::new(repository.clone()),
                locks: Arc::new(locks.clone()),
                idempotency: Arc::new(idempotency),
                gateway: Arc::new(gateway.clone()),
                orders: Arc::new(orders.clone()),
            },
            dispatcher,
            config,
        ));
        let listener = Arc::new(SagaListener::new(
            coordinator.clone(),
            Arc::new(processed.clone()),
        ));

        Self {
            coordinator,
            repository,
            locks,
            processed,
            gateway,
            orders,
            log,
            listener,
        }
    }

    async fn waiting_payment(&self) -> PaymentId {
        self.coordinator
            .create_waiting_payment(OrderId::new(), UserId::new())
            .await
            .unwrap()
            .payment
            .id()
    }

    async fn requested_payment(&self) -> PaymentId {
        let payment_id = self.waiting_payment().await;
        self.coordinator
            .request_payment(payment_id, card_request())
            .await
            .unwrap();
        payment_id
    }

    async fn completed_payment(&self) -> PaymentId {
        let payment_id = self.requested_payment().await;
        self.coordinator
            .complete_payment(payment_id, "APR-1", "PG-CALLBACK-1")
            .await
            .unwrap();
        payment_id
    }

    async fn publish_upstream(&self, topic: &str, order_id: OrderId, payload: serde_json::Value) {
        self.log
            .publish_json(topic, &order_id.to_string(), &payload)
            .await
            .unwrap();
    }
}

fn card_request() -> RequestPayment {
    RequestPayment {
        total_amount: Money::new(50_000),
        payment_amount: Money::new(48_000),
        discount_amount: Money::new(5_000),
        delivery_fee: Money::new(3_000),
        method: PaymentMethod::Card,
    }
}

fn order_confirmed(event_id: &str, order_id: OrderId) -> serde_json::Value {
    json!({
        "event_id": event_id,
        "event_timestamp": 1_700_000_000_000_i64,
        "order_id": order_id,
        "user_id": UserId::new(),
        "total_amount": 50_000,
    })
}

fn stock_confirmed(event_id: &str, order_id: OrderId) -> serde_json::Value {
    json!({
        "event_id": event_id,
        "event_timestamp": 1_700_000_000_000_i64,
        "order_id": order_id,
    })
}

#[tokio::test]
async fn test_full_lifecycle_records_history_and_publishes_events() {
    let h = TestHarness::new();
    let order_id = OrderId::new();

    let created = h
        .coordinator
        .create_waiting_payment(order_id, UserId::new())
        .await
        .unwrap();
    assert!(!created.already_processed);
    let payment_id = created.payment.id();
    assert_eq!(h.orders.payment_for(order_id), Some(payment_id));

    let requested = h
        .coordinator
        .request_payment(payment_id, card_request())
        .await
        .unwrap();
    assert_eq!(requested.payment.status(), PaymentStatus::Request);
    assert_eq!(requested.payment.pg_transaction_id(), Some("PG-0001"));
    assert!(requested.redirect_url.ends_with("PG-0001"));
    assert_eq!(
        h.gateway.last_request(payment_id),
        Some((Money::new(48_000), format!("ORDER-{order_id}")))
    );

    h.coordinator
        .complete_payment(payment_id, "APR-1", "PG-CALLBACK-1")
        .await
        .unwrap();
    assert!(h.orders.is_reservation_confirmed(order_id));

    h.coordinator
        .request_refund(payment_id, "changed my mind", Money::new(48_000))
        .await
        .unwrap();
    h.coordinator
        .complete_refund(payment_id, "RF-1", "PG-REFUND-1")
        .await
        .unwrap();

    let payment = h.coordinator.get_payment(payment_id).await.unwrap();
    assert_eq!(payment.status(), PaymentStatus::RefundCompleted);
    let history: Vec<_> = payment.history().iter().map(|e| e.event_type).collect();
    assert_eq!(
        history,
        vec![
            PaymentEventType::PaymentCreated,
            PaymentEventType::PaymentRequested,
            PaymentEventType::PaymentCompleted,
            PaymentEventType::RefundRequested,
            PaymentEventType::RefundCompleted,
        ]
    );

    for topic in [
        topics::PAYMENT_REQUESTED,
        topics::PAYMENT_COMPLETED,
        topics::PAYMENT_REFUND_REQUESTED,
        topics::PAYMENT_REFUND_COMPLETED,
    ] {
        let records = h.log.records(topic).await;
        assert_eq!(records.len(), 1, "one record on {topic}");
        assert_eq!(records[0].key, order_id.to_string());
    }

    assert_eq!(
        h.orders.outcomes(order_id),
        vec![
            PaymentOutcome::Requested,
            PaymentOutcome::Completed,
            PaymentOutcome::RefundRequested,
            PaymentOutcome::RefundCompleted,
        ]
    );
}

#[tokio::test]
async fn test_duplicate_completion_callback_is_replayed() {
    let h = TestHarness::new();
    let payment_id = h.requested_payment().await;

    let first = h
        .coordinator
        .complete_payment(payment_id, "A1", "PG-TX-1")
        .await
        .unwrap();
    assert!(!first.already_processed);
    let completed_at = first.payment.completed_at();
    assert!(completed_at.is_some());

    let second = h
        .coordinator
        .complete_payment(payment_id, "A1", "PG-TX-1")
        .await
        .unwrap();
    assert!(second.already_processed);
    assert_eq!(second.payment.status(), PaymentStatus::Completed);
    assert_eq!(second.payment.completed_at(), completed_at);
    assert_eq!(second.payment.version(), first.payment.version());

    assert_eq!(h.log.record_count(topics::PAYMENT_COMPLETED).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_callbacks_apply_once() {
    let h = TestHarness::new();
    let payment_id = h.requested_payment().await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let coordinator = h.coordinator.clone();
        tasks.push(tokio::spawn(async move {
            coordinator
                .complete_payment(payment_id, "A1", "PG-TX-1")
                .await
                .unwrap()
        }));
    }

    let mut applied = 0;
    for task in tasks {
        if !task.await.unwrap().already_processed {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(h.log.record_count(topics::PAYMENT_COMPLETED).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creation_for_one_order_saves_one_payment() {
    let h = TestHarness::new();
    let order_id = OrderId::new();
    let user_id = UserId::new();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let coordinator = h.coordinator.clone();
        tasks.push(tokio::spawn(async move {
            coordinator.create_waiting_payment(order_id, user_id).await
        }));
    }

    let mut applied = Vec::new();
    let mut replayed = Vec::new();
    for task in tasks {
        match task.await.unwrap() {
            Ok(outcome) if outcome.already_processed => replayed.push(outcome.payment.id()),
            Ok(outcome) => applied.push(outcome.payment.id()),
            // Saw the order link before the saved payment became visible.
            Err(CoordinatorError::OrderAlreadyHasPayment(id)) => assert_eq!(id, order_id),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(applied.len(), 1);
    assert!(replayed.iter().all(|id| *id == applied[0]));
    assert_eq!(h.repository.payment_count().await, 1);
    assert_eq!(
        h.coordinator.get_payment_by_order(order_id).await.unwrap().id(),
        applied[0]
    );
}

#[tokio::test]
async fn test_request_twice_is_a_state_violation() {
    let h = TestHarness::new();
    let payment_id = h.requested_payment().await;

    let result = h
        .coordinator
        .request_payment(payment_id, card_request())
        .await;
    assert!(matches!(
        result,
        Err(CoordinatorError::Payment(
            PaymentError::InvalidStateTransition {
                current_status: PaymentStatus::Request,
                ..
            }
        ))
    ));
    // The gateway is not asked to open a second payment.
    assert_eq!(h.gateway.request_count(), 1);
}

#[tokio::test]
async fn test_payment_amount_above_total_is_rejected() {
    let h = TestHarness::new();
    let payment_id = h.waiting_payment().await;

    let request = RequestPayment {
        payment_amount: Money::new(60_000),
        ..card_request()
    };
    let result = h.coordinator.request_payment(payment_id, request).await;
    assert!(matches!(
        result,
        Err(CoordinatorError::Payment(PaymentError::InvalidArgument(_)))
    ));
    assert_eq!(h.gateway.request_count(), 0);
    let payment = h.coordinator.get_payment(payment_id).await.unwrap();
    assert_eq!(payment.status(), PaymentStatus::Wait);
}

#[tokio::test]
async fn test_cancel_request_but_not_completed() {
    let h = TestHarness::new();

    let requested = h.requested_payment().await;
    let cancelled = h
        .coordinator
        .cancel_payment(requested, "timeout")
        .await
        .unwrap();
    assert_eq!(cancelled.status(), PaymentStatus::Cancelled);
    let records = h.log.records(topics::PAYMENT_CANCELLED).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload["cancellation_reason"], "TIMEOUT");
    assert_eq!(records[0].payload["previous_status"], "PAYMENT_REQUEST");

    let completed = h.completed_payment().await;
    let result = h.coordinator.cancel_payment(completed, "USER_CANCEL").await;
    assert!(matches!(
        result,
        Err(CoordinatorError::Payment(
            PaymentError::InvalidStateTransition { .. }
        ))
    ));
}

#[tokio::test]
async fn test_refund_amount_bounds() {
    let h = TestHarness::new();
    let payment_id = h.completed_payment().await;

    for amount in [0, -1, 48_001] {
        let result = h
            .coordinator
            .request_refund(payment_id, "defect", Money::new(amount))
            .await;
        assert!(
            matches!(
                result,
                Err(CoordinatorError::Payment(PaymentError::InvalidArgument(_)))
            ),
            "amount {amount} must be rejected"
        );
    }
    let payment = h.coordinator.get_payment(payment_id).await.unwrap();
    assert_eq!(payment.status(), PaymentStatus::Completed);
}

#[tokio::test]
async fn test_failed_callback_releases_idempotency_key() {
    let h = TestHarness::new();
    let payment_id = h.requested_payment().await;

    h.orders.set_fail_on_confirm(true);
    let result = h
        .coordinator
        .complete_payment(payment_id, "A1", "PG-TX-1")
        .await;
    assert!(matches!(result, Err(CoordinatorError::OrderService(_))));
    assert!(result.unwrap_err().is_retryable());
    let payment = h.coordinator.get_payment(payment_id).await.unwrap();
    assert_eq!(payment.status(), PaymentStatus::Request);

    // A retry with the same key is processed, not reported as a replay.
    h.orders.set_fail_on_confirm(false);
    let retried = h
        .coordinator
        .complete_payment(payment_id, "A1", "PG-TX-1")
        .await
        .unwrap();
    assert!(!retried.already_processed);
    assert_eq!(retried.payment.status(), PaymentStatus::Completed);
}

#[tokio::test]
async fn test_failed_save_dispatches_nothing() {
    let h = TestHarness::new();
    let payment_id = h.requested_payment().await;

    h.repository.set_fail_on_save(true);
    let result = h.coordinator.mark_failed(payment_id, "card declined", "PG-TX-9").await;
    assert!(matches!(result, Err(CoordinatorError::Store(_))));

    assert_eq!(h.log.record_count(topics::PAYMENT_FAILED).await, 0);
    let payment = h.repository.load_by_id(payment_id).await.unwrap().unwrap();
    assert_eq!(payment.status(), PaymentStatus::Request);
}

#[tokio::test]
async fn test_publish_failure_keeps_committed_state() {
    let h = TestHarness::new();
    let payment_id = h.requested_payment().await;
    let order_id = h.coordinator.get_payment(payment_id).await.unwrap().order_id();

    h.log.set_fail_on_publish(true);
    let outcome = h
        .coordinator
        .mark_failed(payment_id, "card declined", "PG-TX-9")
        .await
        .unwrap();
    assert_eq!(outcome.payment.status(), PaymentStatus::Failed);

    let stored = h.coordinator.get_payment(payment_id).await.unwrap();
    assert_eq!(stored.status(), PaymentStatus::Failed);
    assert_eq!(stored.failure_reason(), Some("card declined"));
    // The Order domain still hears about it.
    assert_eq!(
        h.orders.outcomes(order_id).last(),
        Some(&PaymentOutcome::Failed {
            reason: "card declined".to_string()
        })
    );
}

#[tokio::test]
async fn test_lock_timeout_applies_nothing() {
    let h = TestHarness::with_config(CoordinatorConfig {
        lock: LockSettings {
            wait: Duration::from_millis(100),
            lease: Duration::from_secs(30),
            retry_interval: Duration::from_millis(10),
        },
        ..CoordinatorConfig::default()
    });
    let payment_id = h.requested_payment().await;

    let other = LockToken::new();
    assert!(
        h.locks
            .try_acquire(&lock_key(payment_id), other, Duration::from_secs(30))
            .await
            .unwrap()
    );

    let result = h.coordinator.cancel_payment(payment_id, "USER_CANCEL").await;
    let err = result.unwrap_err();
    assert!(matches!(err, CoordinatorError::LockTimeout { .. }));
    assert!(err.is_retryable());

    let payment = h.coordinator.get_payment(payment_id).await.unwrap();
    assert_eq!(payment.status(), PaymentStatus::Request);
    assert_eq!(h.log.record_count(topics::PAYMENT_CANCELLED).await, 0);

    h.locks.release(&lock_key(payment_id), other).await.unwrap();
    h.coordinator
        .cancel_payment(payment_id, "USER_CANCEL")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_payment_details_include_order_summary() {
    let h = TestHarness::new();
    let order_id = OrderId::new();
    h.orders.add_order(OrderSummary {
        order_id,
        order_number: "ORD-20250101-001".to_string(),
        items: vec![OrderItem {
            product_id: "SKU-1".to_string(),
            product_name: "Keyboard".to_string(),
            quantity: 2,
        }],
    });
    let payment_id = h
        .coordinator
        .create_waiting_payment(order_id, UserId::new())
        .await
        .unwrap()
        .payment
        .id();

    let details = h.coordinator.get_payment_details(payment_id).await.unwrap();
    assert_eq!(
        details.order.map(|o| o.order_number),
        Some("ORD-20250101-001".to_string())
    );

    h.orders.set_unavailable(true);
    let details = h.coordinator.get_payment_details(payment_id).await.unwrap();
    assert!(details.order.is_none());
    assert_eq!(details.payment.id(), payment_id);
}

#[tokio::test]
async fn test_list_payments_pages_and_filters() {
    let h = TestHarness::new();
    let user_id = UserId::new();
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(
            h.coordinator
                .create_waiting_payment(OrderId::new(), user_id)
                .await
                .unwrap()
                .payment
                .id(),
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    h.coordinator
        .request_payment(ids[0], card_request())
        .await
        .unwrap();
    h.waiting_payment().await;

    let page = h
        .coordinator
        .list_payments(user_id, None, 1, 2)
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(
        page.payments.iter().map(|p| p.id()).collect::<Vec<_>>(),
        vec![ids[2], ids[1]]
    );

    let requested = h
        .coordinator
        .list_payments(user_id, Some(PaymentStatus::Request), 1, 20)
        .await
        .unwrap();
    assert_eq!(requested.total, 1);
    assert_eq!(requested.payments[0].id(), ids[0]);
    assert_eq!(requested.payments[0].payment_amount(), Some(Money::new(48_000)));
}

#[tokio::test]
async fn test_list_payments_rejects_bad_paging() {
    let h = TestHarness::new();
    for (page, limit) in [(0, 20), (1, 0), (1, saga::MAX_PAGE_SIZE + 1)] {
        let result = h
            .coordinator
            .list_payments(UserId::new(), None, page, limit)
            .await;
        assert!(matches!(
            result,
            Err(CoordinatorError::Payment(PaymentError::InvalidArgument(_)))
        ));
    }
}

#[tokio::test]
async fn test_unknown_payment_is_not_found() {
    let h = TestHarness::new();
    let missing = PaymentId::new();

    let result = h.coordinator.complete_payment(missing, "A1", "K1").await;
    assert!(matches!(result, Err(CoordinatorError::PaymentNotFound(id)) if id == missing));
    assert!(matches!(
        h.coordinator.get_payment_by_order(OrderId::new()).await,
        Err(CoordinatorError::PaymentNotFoundForOrder(_))
    ));
}

#[tokio::test]
async fn test_order_confirmed_creates_waiting_payment_once() {
    let h = TestHarness::new();
    let order_id = OrderId::new();
    h.publish_upstream(topics::ORDER_CONFIRMED, order_id, order_confirmed("evt-1", order_id))
        .await;
    let record = h.log.records(topics::ORDER_CONFIRMED).await.remove(0);

    let outcome = h.listener.handle(&record).await.unwrap();
    assert_eq!(outcome, ListenerOutcome::Processed);
    let payment = h.coordinator.get_payment_by_order(order_id).await.unwrap();
    assert_eq!(payment.status(), PaymentStatus::Wait);
    assert!(
        h.processed
            .is_processed(CONSUMER_NAME, "evt-1")
            .await
            .unwrap()
    );

    // Redelivery of the same record.
    let outcome = h.listener.handle(&record).await.unwrap();
    assert_eq!(outcome, ListenerOutcome::Duplicate);

    // A different event for the same order finds the existing payment.
    h.publish_upstream(topics::ORDER_CONFIRMED, order_id, order_confirmed("evt-2", order_id))
        .await;
    let record = h.log.records(topics::ORDER_CONFIRMED).await.remove(1);
    assert_eq!(
        h.listener.handle(&record).await.unwrap(),
        ListenerOutcome::Processed
    );
    assert_eq!(h.repository.payment_count().await, 1);
}

#[tokio::test]
async fn test_stock_confirmed_finalizes_reservation_once() {
    let h = TestHarness::new();
    let payment_id = h.completed_payment().await;
    let order_id = h.coordinator.get_payment(payment_id).await.unwrap().order_id();

    h.publish_upstream(topics::STOCK_CONFIRMED, order_id, stock_confirmed("stk-1", order_id))
        .await;
    h.publish_upstream(topics::STOCK_CONFIRMED, order_id, stock_confirmed("stk-2", order_id))
        .await;
    let records = h.log.records(topics::STOCK_CONFIRMED).await;

    assert_eq!(
        h.listener.handle(&records[0]).await.unwrap(),
        ListenerOutcome::Processed
    );
    let payment = h.coordinator.get_payment(payment_id).await.unwrap();
    assert!(payment.is_reservation_finalized());
    assert_eq!(payment.status(), PaymentStatus::Completed);

    assert_eq!(
        h.listener.handle(&records[0]).await.unwrap(),
        ListenerOutcome::Duplicate
    );
    assert!(matches!(
        h.listener.handle(&records[1]).await.unwrap(),
        ListenerOutcome::Skipped(_)
    ));
}

#[tokio::test]
async fn test_malformed_upstream_event_is_skipped() {
    let h = TestHarness::new();
    let order_id = OrderId::new();
    h.publish_upstream(topics::ORDER_CONFIRMED, order_id, json!({"order_id": "not-a-uuid"}))
        .await;
    let record = h.log.records(topics::ORDER_CONFIRMED).await.remove(0);

    assert!(matches!(
        h.listener.handle(&record).await.unwrap(),
        ListenerOutcome::Skipped(_)
    ));
    assert_eq!(h.repository.payment_count().await, 0);
}

#[tokio::test]
async fn test_consumer_commits_only_after_success() {
    let h = TestHarness::new();
    let consumer = SagaConsumer::new(
        Arc::new(h.log.clone()),
        h.listener.clone(),
        ConsumerConfig::default(),
    );
    let order_id = OrderId::new();
    h.publish_upstream(topics::ORDER_CONFIRMED, order_id, order_confirmed("evt-1", order_id))
        .await;
    let partition = h.log.records(topics::ORDER_CONFIRMED).await[0].partition;
    let group = consumer.config().group.clone();

    h.orders.set_unavailable(true);
    assert!(
        consumer
            .poll_partition(topics::ORDER_CONFIRMED, partition)
            .await
            .is_err()
    );
    assert_eq!(
        h.log
            .committed(&group, topics::ORDER_CONFIRMED, partition)
            .await
            .unwrap(),
        Offset::earliest()
    );

    h.orders.set_unavailable(false);
    let handled = consumer
        .poll_partition(topics::ORDER_CONFIRMED, partition)
        .await
        .unwrap();
    assert_eq!(handled, 1);
    assert_eq!(
        h.log
            .committed(&group, topics::ORDER_CONFIRMED, partition)
            .await
            .unwrap(),
        Offset::new(1)
    );
    assert!(h.coordinator.get_payment_by_order(order_id).await.is_ok());

    // Nothing left to read.
    assert_eq!(
        consumer
            .poll_partition(topics::ORDER_CONFIRMED, partition)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_spawned_consumer_processes_and_stops() {
    let h = TestHarness::new();
    let consumer = Arc::new(SagaConsumer::new(
        Arc::new(h.log.clone()),
        h.listener.clone(),
        ConsumerConfig {
            poll_interval: Duration::from_millis(10),
            ..ConsumerConfig::default()
        },
    ));

    let orders: Vec<OrderId> = (0..5).map(|_| OrderId::new()).collect();
    for (i, order_id) in orders.iter().enumerate() {
        h.publish_upstream(
            topics::ORDER_CONFIRMED,
            *order_id,
            order_confirmed(&format!("evt-{i}"), *order_id),
        )
        .await;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = consumer.clone().spawn(shutdown_rx).await.unwrap();
    assert_eq!(handles.len(), topics::INBOUND.len() * 3);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while h.repository.payment_count().await < orders.len() {
        assert!(tokio::time::Instant::now() < deadline, "consumer too slow");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    for order_id in orders {
        assert!(h.coordinator.get_payment_by_order(order_id).await.is_ok());
    }
}

//! HTTP boundary and process wiring for the payment service.
//!
//! Exposes the gateway callback and payment command endpoints, hosts the
//! SAGA consumer, and carries structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use message_log::MessageLog;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    CoordinatorPorts, EventDispatcher, InMemoryOrderService, InMemoryPaymentGateway, OrderPort,
    OrderSyncHandler, OutboundPublisher, PaymentCoordinator, SagaConsumer, SagaListener,
};
use store::{
    IdempotencyStore, InMemoryIdempotencyStore, InMemoryLockManager, InMemoryPaymentRepository,
    InMemoryProcessedEventStore, LockManager, PaymentRepository, ProcessedEventStore,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
pub use routes::payments::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/payments",
            get(routes::payments::list).post(routes::payments::create),
        )
        .route("/payments/{id}", get(routes::payments::get))
        .route("/payments/{id}/request", post(routes::payments::request))
        .route("/payments/{id}/complete", post(routes::payments::complete))
        .route("/payments/{id}/fail", post(routes::payments::fail))
        .route("/payments/{id}/cancel", post(routes::payments::cancel))
        .route("/payments/{id}/refund", post(routes::payments::refund))
        .route(
            "/payments/{id}/refund/complete",
            post(routes::payments::complete_refund),
        )
        .route("/orders/{id}/payment", get(routes::payments::get_by_order))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Storage adapters the service runs on.
pub struct Stores {
    pub repository: Arc<dyn PaymentRepository>,
    pub locks: Arc<dyn LockManager>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub processed: Arc<dyn ProcessedEventStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            repository: Arc::new(InMemoryPaymentRepository::new()),
            locks: Arc::new(InMemoryLockManager::new()),
            idempotency: Arc::new(InMemoryIdempotencyStore::new()),
            processed: Arc::new(InMemoryProcessedEventStore::new()),
        }
    }
}

/// Everything the binary runs: HTTP state and the SAGA consumer.
pub struct Services {
    pub state: Arc<AppState>,
    pub consumer: Arc<SagaConsumer>,
}

/// Wires the coordinator, its after-commit handlers and the SAGA consumer.
///
/// Handlers run in registration order: the outbound publisher first, then
/// the order reaction.
pub fn build_services(
    stores: Stores,
    log: Arc<dyn MessageLog>,
    gateway: InMemoryPaymentGateway,
    orders: InMemoryOrderService,
    config: &Config,
) -> Services {
    let orders: Arc<dyn OrderPort> = Arc::new(orders);

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(Arc::new(OutboundPublisher::new(log.clone())));
    dispatcher.register(Arc::new(OrderSyncHandler::new(orders.clone())));

    let coordinator = Arc::new(PaymentCoordinator::new(
        CoordinatorPorts {
            repository: stores.repository,
            locks: stores.locks,
            idempotency: stores.idempotency,
            gateway: Arc::new(gateway),
            orders,
        },
        dispatcher,
        config.coordinator,
    ));

    let listener = Arc::new(SagaListener::new(coordinator.clone(), stores.processed));
    let consumer = Arc::new(SagaConsumer::new(log, listener, config.consumer()));

    Services {
        state: Arc::new(AppState { coordinator }),
        consumer,
    }
}

//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::config::Config;
use api::{Stores, build_services};
use message_log::InMemoryMessageLog;
use saga::{InMemoryOrderService, InMemoryPaymentGateway};
use sqlx::postgres::PgPoolOptions;
use store::{
    IdempotencyStore, PostgresIdempotencyStore, PostgresLockManager, PostgresPaymentRepository,
    PostgresProcessedEventStore, ProcessedEventStore, run_migrations,
};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60 * 60);
const PROCESSED_EVENT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Purges expired idempotency markers and old processed-event records until
/// shutdown.
async fn housekeeping(
    idempotency: Arc<dyn IdempotencyStore>,
    processed: Arc<dyn ProcessedEventStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match idempotency.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "purged expired idempotency keys"),
                    Err(e) => tracing::warn!(error = %e, "idempotency key purge failed"),
                }
                match processed.purge_older_than(PROCESSED_EVENT_RETENTION).await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "purged processed event records"),
                    Err(e) => tracing::warn!(error = %e, "processed event purge failed"),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    api::routes::metrics::describe();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut background = Vec::new();

    // 3. Choose storage adapters
    let stores = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            run_migrations(&pool)
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL storage");

            Stores {
                repository: Arc::new(PostgresPaymentRepository::new(pool.clone())),
                locks: Arc::new(PostgresLockManager::new(pool.clone())),
                idempotency: Arc::new(PostgresIdempotencyStore::new(pool.clone())),
                processed: Arc::new(PostgresProcessedEventStore::new(pool)),
            }
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage");
            Stores::in_memory()
        }
    };

    background.push(tokio::spawn(housekeeping(
        stores.idempotency.clone(),
        stores.processed.clone(),
        shutdown_rx.clone(),
    )));

    // 4. Wire the coordinator and the SAGA consumer
    let log = Arc::new(InMemoryMessageLog::new(config.log_partitions));
    let services = build_services(
        stores,
        log,
        InMemoryPaymentGateway::new(),
        InMemoryOrderService::new(),
        &config,
    );
    background.extend(
        services
            .consumer
            .clone()
            .spawn(shutdown_rx)
            .await
            .expect("failed to start saga consumer"),
    );

    // 5. Build the application
    let app = api::create_app(services.state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Stop background work
    let _ = shutdown_tx.send(true);
    for handle in background {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "background task ended abnormally");
        }
    }

    tracing::info!("server shut down gracefully");
}

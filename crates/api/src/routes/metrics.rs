//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for the service's metrics. Call once after the
/// recorder is installed.
pub fn describe() {
    describe_counter!(
        "payment_transitions_total",
        "Payment state transitions applied, by action"
    );
    describe_histogram!(
        "payment_lock_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for a payment lock"
    );
    describe_counter!(
        "payment_lock_timeouts_total",
        "Operations aborted because the payment lock was not obtained in time"
    );
    describe_counter!(
        "payment_idempotency_duplicates_total",
        "Callbacks recognised as replays"
    );
    describe_counter!(
        "payment_idempotency_fail_open_total",
        "Idempotency checks that failed and let the request through"
    );
    describe_counter!(
        "payment_callback_replays_total",
        "HTTP callbacks answered with already_processed"
    );
    describe_counter!(
        "payment_events_published_total",
        "Payment events written to the message log, by topic"
    );
    describe_counter!(
        "payment_publish_failures_total",
        "Payment events that could not be published, by topic"
    );
    describe_counter!(
        "payment_event_handler_failures_total",
        "After-commit handler failures, by handler"
    );
    describe_counter!(
        "saga_messages_processed_total",
        "Upstream messages applied, by topic"
    );
    describe_counter!(
        "saga_messages_failed_total",
        "Upstream messages left uncommitted for redelivery, by topic"
    );
    describe_counter!(
        "saga_messages_skipped_total",
        "Upstream messages committed without effect, by topic"
    );
}

/// GET /metrics: Prometheus exposition of the payment and saga metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}

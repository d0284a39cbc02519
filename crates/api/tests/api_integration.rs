//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{OrderId, PaymentId, UserId};
use message_log::InMemoryMessageLog;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{InMemoryOrderService, InMemoryPaymentGateway, topics};
use serde_json::{Value, json};
use tower::ServiceExt;

use api::config::Config;
use api::{Stores, build_services};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    router: axum::Router,
    log: InMemoryMessageLog,
    orders: InMemoryOrderService,
}

fn setup() -> TestApp {
    let log = InMemoryMessageLog::new(3);
    let orders = InMemoryOrderService::new();
    let services = build_services(
        Stores::in_memory(),
        Arc::new(log.clone()),
        InMemoryPaymentGateway::new(),
        orders.clone(),
        &Config::default(),
    );
    TestApp {
        router: api::create_app(services.state, get_metrics_handle()),
        log,
        orders,
    }
}

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_payment(app: &TestApp, order_id: OrderId) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/payments",
        Some(json!({ "order_id": order_id, "user_id": UserId::new() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["payment"]["id"].as_str().unwrap().to_string()
}

async fn request_payment(app: &TestApp, id: &str) {
    let (status, json) = send(
        app,
        "POST",
        &format!("/payments/{id}/request"),
        Some(json!({
            "total_amount": 30000,
            "payment_amount": 27000,
            "discount_amount": 3000,
            "method": "CARD",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "request failed: {json}");
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_and_get_payment() {
    let app = setup();
    let order_id = OrderId::new();
    let id = create_payment(&app, order_id).await;

    let (status, json) = send(&app, "GET", &format!("/payments/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payment"]["status"], "PAYMENT_WAIT");
    assert_eq!(json["payment"]["order_id"], order_id.to_string());
    assert_eq!(json["payment"]["history"][0]["event_type"], "PAYMENT_CREATED");
    assert!(json["order"].is_null());

    let (status, json) = send(&app, "GET", &format!("/orders/{order_id}/payment"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], id);
}

#[tokio::test]
async fn test_request_returns_redirect() {
    let app = setup();
    let id = create_payment(&app, OrderId::new()).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/payments/{id}/request"),
        Some(json!({
            "total_amount": 30000,
            "payment_amount": 27000,
            "discount_amount": 3000,
            "method": "TOSS_PAY",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["redirect_url"].as_str().unwrap().starts_with("https://"));
    assert_eq!(json["payment"]["status"], "PAYMENT_REQUEST");
    assert_eq!(json["payment"]["method"], "TOSS_PAY");
    assert_eq!(app.log.record_count(topics::PAYMENT_REQUESTED).await, 1);
}

#[tokio::test]
async fn test_complete_callback_echoes_already_processed() {
    let app = setup();
    let order_id = OrderId::new();
    let id = create_payment(&app, order_id).await;
    request_payment(&app, &id).await;

    let body = json!({ "approval_number": "APR-77", "idempotency_key": "PG-TX-77" });
    let uri = format!("/payments/{id}/complete");
    let (status, first) = send(&app, "POST", &uri, Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["already_processed"], false);
    assert_eq!(first["payment"]["status"], "PAYMENT_COMPLETED");

    let (status, second) = send(&app, "POST", &uri, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["already_processed"], true);
    assert_eq!(second["payment"]["completed_at"], first["payment"]["completed_at"]);

    assert_eq!(app.log.record_count(topics::PAYMENT_COMPLETED).await, 1);
    assert!(app.orders.is_reservation_confirmed(order_id));
}

#[tokio::test]
async fn test_idempotency_key_from_header() {
    let app = setup();
    let id = create_payment(&app, OrderId::new()).await;
    request_payment(&app, &id).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/payments/{id}/fail"))
                .header("content-type", "application/json")
                .header("idempotency-key", "PG-FAIL-1")
                .body(Body::from(
                    serde_json::to_string(&json!({ "reason": "card declined" })).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_idempotency_key_is_bad_request() {
    let app = setup();
    let id = create_payment(&app, OrderId::new()).await;
    request_payment(&app, &id).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/payments/{id}/complete"),
        Some(json!({ "approval_number": "APR-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_state_violation_is_conflict() {
    let app = setup();
    let id = create_payment(&app, OrderId::new()).await;

    // Completing a payment that was never requested.
    let (status, json) = send(
        &app,
        "POST",
        &format!("/payments/{id}/complete"),
        Some(json!({ "approval_number": "APR-1", "idempotency_key": "K-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["retryable"], false);
}

#[tokio::test]
async fn test_refund_flow_and_bounds() {
    let app = setup();
    let id = create_payment(&app, OrderId::new()).await;
    request_payment(&app, &id).await;
    send(
        &app,
        "POST",
        &format!("/payments/{id}/complete"),
        Some(json!({ "approval_number": "APR-1", "idempotency_key": "K-1" })),
    )
    .await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/payments/{id}/refund"),
        Some(json!({ "reason": "too much", "amount": 27001 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        "POST",
        &format!("/payments/{id}/refund"),
        Some(json!({ "reason": "changed my mind", "amount": 27000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "REFUND_REQUESTED");

    let (status, json) = send(
        &app,
        "POST",
        &format!("/payments/{id}/refund/complete"),
        Some(json!({ "refund_transaction_id": "RF-1", "idempotency_key": "RF-KEY-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["already_processed"], false);
    assert_eq!(json["payment"]["status"], "REFUND_COMPLETED");
    assert_eq!(json["payment"]["history"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_cancel_waiting_payment() {
    let app = setup();
    let id = create_payment(&app, OrderId::new()).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/payments/{id}/cancel"),
        Some(json!({ "reason": "USER_CANCEL" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "PAYMENT_CANCELLED");
    assert_eq!(json["cancellation_reason"], "USER_CANCEL");
}

#[tokio::test]
async fn test_list_payments_for_user() {
    let app = setup();
    let user_id = UserId::new();
    let mut ids = Vec::new();
    for _ in 0..3 {
        let (status, json) = send(
            &app,
            "POST",
            "/payments",
            Some(json!({ "order_id": OrderId::new(), "user_id": user_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(json["payment"]["id"].as_str().unwrap().to_string());
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    request_payment(&app, &ids[0]).await;

    let (status, json) = send(
        &app,
        "GET",
        &format!("/payments?user_id={user_id}&page=1&limit=2"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pagination"]["total"], 3);
    assert_eq!(json["pagination"]["limit"], 2);
    assert_eq!(json["payments"][0]["id"], ids[2]);
    assert_eq!(json["payments"][1]["id"], ids[1]);
    assert!(json["payments"][0]["payment_amount"].is_null());

    let (status, json) = send(
        &app,
        "GET",
        &format!("/payments?user_id={user_id}&status=PAYMENT_REQUEST"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pagination"]["total"], 1);
    assert_eq!(json["payments"][0]["id"], ids[0]);
    assert_eq!(json["payments"][0]["payment_amount"], 27000);
    assert_eq!(json["payments"][0]["method"], "CARD");
}

#[tokio::test]
async fn test_list_payments_validates_query() {
    let app = setup();
    let (status, _) = send(&app, "GET", "/payments", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let user_id = UserId::new();
    let (status, _) = send(
        &app,
        "GET",
        &format!("/payments?user_id={user_id}&status=SETTLED"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", &format!("/payments?user_id={user_id}&page=0"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_payment_is_not_found() {
    let app = setup();
    let id = PaymentId::new();
    let (status, _) = send(&app, "GET", &format!("/payments/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_id_is_bad_request() {
    let app = setup();
    let (status, json) = send(&app, "GET", "/payments/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid ID format"));
}

#[tokio::test]
async fn test_order_service_down_is_unavailable() {
    let app = setup();
    app.orders.set_unavailable(true);

    let (status, json) = send(
        &app,
        "POST",
        "/payments",
        Some(json!({ "order_id": OrderId::new(), "user_id": UserId::new() })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["retryable"], true);
}

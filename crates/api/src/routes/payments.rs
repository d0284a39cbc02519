//! Payment command and callback endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, UserId};
use domain::{Money, Payment, PaymentMethod, PaymentStatus};
use saga::{CommandOutcome, OrderSummary, PaymentCoordinator, RequestPayment};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Header a gateway may use instead of the body field to carry its callback key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub coordinator: Arc<PaymentCoordinator>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct RequestPaymentRequest {
    pub total_amount: i64,
    pub payment_amount: i64,
    #[serde(default)]
    pub discount_amount: i64,
    #[serde(default)]
    pub delivery_fee: i64,
    pub method: PaymentMethod,
}

#[derive(Deserialize)]
pub struct CompleteRequest {
    pub approval_number: String,
    pub idempotency_key: Option<String>,
}

#[derive(Deserialize)]
pub struct FailRequest {
    pub reason: String,
    pub idempotency_key: Option<String>,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct RefundRequest {
    pub reason: String,
    pub amount: i64,
}

#[derive(Deserialize)]
pub struct CompleteRefundRequest {
    pub refund_transaction_id: String,
    pub idempotency_key: Option<String>,
}

/// Query string of `GET /payments`.
#[derive(Deserialize)]
pub struct ListPaymentsParams {
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

const DEFAULT_PAGE_SIZE: u32 = 20;

// -- Response types --

#[derive(Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub status: String,
    pub version: i64,
    pub total_amount: Option<i64>,
    pub payment_amount: Option<i64>,
    pub discount_amount: Option<i64>,
    pub delivery_fee: Option<i64>,
    pub method: Option<String>,
    pub pg_transaction_id: Option<String>,
    pub pg_approval_number: Option<String>,
    pub refund_transaction_id: Option<String>,
    pub refund_amount: Option<i64>,
    pub refund_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub failure_reason: Option<String>,
    pub reservation_finalized: bool,
    pub created_at: DateTime<Utc>,
    pub requested_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refund_requested_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub history: Vec<HistoryResponse>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub event_type: String,
    pub summary: String,
    pub recorded_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id().to_string(),
            order_id: payment.order_id().to_string(),
            user_id: payment.user_id().to_string(),
            status: payment.status().to_string(),
            version: payment.version().as_i64(),
            total_amount: payment.total_amount().map(|m| m.amount()),
            payment_amount: payment.payment_amount().map(|m| m.amount()),
            discount_amount: payment.discount_amount().map(|m| m.amount()),
            delivery_fee: payment.delivery_fee().map(|m| m.amount()),
            method: payment.method().map(|m| m.as_str().to_string()),
            pg_transaction_id: payment.pg_transaction_id().map(String::from),
            pg_approval_number: payment.pg_approval_number().map(String::from),
            refund_transaction_id: payment.refund_transaction_id().map(String::from),
            refund_amount: payment.refund_amount().map(|m| m.amount()),
            refund_reason: payment.refund_reason().map(String::from),
            cancellation_reason: payment.cancellation_reason().map(String::from),
            failure_reason: payment.failure_reason().map(String::from),
            reservation_finalized: payment.is_reservation_finalized(),
            created_at: payment.created_at(),
            requested_at: payment.requested_at(),
            completed_at: payment.completed_at(),
            failed_at: payment.failed_at(),
            cancelled_at: payment.cancelled_at(),
            refund_requested_at: payment.refund_requested_at(),
            refunded_at: payment.refunded_at(),
            history: payment
                .history()
                .iter()
                .map(|entry| HistoryResponse {
                    event_type: entry.event_type.as_str().to_string(),
                    summary: entry.summary.clone(),
                    recorded_at: entry.recorded_at,
                })
                .collect(),
        }
    }
}

/// A command result. `already_processed` is true when the request replayed
/// an earlier one and nothing was applied.
#[derive(Serialize)]
pub struct CommandResponse {
    pub already_processed: bool,
    pub payment: PaymentResponse,
}

impl From<CommandOutcome> for CommandResponse {
    fn from(outcome: CommandOutcome) -> Self {
        if outcome.already_processed {
            metrics::counter!("payment_callback_replays_total").increment(1);
        }
        Self {
            already_processed: outcome.already_processed,
            payment: PaymentResponse::from(&outcome.payment),
        }
    }
}

#[derive(Serialize)]
pub struct PaymentRequestedResponse {
    pub redirect_url: String,
    pub expires_at: DateTime<Utc>,
    pub payment: PaymentResponse,
}

#[derive(Serialize)]
pub struct PaymentDetailsResponse {
    pub payment: PaymentResponse,
    /// Absent when the order service could not be reached.
    pub order: Option<OrderSummary>,
}

/// Row of a payment listing. Amounts and method stay empty until requested.
#[derive(Serialize)]
pub struct PaymentSummaryResponse {
    pub id: String,
    pub order_id: String,
    pub status: String,
    pub total_amount: Option<i64>,
    pub payment_amount: Option<i64>,
    pub method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Payment> for PaymentSummaryResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id().to_string(),
            order_id: payment.order_id().to_string(),
            status: payment.status().to_string(),
            total_amount: payment.total_amount().map(|m| m.amount()),
            payment_amount: payment.payment_amount().map(|m| m.amount()),
            method: payment.method().map(|m| m.as_str().to_string()),
            created_at: payment.created_at(),
            completed_at: payment.completed_at(),
        }
    }
}

#[derive(Serialize)]
pub struct PaginationResponse {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

#[derive(Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentSummaryResponse>,
    pub pagination: PaginationResponse,
}

// -- Handlers --

/// POST /payments: open a waiting payment for an order.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<CommandResponse>), ApiError> {
    let order_id = OrderId::parse(&req.order_id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order_id: {e}")))?;
    let user_id = UserId::parse(&req.user_id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid user_id: {e}")))?;

    let outcome = state
        .coordinator
        .create_waiting_payment(order_id, user_id)
        .await?;
    let status = if outcome.already_processed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome.into())))
}

/// GET /payments?user_id=&status=&page=&limit=: a user's payments, newest first.
#[tracing::instrument(skip(state, params))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListPaymentsParams>,
) -> Result<Json<PaymentListResponse>, ApiError> {
    let user_id = params
        .user_id
        .ok_or_else(|| ApiError::BadRequest("user_id is required".to_string()))?;
    let user_id = UserId::parse(&user_id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid user_id: {e}")))?;
    let status = params
        .status
        .map(|s| s.parse::<PaymentStatus>())
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    let listed = state
        .coordinator
        .list_payments(user_id, status, page, limit)
        .await?;
    Ok(Json(PaymentListResponse {
        payments: listed
            .payments
            .iter()
            .map(PaymentSummaryResponse::from)
            .collect(),
        pagination: PaginationResponse {
            page,
            limit,
            total: listed.total,
        },
    }))
}

/// GET /payments/{id}: the payment with its order summary when available.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentDetailsResponse>, ApiError> {
    let payment_id = parse_payment_id(&id)?;
    let details = state.coordinator.get_payment_details(payment_id).await?;
    Ok(Json(PaymentDetailsResponse {
        payment: PaymentResponse::from(&details.payment),
        order: details.order,
    }))
}

/// GET /orders/{id}/payment: the payment settling an order.
#[tracing::instrument(skip(state))]
pub async fn get_by_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let order_id = OrderId::parse(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    let payment = state.coordinator.get_payment_by_order(order_id).await?;
    Ok(Json(PaymentResponse::from(&payment)))
}

/// POST /payments/{id}/request: open the payment at the gateway.
#[tracing::instrument(skip(state, req))]
pub async fn request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RequestPaymentRequest>,
) -> Result<Json<PaymentRequestedResponse>, ApiError> {
    let payment_id = parse_payment_id(&id)?;
    let requested = state
        .coordinator
        .request_payment(
            payment_id,
            RequestPayment {
                total_amount: Money::new(req.total_amount),
                payment_amount: Money::new(req.payment_amount),
                discount_amount: Money::new(req.discount_amount),
                delivery_fee: Money::new(req.delivery_fee),
                method: req.method,
            },
        )
        .await?;

    Ok(Json(PaymentRequestedResponse {
        redirect_url: requested.redirect_url,
        expires_at: requested.expires_at,
        payment: PaymentResponse::from(&requested.payment),
    }))
}

/// POST /payments/{id}/complete: gateway approval callback.
#[tracing::instrument(skip(state, headers, req))]
pub async fn complete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let payment_id = parse_payment_id(&id)?;
    let key = idempotency_key(req.idempotency_key, &headers)?;
    let outcome = state
        .coordinator
        .complete_payment(payment_id, &req.approval_number, &key)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /payments/{id}/fail: gateway failure callback.
#[tracing::instrument(skip(state, headers, req))]
pub async fn fail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<FailRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let payment_id = parse_payment_id(&id)?;
    let key = idempotency_key(req.idempotency_key, &headers)?;
    let outcome = state
        .coordinator
        .mark_failed(payment_id, &req.reason, &key)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /payments/{id}/cancel: cancel before settlement.
#[tracing::instrument(skip(state, req))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment_id = parse_payment_id(&id)?;
    let payment = state
        .coordinator
        .cancel_payment(payment_id, &req.reason)
        .await?;
    Ok(Json(PaymentResponse::from(&payment)))
}

/// POST /payments/{id}/refund: ask for a refund of a completed payment.
#[tracing::instrument(skip(state, req))]
pub async fn refund(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment_id = parse_payment_id(&id)?;
    let payment = state
        .coordinator
        .request_refund(payment_id, &req.reason, Money::new(req.amount))
        .await?;
    Ok(Json(PaymentResponse::from(&payment)))
}

/// POST /payments/{id}/refund/complete: gateway refund callback.
#[tracing::instrument(skip(state, headers, req))]
pub async fn complete_refund(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CompleteRefundRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let payment_id = parse_payment_id(&id)?;
    let key = idempotency_key(req.idempotency_key, &headers)?;
    let outcome = state
        .coordinator
        .complete_refund(payment_id, &req.refund_transaction_id, &key)
        .await?;
    Ok(Json(outcome.into()))
}

fn parse_payment_id(id: &str) -> Result<PaymentId, ApiError> {
    PaymentId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}

/// The body field wins over the header. One of them is required.
fn idempotency_key(from_body: Option<String>, headers: &HeaderMap) -> Result<String, ApiError> {
    from_body
        .or_else(|| {
            headers
                .get(IDEMPOTENCY_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("idempotency_key is required".to_string()))
}

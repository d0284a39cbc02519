//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::PaymentError;
use saga::CoordinatorError;
use store::StoreError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// Payment coordination failed.
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Coordinator(err) => coordinator_status(err),
        }
    }
}

fn coordinator_status(err: &CoordinatorError) -> StatusCode {
    match err {
        CoordinatorError::Payment(PaymentError::InvalidStateTransition { .. }) => {
            StatusCode::CONFLICT
        }
        CoordinatorError::Payment(PaymentError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
        CoordinatorError::PaymentNotFound(_) | CoordinatorError::PaymentNotFoundForOrder(_) => {
            StatusCode::NOT_FOUND
        }
        CoordinatorError::OrderAlreadyHasPayment(_)
        | CoordinatorError::Payment(PaymentError::ReservationAlreadyFinalized(_))
        | CoordinatorError::Store(StoreError::ConcurrencyConflict { .. })
        | CoordinatorError::Store(StoreError::DuplicateOrder(_)) => StatusCode::CONFLICT,
        CoordinatorError::LockTimeout { .. }
        | CoordinatorError::Gateway(_)
        | CoordinatorError::OrderService(_)
        | CoordinatorError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retryable = matches!(&self, ApiError::Coordinator(e) if e.is_retryable());
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "retryable": retryable,
        });
        (status, axum::Json(body)).into_response()
    }
}

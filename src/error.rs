//! Central error type for the booking backend.
//!
//! Every core error maps to a uniform `{"status":"error","message":...}`
//! response body. Storage and gateway failures are retryable by the client;
//! the message never carries internal detail beyond what the handler chose
//! to say.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::models::OrderStatus;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// Malformed or incomplete request payload.
    #[error("{0}")]
    InvalidRequest(String),

    /// One or more requested seat ids do not exist for the show.
    #[error("One or more seats not found")]
    SeatsNotFound,

    /// At least one requested seat is already booked.
    #[error("Some seats are no longer available")]
    SeatsUnavailable,

    /// Gateway signature check did not match.
    #[error("Payment verification failed")]
    PaymentVerificationFailed,

    /// Payment was captured but the seats were taken in the meantime.
    /// Requires operator reconciliation (refund handling is external).
    #[error("Seats were taken after payment was captured; the payment will be reconciled")]
    PostPaymentSeatConflict,

    /// Seats are committed but the booking record could not be written.
    /// Retryable; the seats stay held.
    #[error("Booking could not be recorded, please retry")]
    BookingPersistFailed,

    /// A terminal payment order was asked to transition again. Logic bug.
    #[error("Illegal payment order transition {from:?} -> {to:?}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    /// Payment gateway unreachable or circuit breaker open. Retryable.
    #[error("Payment gateway temporarily unavailable, please retry")]
    GatewayUnavailable(String),

    /// Underlying storage failure (including lock timeouts). Retryable,
    /// no partial mutation happened.
    #[error("Internal storage error, please retry")]
    Storage(String),
}

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::SeatsNotFound
            | Self::SeatsUnavailable
            | Self::PaymentVerificationFailed => StatusCode::BAD_REQUEST,
            Self::PostPaymentSeatConflict => StatusCode::CONFLICT,
            Self::BookingPersistFailed
            | Self::InvalidStateTransition { .. }
            | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(e: sqlx::Error) -> Self {
        BookingError::Storage(e.to_string())
    }
}

impl From<redis::RedisError> for BookingError {
    fn from(e: redis::RedisError) -> Self {
        BookingError::Storage(e.to_string())
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {:?}", self);
        }
        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

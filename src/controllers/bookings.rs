use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::BookingError;
use crate::services::booking::{to_paise, to_rupees, BookingData};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create-booking-order", post(create_booking_order))
        .route("/confirm-booking", post(confirm_booking))
}

/* ---------- Request/Response shapes ---------- */

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateBookingOrderRequest {
    show_id: i64,
    #[validate(length(min = 1, message = "No seats selected"))]
    seats: Vec<i64>,
    #[validate(range(min = 0.01, message = "totalPrice must be positive"))]
    total_price: f64,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
struct BookingDataBody {
    user_id: i64,
    show_id: i64,
    #[validate(length(min = 1, message = "No seats selected"))]
    seats: Vec<i64>,
    #[validate(range(min = 0.01, message = "totalPrice must be positive"))]
    total_price: f64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ConfirmBookingRequest {
    // Sent by older clients, not used for anything.
    #[serde(default)]
    #[allow(dead_code)]
    booking_id: Option<serde_json::Value>,
    #[validate(length(min = 1, message = "paymentId is required"))]
    payment_id: String,
    #[validate(length(min = 1, message = "orderId is required"))]
    order_id: String,
    #[validate(length(min = 1, message = "signature is required"))]
    signature: String,
    #[validate(nested)]
    booking_data: BookingDataBody,
}

fn invalid(e: validator::ValidationErrors) -> BookingError {
    BookingError::InvalidRequest(e.to_string().replace('\n', "; "))
}

/* ---------- HTTP Handlers ---------- */

// POST /api/create-booking-order
async fn create_booking_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingOrderRequest>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate().map_err(invalid)?;

    let quote = state
        .booking
        .create_booking_order(req.show_id, &req.seats, to_paise(req.total_price))
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Payment order created",
            "orderId": quote.order.order_id,
            "amount": to_rupees(quote.order.amount),
            "bookingData": {
                "showId": quote.show_id,
                "seats": quote.seats,
                "totalPrice": to_rupees(quote.order.amount),
            },
        })),
    ))
}

// POST /api/confirm-booking
async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfirmBookingRequest>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate().map_err(invalid)?;

    let show_id = req.booking_data.show_id;
    let booking = state
        .booking
        .confirm_booking(
            &req.payment_id,
            &req.order_id,
            &req.signature,
            BookingData {
                user_id: req.booking_data.user_id,
                show_id,
                seats: req.booking_data.seats.clone(),
                total_price: to_paise(req.booking_data.total_price),
            },
        )
        .await?;

    // Booked flags changed; drop the cached seat map for this show.
    state.cache.invalidate_seats(show_id).await;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Booking confirmed successfully",
            "bookingId": booking.booking_id,
            "seats": booking.seat_ids(),
            "total": to_rupees(booking.total_price),
            "paymentId": req.payment_id,
        })),
    ))
}

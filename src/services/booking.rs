//! Booking confirmation orchestrator.
//!
//! Sequences order creation and the post-payment confirmation flow:
//! signature verification, seat commit, payment order transition, booking
//! record creation. Seat state is only ever touched through the reservation
//! engine; the orchestrator owns the PaymentOrder lifecycle and the
//! compensating behavior when a step fails.

use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::{Booking, NewBooking, NewPaymentOrder, OrderStatus, PaymentOrder};
use crate::reservation::ReservationEngine;
use crate::services::payment::PaymentGateway;
use crate::store::{BookingStore, CatalogStore, PaymentOrderStore, SeatStore};

/// How many times a booking insert is attempted once the seats are
/// committed, before giving up with `BookingPersistFailed`.
const BOOKING_PERSIST_ATTEMPTS: u32 = 3;

/// Convert a price in rupees to minor units (paise).
pub fn to_paise(rupees: f64) -> i64 {
    (rupees * 100.0).round() as i64
}

/// Convert minor units (paise) back to rupees for the API boundary.
pub fn to_rupees(paise: i64) -> f64 {
    paise as f64 / 100.0
}

/// Validated confirmation payload (amounts already in minor units).
#[derive(Debug, Clone)]
pub struct BookingData {
    pub user_id: i64,
    pub show_id: i64,
    pub seats: Vec<i64>,
    pub total_price: i64,
}

/// Result of order creation: the persisted order plus the booking data the
/// client must echo back on confirmation.
#[derive(Debug, Clone)]
pub struct OrderQuote {
    pub order: PaymentOrder,
    pub show_id: i64,
    pub seats: Vec<i64>,
}

pub struct BookingOrchestrator<G, S>
where
    G: PaymentGateway,
    S: SeatStore + CatalogStore + BookingStore + PaymentOrderStore + Clone,
{
    gateway: G,
    engine: ReservationEngine<S>,
    store: S,
}

impl<G, S> BookingOrchestrator<G, S>
where
    G: PaymentGateway,
    S: SeatStore + CatalogStore + BookingStore + PaymentOrderStore + Clone,
{
    pub fn new(gateway: G, store: S) -> Self {
        Self {
            gateway,
            engine: ReservationEngine::new(store.clone()),
            store,
        }
    }

    pub fn engine(&self) -> &ReservationEngine<S> {
        &self.engine
    }

    /// Create a payment order for a seat selection.
    ///
    /// The availability check here is advisory (seats are only committed at
    /// confirmation time) but it rejects obviously dead requests before the
    /// gateway is involved.
    pub async fn create_booking_order(
        &self,
        show_id: i64,
        seats: &[i64],
        total_price: i64,
    ) -> Result<OrderQuote, BookingError> {
        if total_price <= 0 {
            return Err(BookingError::InvalidRequest(
                "totalPrice must be positive".to_string(),
            ));
        }
        let show = self
            .store
            .show_summary(show_id)
            .await?
            .ok_or_else(|| BookingError::InvalidRequest("Show not found".to_string()))?;

        self.engine.check_available(show_id, seats).await?;

        let receipt = format!("txn_{}", Uuid::new_v4());
        let description = show.order_description();
        let order_id = self
            .gateway
            .create_order(total_price, &receipt, &description)
            .await?;

        let order = self
            .store
            .insert_order(NewPaymentOrder {
                order_id,
                amount: total_price,
                description,
            })
            .await?;

        info!(order_id = %order.order_id, show_id, amount = order.amount, "payment order created");

        Ok(OrderQuote {
            order,
            show_id,
            seats: seats.to_vec(),
        })
    }

    /// Confirm a booking after the client completed the payment externally.
    pub async fn confirm_booking(
        &self,
        payment_id: &str,
        order_id: &str,
        signature: &str,
        data: BookingData,
    ) -> Result<Booking, BookingError> {
        // 1. Validation, before anything external.
        if payment_id.is_empty() || order_id.is_empty() || signature.is_empty() {
            return Err(BookingError::InvalidRequest(
                "paymentId, orderId and signature are required".to_string(),
            ));
        }
        if data.user_id <= 0 || data.show_id <= 0 {
            return Err(BookingError::InvalidRequest(
                "userId and showId must be > 0".to_string(),
            ));
        }
        if data.seats.is_empty() {
            return Err(BookingError::InvalidRequest("No seats selected".to_string()));
        }
        if data.total_price <= 0 {
            return Err(BookingError::InvalidRequest(
                "totalPrice must be positive".to_string(),
            ));
        }

        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or_else(|| BookingError::InvalidRequest("Unknown payment order".to_string()))?;
        if let Some(status) = order.status() {
            if status.is_terminal() {
                // Replayed confirmation of a resolved order; the state
                // machine refuses rather than guessing.
                return Err(BookingError::InvalidStateTransition {
                    from: status,
                    to: OrderStatus::Success,
                });
            }
        }

        // 2. Signature verification; a mismatch resolves the order.
        let valid = self
            .gateway
            .verify_signature(payment_id, order_id, signature)
            .await?;
        if !valid {
            self.store
                .transition_order(order_id, Some(payment_id), OrderStatus::Failed)
                .await?;
            return Err(BookingError::PaymentVerificationFailed);
        }

        // 3. Seat commit. Losing the seats after the payment was captured is
        // an operator problem, not just a user error: the refund has to
        // happen out of band.
        let commit = match self.engine.reserve(data.show_id, &data.seats).await {
            Ok(commit) => commit,
            Err(BookingError::SeatsUnavailable) => {
                warn!(
                    order_id,
                    payment_id,
                    show_id = data.show_id,
                    "seats taken after payment capture; order failed, refund needs reconciliation"
                );
                self.store
                    .transition_order(order_id, Some(payment_id), OrderStatus::Failed)
                    .await?;
                return Err(BookingError::PostPaymentSeatConflict);
            }
            Err(BookingError::SeatsNotFound) => {
                warn!(
                    order_id,
                    payment_id,
                    show_id = data.show_id,
                    "paid confirmation names unknown seats; order failed, refund needs reconciliation"
                );
                self.store
                    .transition_order(order_id, Some(payment_id), OrderStatus::Failed)
                    .await?;
                return Err(BookingError::SeatsNotFound);
            }
            // Storage errors leave the order CREATED so the client can
            // retry the confirmation.
            Err(e) => return Err(e),
        };

        // 4. Seats are held; resolve the order.
        self.store
            .transition_order(order_id, Some(payment_id), OrderStatus::Success)
            .await?;

        // 5. Record the booking. The seats stay held even if this keeps
        // failing, so the insert is retried rather than rolled back.
        let new_booking = NewBooking {
            user_id: data.user_id,
            show_id: data.show_id,
            seat_ids: commit.seat_ids.clone(),
            total_price: data.total_price,
        };
        for attempt in 1..=BOOKING_PERSIST_ATTEMPTS {
            match self.store.insert_booking(new_booking.clone()).await {
                Ok(booking) => {
                    info!(
                        booking_id = booking.booking_id,
                        order_id,
                        version = commit.version,
                        "booking confirmed"
                    );
                    return Ok(booking);
                }
                Err(e) if attempt < BOOKING_PERSIST_ATTEMPTS => {
                    warn!(order_id, attempt, "booking insert failed, retrying: {e}");
                    tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
                }
                Err(e) => {
                    error!(
                        order_id,
                        "booking insert failed after {BOOKING_PERSIST_ATTEMPTS} attempts, seats stay held: {e}"
                    );
                    return Err(BookingError::BookingPersistFailed);
                }
            }
        }
        unreachable!("booking persist loop always returns")
    }
}

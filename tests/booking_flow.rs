//! End-to-end booking flow over the in-memory backend: order creation,
//! payment confirmation, seat commits and the failure paths in between.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use easybook::error::BookingError;
use easybook::services::booking::{BookingData, BookingOrchestrator};
use easybook::services::payment::PaymentGateway;
use easybook::store::{MemoryStore, PaymentOrderStore, SeatStore};

/// Gateway fake with a deterministic signature scheme so both the accepted
/// and the rejected verification paths can be driven from tests.
struct ScriptedGateway {
    counter: AtomicU32,
}

impl ScriptedGateway {
    fn new() -> Self {
        Self { counter: AtomicU32::new(0) }
    }

    fn signature_for(order_id: &str, payment_id: &str) -> String {
        format!("sig:{order_id}:{payment_id}")
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_order(
        &self,
        _amount: i64,
        _receipt: &str,
        _description: &str,
    ) -> Result<String, BookingError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("order_it_{n}"))
    }

    async fn verify_signature(
        &self,
        payment_id: &str,
        order_id: &str,
        signature: &str,
    ) -> Result<bool, BookingError> {
        Ok(Self::signature_for(order_id, payment_id) == signature)
    }
}

type Flow = BookingOrchestrator<ScriptedGateway, MemoryStore>;

async fn setup() -> (Flow, MemoryStore, Vec<i64>) {
    let store = MemoryStore::new();
    let seat_ids = store
        .seed_show(1, "Inception", "PVR Phoenix", "7:30 PM", &["A1", "A2", "A3"])
        .await;
    let flow = BookingOrchestrator::new(ScriptedGateway::new(), store.clone());
    (flow, store, seat_ids)
}

fn booking_data(seats: &[i64], total_price: i64) -> BookingData {
    BookingData {
        user_id: 7,
        show_id: 1,
        seats: seats.to_vec(),
        total_price,
    }
}

#[tokio::test]
async fn full_flow_books_two_of_three_seats() {
    let (flow, store, ids) = setup().await;

    // Order for A1+A2 at 500.00 rupees.
    let quote = flow
        .create_booking_order(1, &ids[..2], 50_000)
        .await
        .unwrap();
    assert_eq!(quote.order.status, "CREATED");
    assert_eq!(quote.order.amount, 50_000);

    let signature = ScriptedGateway::signature_for(&quote.order.order_id, "pay_77");
    let booking = flow
        .confirm_booking("pay_77", &quote.order.order_id, &signature, booking_data(&ids[..2], 50_000))
        .await
        .unwrap();

    // Booking mirrors the committed seats and the requested price.
    assert_eq!(booking.seat_ids(), ids[..2].to_vec());
    assert_eq!(booking.total_price, 50_000);
    assert_eq!(booking.user_id, 7);

    // A1+A2 booked, A3 untouched.
    let seats = flow.engine().seats(1).await.unwrap();
    for seat in &seats {
        let expected = seat.seat_id == ids[0] || seat.seat_id == ids[1];
        assert_eq!(seat.is_booked, expected, "seat {}", seat.seat_number);
    }

    let order = store.find_order(&quote.order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, "SUCCESS");
    assert_eq!(order.payment_id.as_deref(), Some("pay_77"));
}

#[tokio::test]
async fn order_creation_refuses_a_partially_booked_selection() {
    let (flow, store, ids) = setup().await;

    // A1 goes to someone else first.
    store.commit_seats(1, &ids[..1]).await.unwrap();

    let err = flow
        .create_booking_order(1, &[ids[0], ids[1]], 50_000)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::SeatsUnavailable));

    // A2 stays free.
    let seats = store.seats_for_show(1).await.unwrap();
    assert!(!seats.iter().find(|s| s.seat_id == ids[1]).unwrap().is_booked);
}

#[tokio::test]
async fn failed_verification_resolves_the_order_and_leaves_seats_alone() {
    let (flow, store, ids) = setup().await;
    let quote = flow.create_booking_order(1, &ids[..2], 50_000).await.unwrap();

    let err = flow
        .confirm_booking("pay_1", &quote.order.order_id, "not-the-signature", booking_data(&ids[..2], 50_000))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::PaymentVerificationFailed));

    let seats = store.seats_for_show(1).await.unwrap();
    assert!(seats.iter().all(|s| !s.is_booked));
    let order = store.find_order(&quote.order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, "FAILED");
}

#[tokio::test]
async fn two_paid_orders_for_the_same_seat_resolve_to_one_booking() {
    let (flow, store, ids) = setup().await;

    // Two buyers got orders for overlapping selections; both payments were
    // captured by the gateway.
    let quote_a = flow.create_booking_order(1, &ids[..2], 50_000).await.unwrap();
    let quote_b = flow.create_booking_order(1, &ids[1..], 50_000).await.unwrap();

    let sig_a = ScriptedGateway::signature_for(&quote_a.order.order_id, "pay_a");
    flow.confirm_booking("pay_a", &quote_a.order.order_id, &sig_a, booking_data(&ids[..2], 50_000))
        .await
        .unwrap();

    let sig_b = ScriptedGateway::signature_for(&quote_b.order.order_id, "pay_b");
    let err = flow
        .confirm_booking("pay_b", &quote_b.order.order_id, &sig_b, booking_data(&ids[1..], 50_000))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::PostPaymentSeatConflict));

    // One booking; the loser's order is FAILED for reconciliation; A3 was
    // not partially committed by the losing request.
    assert_eq!(store.bookings().await.len(), 1);
    let order_b = store.find_order(&quote_b.order.order_id).await.unwrap().unwrap();
    assert_eq!(order_b.status, "FAILED");
    let seats = store.seats_for_show(1).await.unwrap();
    assert!(!seats.iter().find(|s| s.seat_id == ids[2]).unwrap().is_booked);
}

#[tokio::test]
async fn concurrent_confirmations_for_overlapping_seats_commit_once() {
    let (flow, store, ids) = setup().await;
    let quote_a = flow.create_booking_order(1, &ids[..2], 50_000).await.unwrap();
    let quote_b = flow.create_booking_order(1, &ids[1..], 50_000).await.unwrap();

    let flow = std::sync::Arc::new(flow);
    let sig_a = ScriptedGateway::signature_for(&quote_a.order.order_id, "pay_a");
    let sig_b = ScriptedGateway::signature_for(&quote_b.order.order_id, "pay_b");

    let (res_a, res_b) = tokio::join!(
        flow.confirm_booking("pay_a", &quote_a.order.order_id, &sig_a, booking_data(&ids[..2], 50_000)),
        flow.confirm_booking("pay_b", &quote_b.order.order_id, &sig_b, booking_data(&ids[1..], 50_000)),
    );

    let successes = [res_a.is_ok(), res_b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1);
    let loser = if res_a.is_ok() { res_b } else { res_a };
    assert!(matches!(loser.unwrap_err(), BookingError::PostPaymentSeatConflict));

    // The contested seat is booked exactly once across both requests.
    let seats = store.seats_for_show(1).await.unwrap();
    assert!(seats.iter().find(|s| s.seat_id == ids[1]).unwrap().is_booked);
    assert_eq!(store.bookings().await.len(), 1);
}

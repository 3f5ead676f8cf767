//! In-memory backend for the storage ports.
//!
//! One `tokio` mutex guards the whole state, which makes every seat commit a
//! single atomic unit; the lock acquisition is time-bounded the same way the
//! Postgres backend bounds its row locks. Used by the test suite and handy
//! for local development without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::error::BookingError;
use crate::models::{Booking, NewBooking, NewPaymentOrder, OrderStatus, PaymentOrder, Seat, ShowSummary};
use crate::store::{BookingStore, CatalogStore, PaymentOrderStore, SeatCommit, SeatStore};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
struct ShowRecord {
    movie_title: String,
    theater_name: String,
    timing: String,
    available_seats: i32,
    version: i64,
}

#[derive(Debug, Default)]
struct Inner {
    shows: HashMap<i64, ShowRecord>,
    seats: BTreeMap<i64, Seat>,
    bookings: Vec<Booking>,
    orders: HashMap<String, PaymentOrder>,
    next_seat_id: i64,
    next_booking_id: i64,
    next_order_row_id: i64,
    /// Number of upcoming `insert_booking` calls that fail, for exercising
    /// the orchestrator's retry path.
    booking_failures: u32,
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            lock_timeout,
        }
    }

    /// Register a show with one seat per label; returns the seat ids in
    /// label order.
    pub async fn seed_show(
        &self,
        show_id: i64,
        movie_title: &str,
        theater_name: &str,
        timing: &str,
        seat_numbers: &[&str],
    ) -> Vec<i64> {
        let mut inner = self.inner.lock().await;
        inner.shows.insert(
            show_id,
            ShowRecord {
                movie_title: movie_title.to_string(),
                theater_name: theater_name.to_string(),
                timing: timing.to_string(),
                available_seats: seat_numbers.len() as i32,
                version: 0,
            },
        );
        let mut ids = Vec::with_capacity(seat_numbers.len());
        for number in seat_numbers {
            inner.next_seat_id += 1;
            let seat_id = inner.next_seat_id;
            inner.seats.insert(
                seat_id,
                Seat {
                    seat_id,
                    show_id,
                    seat_number: (*number).to_string(),
                    is_booked: false,
                },
            );
            ids.push(seat_id);
        }
        ids
    }

    pub async fn fail_next_booking_inserts(&self, count: u32) {
        self.inner.lock().await.booking_failures = count;
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.inner.lock().await.bookings.clone()
    }

    async fn lock(&self) -> Result<tokio::sync::MutexGuard<'_, Inner>, BookingError> {
        timeout(self.lock_timeout, self.inner.lock())
            .await
            .map_err(|_| BookingError::Storage("seat lock wait timed out".to_string()))
    }
}

#[async_trait]
impl SeatStore for MemoryStore {
    async fn seats_for_show(&self, show_id: i64) -> Result<Vec<Seat>, BookingError> {
        let inner = self.lock().await?;
        Ok(inner
            .seats
            .values()
            .filter(|s| s.show_id == show_id)
            .cloned()
            .collect())
    }

    async fn commit_seats(&self, show_id: i64, seat_ids: &[i64]) -> Result<SeatCommit, BookingError> {
        let mut inner = self.lock().await?;

        for id in seat_ids {
            match inner.seats.get(id) {
                Some(seat) if seat.show_id == show_id => {}
                _ => return Err(BookingError::SeatsNotFound),
            }
        }
        if seat_ids.iter().any(|id| inner.seats[id].is_booked) {
            return Err(BookingError::SeatsUnavailable);
        }

        for id in seat_ids {
            if let Some(seat) = inner.seats.get_mut(id) {
                seat.is_booked = true;
            }
        }
        let show = inner
            .shows
            .get_mut(&show_id)
            .ok_or(BookingError::SeatsNotFound)?;
        show.available_seats -= seat_ids.len() as i32;
        show.version += 1;

        Ok(SeatCommit {
            seat_ids: seat_ids.to_vec(),
            version: show.version,
        })
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn show_summary(&self, show_id: i64) -> Result<Option<ShowSummary>, BookingError> {
        let inner = self.lock().await?;
        Ok(inner.shows.get(&show_id).map(|s| ShowSummary {
            show_id,
            movie_title: s.movie_title.clone(),
            theater_name: s.theater_name.clone(),
            timing: s.timing.clone(),
            available_seats: s.available_seats,
        }))
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, BookingError> {
        let mut inner = self.lock().await?;
        if inner.booking_failures > 0 {
            inner.booking_failures -= 1;
            return Err(BookingError::Storage("injected booking insert failure".to_string()));
        }
        inner.next_booking_id += 1;
        let row = Booking {
            booking_id: inner.next_booking_id,
            user_id: booking.user_id,
            show_id: booking.show_id,
            seats_booked: booking.seats_booked(),
            total_price: booking.total_price,
        };
        inner.bookings.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl PaymentOrderStore for MemoryStore {
    async fn insert_order(&self, order: NewPaymentOrder) -> Result<PaymentOrder, BookingError> {
        let mut inner = self.lock().await?;
        inner.next_order_row_id += 1;
        let row = PaymentOrder {
            id: inner.next_order_row_id,
            order_id: order.order_id.clone(),
            payment_id: None,
            amount: order.amount,
            status: OrderStatus::Created.as_str().to_string(),
            description: order.description,
            created_at: chrono::Utc::now().naive_utc(),
        };
        inner.orders.insert(order.order_id, row.clone());
        Ok(row)
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<PaymentOrder>, BookingError> {
        let inner = self.lock().await?;
        Ok(inner.orders.get(order_id).cloned())
    }

    async fn transition_order(
        &self,
        order_id: &str,
        payment_id: Option<&str>,
        to: OrderStatus,
    ) -> Result<(), BookingError> {
        let mut inner = self.lock().await?;
        let order = inner
            .orders
            .get_mut(order_id)
            .ok_or_else(|| BookingError::InvalidRequest("Unknown payment order".to_string()))?;
        let from = OrderStatus::parse(&order.status)
            .ok_or_else(|| BookingError::Storage(format!("corrupt order status: {}", order.status)))?;
        if !from.can_transition_to(to) {
            return Err(BookingError::InvalidStateTransition { from, to });
        }
        order.status = to.as_str().to_string();
        if let Some(pid) = payment_id {
            order.payment_id = Some(pid.to_string());
        }
        Ok(())
    }
}

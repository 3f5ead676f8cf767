//! Postgres backend for the storage ports.
//!
//! Seat commits take row-level `FOR UPDATE` locks on the targeted seats,
//! re-check the booked flags under the lock and flip them with a conditional
//! update, all inside one transaction. `lock_timeout` bounds the wait so a
//! contended commit fails retryably instead of blocking.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::BookingError;
use crate::models::{Booking, NewBooking, NewPaymentOrder, OrderStatus, PaymentOrder, Seat, ShowSummary};
use crate::store::{BookingStore, CatalogStore, PaymentOrderStore, SeatCommit, SeatStore};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }
}

#[async_trait]
impl SeatStore for PgStore {
    async fn seats_for_show(&self, show_id: i64) -> Result<Vec<Seat>, BookingError> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT seat_id, show_id, seat_number, is_booked
             FROM seats
             WHERE show_id = $1
             ORDER BY seat_id",
        )
        .bind(show_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }

    async fn commit_seats(&self, show_id: i64, seat_ids: &[i64]) -> Result<SeatCommit, BookingError> {
        let ids: Vec<i64> = seat_ids.to_vec();
        let mut tx = self.pool.begin().await?;

        // Bounded wait on the row locks; a timeout aborts the transaction
        // with a lock_not_available error and nothing mutated.
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;

        // Lock the targeted rows. The first committer wins; everyone else
        // waits here and then sees the flipped flags.
        let locked: Vec<(i64, bool)> = sqlx::query_as(
            "SELECT seat_id, is_booked
             FROM seats
             WHERE show_id = $1 AND seat_id = ANY($2)
             FOR UPDATE",
        )
        .bind(show_id)
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        if locked.len() != ids.len() {
            tx.rollback().await.ok();
            return Err(BookingError::SeatsNotFound);
        }
        if locked.iter().any(|(_, is_booked)| *is_booked) {
            tx.rollback().await.ok();
            return Err(BookingError::SeatsUnavailable);
        }

        let updated = sqlx::query(
            "UPDATE seats
             SET is_booked = TRUE
             WHERE show_id = $1 AND seat_id = ANY($2) AND is_booked = FALSE",
        )
        .bind(show_id)
        .bind(&ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated as usize != ids.len() {
            tx.rollback().await.ok();
            return Err(BookingError::SeatsUnavailable);
        }

        // Counter and version move in the same transaction as the flags.
        let version: i64 = sqlx::query_scalar(
            "UPDATE shows
             SET available_seats = available_seats - $2, version = version + 1
             WHERE show_id = $1
             RETURNING version",
        )
        .bind(show_id)
        .bind(updated as i32)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(SeatCommit { seat_ids: ids, version })
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn show_summary(&self, show_id: i64) -> Result<Option<ShowSummary>, BookingError> {
        let summary = sqlx::query_as::<_, ShowSummary>(
            "SELECT s.show_id, m.title AS movie_title, t.name AS theater_name,
                    s.timing, s.available_seats
             FROM shows s
             JOIN movies m ON m.movie_id = s.movie_id
             JOIN theaters t ON t.theater_id = s.theater_id
             WHERE s.show_id = $1",
        )
        .bind(show_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(summary)
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, BookingError> {
        let row = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (user_id, show_id, seats_booked, total_price)
             VALUES ($1, $2, $3, $4)
             RETURNING booking_id, user_id, show_id, seats_booked, total_price",
        )
        .bind(booking.user_id)
        .bind(booking.show_id)
        .bind(booking.seats_booked())
        .bind(booking.total_price)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl PaymentOrderStore for PgStore {
    async fn insert_order(&self, order: NewPaymentOrder) -> Result<PaymentOrder, BookingError> {
        let row = sqlx::query_as::<_, PaymentOrder>(
            "INSERT INTO payment_orders (order_id, amount, status, description)
             VALUES ($1, $2, 'CREATED', $3)
             RETURNING id, order_id, payment_id, amount, status, description, created_at",
        )
        .bind(&order.order_id)
        .bind(order.amount)
        .bind(&order.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<PaymentOrder>, BookingError> {
        let row = sqlx::query_as::<_, PaymentOrder>(
            "SELECT id, order_id, payment_id, amount, status, description, created_at
             FROM payment_orders
             WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn transition_order(
        &self,
        order_id: &str,
        payment_id: Option<&str>,
        to: OrderStatus,
    ) -> Result<(), BookingError> {
        // Single conditional update: only a CREATED order moves. Exactly one
        // writer can win this race for a given order.
        let moved = sqlx::query(
            "UPDATE payment_orders
             SET status = $2, payment_id = COALESCE($3, payment_id)
             WHERE order_id = $1 AND status = 'CREATED'",
        )
        .bind(order_id)
        .bind(to.as_str())
        .bind(payment_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if moved == 1 {
            return Ok(());
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM payment_orders WHERE order_id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            None => Err(BookingError::InvalidRequest("Unknown payment order".to_string())),
            Some(status) => {
                let from = OrderStatus::parse(&status)
                    .ok_or_else(|| BookingError::Storage(format!("corrupt order status: {status}")))?;
                Err(BookingError::InvalidStateTransition { from, to })
            }
        }
    }
}

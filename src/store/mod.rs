//! Storage ports for the booking core.
//!
//! The reservation engine and the booking orchestrator talk to storage only
//! through these traits, so the core can be exercised against the in-memory
//! backend in tests while production runs on Postgres.

use async_trait::async_trait;

use crate::error::BookingError;
use crate::models::{Booking, NewBooking, NewPaymentOrder, OrderStatus, PaymentOrder, Seat, ShowSummary};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result of a successful seat commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatCommit {
    /// Seat ids flipped to booked, ascending.
    pub seat_ids: Vec<i64>,
    /// Show version after the commit. Monotonically increasing, usable by
    /// callers for idempotency checks.
    pub version: i64,
}

#[async_trait]
pub trait SeatStore: Send + Sync {
    async fn seats_for_show(&self, show_id: i64) -> Result<Vec<Seat>, BookingError>;

    /// Atomically transition all of `seat_ids` from available to booked and
    /// decrement the show's available-seat counter, or change nothing.
    ///
    /// Callers pass deduplicated ids. Implementations must hold whatever
    /// lock/transaction scope they use only for the targeted seat rows of
    /// the one show, must bound the wait for that scope, and must report a
    /// timed-out wait as `Storage` (retryable, nothing mutated).
    async fn commit_seats(&self, show_id: i64, seat_ids: &[i64]) -> Result<SeatCommit, BookingError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn show_summary(&self, show_id: i64) -> Result<Option<ShowSummary>, BookingError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, BookingError>;
}

#[async_trait]
pub trait PaymentOrderStore: Send + Sync {
    async fn insert_order(&self, order: NewPaymentOrder) -> Result<PaymentOrder, BookingError>;

    async fn find_order(&self, order_id: &str) -> Result<Option<PaymentOrder>, BookingError>;

    /// Move an order out of CREATED, recording the gateway payment id.
    /// Transitioning a terminal order fails with `InvalidStateTransition`;
    /// an unknown order id fails with `InvalidRequest`.
    async fn transition_order(
        &self,
        order_id: &str,
        payment_id: Option<&str>,
        to: OrderStatus,
    ) -> Result<(), BookingError>;
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A confirmed booking. Created only after the seats were committed and the
/// payment verified; there is no update path.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub booking_id: i64,
    pub user_id: i64,
    pub show_id: i64,
    /// Committed seat ids, comma-joined in ascending order.
    pub seats_booked: String,
    /// Total price in minor units (paise).
    pub total_price: i64,
}

impl Booking {
    pub fn seat_ids(&self) -> Vec<i64> {
        self.seats_booked
            .split(',')
            .filter_map(|s| s.parse().ok())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: i64,
    pub show_id: i64,
    pub seat_ids: Vec<i64>,
    pub total_price: i64,
}

impl NewBooking {
    pub fn seats_booked(&self) -> String {
        self.seat_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

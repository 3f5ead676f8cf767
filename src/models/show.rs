use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Show {
    pub show_id: i64,
    pub movie_id: i64,
    pub theater_id: i64,
    pub timing: String,
    /// Denormalized counter, kept consistent with the seat rows by the
    /// reservation engine (decremented in the same atomic unit).
    pub available_seats: i32,
    /// Monotonically increasing commit counter, bumped on every seat commit.
    pub version: i64,
}

/// Show joined with its movie and theater labels, used to build
/// payment order descriptions.
#[derive(Debug, Clone, FromRow)]
pub struct ShowSummary {
    pub show_id: i64,
    pub movie_title: String,
    pub theater_name: String,
    pub timing: String,
    pub available_seats: i32,
}

impl ShowSummary {
    pub fn order_description(&self) -> String {
        format!(
            "Movie: {} - {} - {}",
            self.movie_title, self.theater_name, self.show_id
        )
    }
}

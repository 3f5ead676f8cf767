use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub movie_id: i64,
    pub title: String,
    pub genre: Option<String>,
    pub language: Option<String>,
    pub duration_minutes: i32,
}

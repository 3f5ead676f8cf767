use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::error::BookingError;
use crate::models::{Show, Theater};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(get_movies))
        .route("/cities/{movie_id}", get(get_cities))
        .route("/theaters/{movie_id}/{city}", get(get_theaters))
        .route("/shows/{movie_id}/{theater_id}", get(get_shows))
        .route("/seats/{show_id}", get(get_seats))
}

/* ---------- MOVIES ---------- */

// GET /api/movies
async fn get_movies(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.cache.get_movies().await)
}

// GET /api/cities/{movie_id}
async fn get_cities(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    let cities: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT t.city
         FROM shows s
         JOIN theaters t ON t.theater_id = s.theater_id
         WHERE s.movie_id = $1
         ORDER BY t.city",
    )
    .bind(movie_id)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(cities))
}

// GET /api/theaters/{movie_id}/{city}
async fn get_theaters(
    State(state): State<Arc<AppState>>,
    Path((movie_id, city)): Path<(i64, String)>,
) -> Result<impl IntoResponse, BookingError> {
    let theaters: Vec<Theater> = sqlx::query_as(
        "SELECT DISTINCT t.theater_id, t.name, t.city
         FROM shows s
         JOIN theaters t ON t.theater_id = s.theater_id
         WHERE s.movie_id = $1 AND LOWER(t.city) = LOWER($2)
         ORDER BY t.theater_id",
    )
    .bind(movie_id)
    .bind(city)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(theaters))
}

// GET /api/shows/{movie_id}/{theater_id}
async fn get_shows(
    State(state): State<Arc<AppState>>,
    Path((movie_id, theater_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, BookingError> {
    let shows: Vec<Show> = sqlx::query_as(
        "SELECT show_id, movie_id, theater_id, timing, available_seats, version
         FROM shows
         WHERE movie_id = $1 AND theater_id = $2
         ORDER BY show_id",
    )
    .bind(movie_id)
    .bind(theater_id)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(shows))
}

/* ---------- SEATS ---------- */

// GET /api/seats/{show_id} - read path, no mutation
async fn get_seats(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    if show_id <= 0 {
        return Err(BookingError::InvalidRequest("showId must be > 0".to_string()));
    }
    let seats = state.cache.get_seats(show_id).await?;
    Ok(Json(seats))
}

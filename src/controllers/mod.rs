pub mod bookings;
pub mod catalog;
pub mod chat;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(catalog::routes())
        .merge(bookings::routes())
        .merge(chat::routes())
}

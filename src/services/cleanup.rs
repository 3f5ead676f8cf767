//! Background reporting of stale payment orders.
//!
//! Orders stuck in CREATED past the configured age usually mean the buyer
//! abandoned checkout, or a confirmation never reached us after the gateway
//! captured the funds. Seat state is never touched from here; the loop only
//! makes the backlog visible so operators can reconcile against the gateway.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::database::Database;

pub struct CleanupService {
    db: Database,
    stale_order_minutes: i64,
}

impl CleanupService {
    pub fn new(db: Database, stale_order_minutes: i64) -> Self {
        Self { db, stale_order_minutes }
    }

    pub async fn report_stale_orders(&self) {
        let cutoff = Utc::now().naive_utc() - Duration::minutes(self.stale_order_minutes);

        let stale: Vec<(String, i64, chrono::NaiveDateTime)> = sqlx::query_as(
            "SELECT order_id, amount, created_at
             FROM payment_orders
             WHERE status = 'CREATED' AND created_at < $1
             ORDER BY created_at",
        )
        .bind(cutoff)
        .fetch_all(&self.db.pool)
        .await
        .unwrap_or_default();

        if stale.is_empty() {
            info!("No stale payment orders");
            return;
        }

        for (order_id, amount, created_at) in &stale {
            warn!(
                %order_id,
                amount,
                %created_at,
                "payment order stuck in CREATED; reconcile against the gateway"
            );
        }
        info!(count = stale.len(), "stale payment orders reported");
    }
}

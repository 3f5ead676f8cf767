use crate::cache::CacheService;
use crate::models::Seat;
use redis::AsyncCommands;

const SEATS_TTL_SECONDS: u64 = 300;

impl CacheService {
    /// Seat map of a show, cache first. The cache is invalidated after every
    /// successful commit, so the TTL only bounds staleness when an
    /// invalidation is lost.
    pub async fn get_seats(&self, show_id: i64) -> Result<Vec<Seat>, sqlx::Error> {
        if let Ok(seats) = self.get_seats_from_cache(show_id).await {
            return Ok(seats);
        }

        let seats = self.load_seats_from_db(show_id).await?;
        let _ = self.save_seats_to_cache(show_id, &seats).await;
        Ok(seats)
    }

    pub async fn invalidate_seats(&self, show_id: i64) {
        let mut conn = self.redis.conn.clone();
        let _: Result<i64, _> = conn.del(format!("seats:{show_id}")).await;
    }

    async fn load_seats_from_db(&self, show_id: i64) -> Result<Vec<Seat>, sqlx::Error> {
        sqlx::query_as::<_, Seat>(
            "SELECT seat_id, show_id, seat_number, is_booked
             FROM seats
             WHERE show_id = $1
             ORDER BY seat_id",
        )
        .bind(show_id)
        .fetch_all(&self.db.pool)
        .await
    }

    async fn get_seats_from_cache(&self, show_id: i64) -> Result<Vec<Seat>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: String = conn.get(format!("seats:{show_id}")).await?;
        let seats: Vec<Seat> = serde_json::from_str(&data).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
        })?;
        Ok(seats)
    }

    async fn save_seats_to_cache(&self, show_id: i64, seats: &[Seat]) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(seats).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex(format!("seats:{show_id}"), data, SEATS_TTL_SECONDS).await
    }
}

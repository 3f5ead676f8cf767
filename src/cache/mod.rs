use crate::{database::Database, redis_client::RedisClient};
use tracing::info;

pub mod movies;
pub mod seats;

#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    db: Database,
}

impl CacheService {
    pub fn new(redis: RedisClient, db: Database) -> Self {
        Self { redis, db }
    }

    // Warm the read caches at startup
    pub async fn warmup_cache(&self) {
        info!("Starting cache warmup...");
        let _ = self.get_movies().await;
        info!("Cache warmup done");
    }
}

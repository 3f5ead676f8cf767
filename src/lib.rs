pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod redis_client;
pub mod reservation;
pub mod services;
pub mod store;

use std::sync::Arc;
use tokio::task;

use services::booking::BookingOrchestrator;
use services::chat::{AnswerGenerator, ChatService, GeminiClient};
use services::payment::RazorpayClient;
use store::PgStore;

/// Production wiring of the orchestrator: Razorpay gateway over the
/// Postgres-backed stores.
pub type BookingFlow = BookingOrchestrator<RazorpayClient, PgStore>;

// Shared state for the whole application
pub struct AppState {
    pub db: database::Database,
    pub redis: redis_client::RedisClient,
    pub cache: cache::CacheService,
    pub config: config::Config,
    pub booking: BookingFlow,
    pub chat: ChatService,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;

        db.run_migrations().await?;

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        let cache = cache::CacheService::new(redis.clone(), db.clone());

        let store = PgStore::new(db.pool.clone(), config.reservation.lock_timeout_ms);
        let gateway = RazorpayClient::from_config(&config.payment, &config.circuit_breaker);
        let booking = BookingOrchestrator::new(gateway, store);

        let generator: Option<Arc<dyn AnswerGenerator>> =
            config.chat.gemini_api_key.clone().map(|key| {
                Arc::new(GeminiClient::new(key, config.chat.gemini_url.clone()))
                    as Arc<dyn AnswerGenerator>
            });
        let chat = ChatService::new(db.clone(), generator);

        let state = Arc::new(Self {
            db,
            redis,
            cache,
            config,
            booking,
            chat,
        });

        // Warm the caches in the background
        let state_for_bg = state.clone();
        task::spawn(async move {
            state_for_bg.cache.warmup_cache().await;
        });

        Ok(state)
    }
}

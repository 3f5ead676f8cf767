use serde::Deserialize;
use std::env;

// Top-level configuration container, assembled from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub payment: PaymentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub reservation: ReservationConfig,
    pub chat: ChatConfig,
}

// Application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Database settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Redis settings
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

// Payment gateway settings
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: String,
    pub gateway_url: String,
    pub currency: String,
    /// CREATED orders older than this are reported for reconciliation.
    pub stale_order_minutes: i64,
}

// Circuit breaker settings
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

// Reservation engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationConfig {
    /// Upper bound on waiting for seat row locks, in milliseconds.
    pub lock_timeout_ms: u64,
}

// Chat assistant settings
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "easybook=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            },
            payment: PaymentConfig {
                key_id: env::var("RAZORPAY_KEY_ID").expect("RAZORPAY_KEY_ID must be set"),
                key_secret: env::var("RAZORPAY_KEY_SECRET")
                    .expect("RAZORPAY_KEY_SECRET must be set"),
                gateway_url: env::var("PAYMENT_GATEWAY_URL")
                    .unwrap_or_else(|_| "https://api.razorpay.com".to_string()),
                currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "INR".to_string()),
                stale_order_minutes: env::var("STALE_ORDER_MINUTES")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("STALE_ORDER_MINUTES must be a valid number"),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: env::var("CIRCUIT_BREAKER_FAILURE_THRESHOLD")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_FAILURE_THRESHOLD must be a valid number"),
                timeout_seconds: env::var("CIRCUIT_BREAKER_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_TIMEOUT_SECONDS must be a valid number"),
            },
            reservation: ReservationConfig {
                lock_timeout_ms: env::var("SEAT_LOCK_TIMEOUT_MS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()
                    .expect("SEAT_LOCK_TIMEOUT_MS must be a valid number"),
            },
            chat: ChatConfig {
                gemini_api_key: env::var("GEMINI_API_KEY").ok(),
                gemini_url: env::var("GEMINI_URL").unwrap_or_else(|_| {
                    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
                        .to_string()
                }),
            },
        }
    }
}

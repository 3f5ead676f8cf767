use axum::{routing::get, Router};
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use easybook::{config::Config, controllers, services::cleanup::CleanupService, AppState};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting EasyBook API");

    let port = config.app.port;
    let stale_order_minutes = config.payment.stale_order_minutes;
    let state = AppState::new(config).await?;
    info!("Database and Redis connected");

    // --- Background tasks ---

    // Report payment orders stuck in CREATED every 5 minutes
    let cleanup = CleanupService::new(state.db.clone(), stale_order_minutes);
    task::spawn(async move {
        loop {
            cleanup.report_stale_orders().await;
            tokio::time::sleep(Duration::from_secs(300)).await;
        }
    });

    // --- Web server ---

    let app = Router::new()
        .route("/", get(|| async { "EasyBook API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state.clone())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

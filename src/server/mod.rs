pub mod api;

use crate::constants::CACHE_CONTROL_VALUE;
use crate::services::RefreshScheduler;
use axum::http::{header::CACHE_CONTROL, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<RefreshScheduler>,
    pub started_at: Instant,
}

/// Initialize the tracing subscriber. Called once at command startup,
/// before anything (worker included) starts logging.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("Shutdown signal received, draining connections");
}

/// Start the axum server
pub async fn serve(
    scheduler: Arc<RefreshScheduler>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting akaryakit server");

    let app_state = AppState {
        scheduler,
        started_at: Instant::now(),
    };

    // Public read-only API, any origin may call it
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    // Advertise the stale-while-revalidate contract to intermediary caches
    let cache_policy = SetResponseHeaderLayer::overriding(
        CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL_VALUE),
    );

    tracing::info!("Registering routes:");
    tracing::info!("  GET /health");
    tracing::info!("  GET /prices?city=ISTANBUL&brand=OPET");
    tracing::info!("  GET|POST /update");

    let app = Router::new()
        .route("/health", get(api::health_handler))
        .route("/prices", get(api::prices_handler))
        .route("/update", get(api::update_handler).post(api::update_handler))
        .fallback(api::prices_handler)
        .layer(cache_policy)
        .layer(cors)
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

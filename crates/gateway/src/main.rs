//! Homescout API Gateway
//!
//! The public read surface over the listing corpus. Handles:
//! - Paginated, filtered, sorted property search
//! - Facet metadata for UI filters
//! - Response caching
//! - Per-IP rate limiting
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{routing::get, Router};
use homescout_common::{
    cache::Cache,
    config::AppConfig,
    db::DbPool,
    metrics,
    search::SearchStore,
    VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn, Level};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub search: SearchStore,
    /// Best-effort response cache; `None` when Redis was unreachable at
    /// startup, in which case every request goes straight to the search
    /// store
    pub cache: Option<Arc<Cache>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting Homescout API Gateway v{}", VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    // Initialize search store
    let search = SearchStore::new(&config.search)?;
    search.ensure_index().await.map_err(|e| {
        tracing::error!(error = %e, "Search store unavailable at startup");
        e
    })?;

    // The cache and the rate limiter are best-effort subsystems: Redis being
    // down degrades them, it does not keep the gateway from serving
    let cache = match Cache::new(&config.cache).await {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            warn!(error = %e, "Response cache unavailable, serving uncached");
            None
        }
    };

    let limiter =
        middleware::rate_limit::RateLimiter::connect(&config.cache.url, &config.rate_limit).await;

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        search,
        cache,
    };

    // Build the router
    let app = create_router(state, limiter);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState, limiter: middleware::rate_limit::RateLimiter) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Property search
        .route("/properties", get(handlers::properties::search_properties))
        .route(
            "/properties/filters/metadata",
            get(handlers::metadata::filters_metadata),
        )

        // The rate limit applies to every request
        .layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

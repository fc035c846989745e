//! Control API: Axum web server for monitoring and steering the bot.
//!
//! JSON only. CORS enabled for local development.

pub mod routes;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::{ApiState, AppState, BotStatus};

/// Start the API server.
///
/// This spawns a background task and doesn't block. Bind or serve
/// failures are logged; the trading loop keeps running without the API.
pub fn spawn_api(state: AppState, port: u16) {
    let app = build_router(state);

    tokio::spawn(async move {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        info!(port, "Control API starting on http://localhost:{port}");

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(port, error = %e, "Failed to bind API port");
                return;
            }
        };

        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server error");
        }
    });
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/status", get(routes::get_status))
        .route("/api/trades", get(routes::get_trades))
        .route("/api/metrics", get(routes::get_metrics))
        .route("/api/daily", get(routes::get_daily))
        .route("/api/market", get(routes::get_market))
        .route("/api/probability/:trade_type", get(routes::get_probability))
        .route("/api/strategy", post(routes::set_strategy))
        .route("/api/risk", post(routes::set_risk_tolerance))
        .route("/api/pause", post(routes::pause))
        .route("/api/resume", post(routes::resume))
        .route("/api/stake", post(routes::compute_stake))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

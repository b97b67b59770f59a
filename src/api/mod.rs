//! REST API exposing the runtime entry points
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **SchedulerRegistry** behind every mutating handler
//! - **X-Owner-Id** header scopes every target route to one owner
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/stats` - Scheduler, limiter and notifier counters
//! - `PUT /api/v1/owner` - Register the owner's chat
//! - `GET /api/v1/targets` - List the owner's targets
//! - `POST /api/v1/targets` - Add and schedule a target
//! - `DELETE /api/v1/targets/:id` - Remove a target and its history
//! - `PUT /api/v1/targets/:id/interval` - Change the check interval
//! - `POST /api/v1/targets/:id/pause` / `resume`
//! - `GET /api/v1/targets/:id/history` - Recent outcomes

pub mod error;
pub mod extract;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::Router;
use axum::routing::{delete, get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Enable CORS for browser clients
    pub enable_cors: bool,
}

impl ApiConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            enable_cors: true,
        }
    }
}

/// All routes with their state attached
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route("/api/v1/owner", put(routes::owners::register_owner))
        .route(
            "/api/v1/targets",
            get(routes::targets::list_targets).post(routes::targets::add_target),
        )
        .route("/api/v1/targets/:id", delete(routes::targets::remove_target))
        .route(
            "/api/v1/targets/:id/interval",
            put(routes::targets::set_interval),
        )
        .route("/api/v1/targets/:id/pause", post(routes::targets::pause_target))
        .route(
            "/api/v1/targets/:id/resume",
            post(routes::targets::resume_target),
        )
        .route(
            "/api/v1/targets/:id/history",
            get(routes::targets::get_history),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let mut app = router(state);

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}

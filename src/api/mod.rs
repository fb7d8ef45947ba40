//! REST API of the fleet hub
//!
//! Thin axum adapter over [`FleetCoordinator`](crate::fleet::FleetCoordinator)
//! and the sweeper actor. Every handler reads the shared policy switch once
//! and passes the resulting policy down explicitly.
//!
//! ## Endpoints
//!
//! - `GET    /api/v1/health`
//! - `GET    /api/v1/stats`
//! - `GET    /api/v1/collectors`, `POST /api/v1/collectors`
//! - `GET    /api/v1/collectors/:name`, `DELETE /api/v1/collectors/:name`
//! - `POST   /api/v1/collectors/:name/{heartbeat,stop,pause,resume}`
//! - `GET    /api/v1/generators`, `POST /api/v1/generators`
//! - `GET    /api/v1/generators/:name`, `PATCH /api/v1/generators/:name`
//! - `POST   /api/v1/sweep`
//! - `GET    /api/v1/assignment`, `POST /api/v1/assignment`

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
pub mod types;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;

use std::net::{Ipv4Addr, SocketAddr};

#[cfg(feature = "api")]
use axum::{
    Router,
    routing::{get, post},
};
use serde::Deserialize;
#[cfg(feature = "api")]
use tracing::info;

/// API server configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Enable permissive CORS for browser dashboards
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            enable_cors: true,
        }
    }
}

/// All `/api/v1` routes, without transport layers
#[cfg(feature = "api")]
pub fn router(state: ApiState) -> Router {
    use routes::{collectors, generators, health, sweep};

    Router::new()
        .route("/api/v1/health", get(health::health_check))
        .route("/api/v1/stats", get(sweep::get_stats))
        .route(
            "/api/v1/collectors",
            get(collectors::list_collectors).post(collectors::register_collector),
        )
        .route(
            "/api/v1/collectors/:name",
            get(collectors::get_collector).delete(collectors::delete_collector),
        )
        .route(
            "/api/v1/collectors/:name/heartbeat",
            post(collectors::heartbeat),
        )
        .route("/api/v1/collectors/:name/stop", post(collectors::stop_collector))
        .route("/api/v1/collectors/:name/pause", post(collectors::pause_collector))
        .route(
            "/api/v1/collectors/:name/resume",
            post(collectors::resume_collector),
        )
        .route(
            "/api/v1/generators",
            get(generators::list_generators).post(generators::create_generator),
        )
        .route(
            "/api/v1/generators/:name",
            get(generators::get_generator).patch(generators::update_generator),
        )
        .route("/api/v1/sweep", post(sweep::sweep_now))
        .route(
            "/api/v1/assignment",
            get(sweep::get_assignment).post(sweep::set_assignment),
        )
        .with_state(state)
}

/// Spawn the API server in a background task
///
/// Returns the bound address (useful with port 0).
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    use anyhow::Context;
    use tower::ServiceBuilder;
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    info!("starting API server on {}", config.bind_addr);

    let mut app = router(state);

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let app = app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    let addr = listener.local_addr()?;

    info!("API server listening on {addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {e}");
        }
    });

    Ok(addr)
}

//! Health check endpoint

use axum::{Json, extract::State};
use tracing::warn;

use crate::api::{state::ApiState, types::HealthResponse};

/// GET /api/v1/health
///
/// The hub is up if it can answer; the store status is reported alongside.
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let storage_healthy = match state.coordinator.store().health_check().await {
        Ok(health) => health.healthy,
        Err(e) => {
            warn!("store health check failed: {e}");
            false
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        storage_healthy,
    })
}

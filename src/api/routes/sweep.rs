//! Sweep, assignment policy and statistics endpoints

use axum::{Json, extract::State};

use crate::{
    api::{
        error::ApiResult,
        state::ApiState,
        types::{AssignmentRequest, AssignmentResponse, StatsResponse},
    },
    fleet::SweepReport,
};

/// POST /api/v1/sweep
///
/// Runs a sweep through the sweeper actor, so it never overlaps a periodic one.
pub async fn sweep_now(State(state): State<ApiState>) -> ApiResult<Json<SweepReport>> {
    Ok(Json(state.sweeper.sweep_now().await?))
}

/// GET /api/v1/assignment
pub async fn get_assignment(State(state): State<ApiState>) -> Json<AssignmentResponse> {
    Json(AssignmentResponse {
        load_balancing: state.policy.is_load_balancing(),
    })
}

/// POST /api/v1/assignment
pub async fn set_assignment(
    State(state): State<ApiState>,
    Json(request): Json<AssignmentRequest>,
) -> ApiResult<Json<AssignmentResponse>> {
    state.sweeper.set_load_balancing(request.load_balancing).await?;
    // the reply only goes out once the sweeper has applied the switch
    state.sweeper.get_stats().await?;

    Ok(Json(AssignmentResponse {
        load_balancing: state.policy.is_load_balancing(),
    }))
}

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<ApiState>) -> ApiResult<Json<StatsResponse>> {
    let sweeper = state.sweeper.get_stats().await?;
    let storage = state.coordinator.store().get_stats().await?;

    Ok(Json(StatsResponse {
        fleet: state.coordinator.summary().await,
        sweeper,
        storage,
        load_balancing: state.policy.is_load_balancing(),
    }))
}

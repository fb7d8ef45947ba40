//! Collector endpoints: registration, heartbeats and status transitions

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::debug;

use crate::{
    Collector, util,
    api::{
        error::ApiResult,
        state::ApiState,
        types::{
            CollectorInfo, CollectorsResponse, HeartbeatRequest, HeartbeatResponse,
            RegisterRequest, TransitionResponse,
        },
    },
    config::HeartbeatConfig,
};

fn describe(collector: Collector, heartbeat: &HeartbeatConfig, now: i64) -> CollectorInfo {
    CollectorInfo {
        alive: collector.is_running() && heartbeat.is_alive(collector.last_heartbeat, now),
        last_heartbeat_at: collector.last_heartbeat.and_then(util::millis_to_rfc3339),
        collector,
    }
}

/// GET /api/v1/collectors
pub async fn list_collectors(State(state): State<ApiState>) -> Json<CollectorsResponse> {
    let now = util::now_millis();
    let heartbeat = state.coordinator.heartbeat_config();

    let collectors: Vec<CollectorInfo> = state
        .coordinator
        .list_collectors()
        .await
        .into_iter()
        .map(|c| describe(c, &heartbeat, now))
        .collect();

    Json(CollectorsResponse {
        count: collectors.len(),
        collectors,
    })
}

/// POST /api/v1/collectors
pub async fn register_collector(
    State(state): State<ApiState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Collector>)> {
    let collector = state
        .coordinator
        .register_collector(&request.name, &request.version, util::now_millis())
        .await?;

    Ok((StatusCode::CREATED, Json(collector)))
}

/// GET /api/v1/collectors/:name
pub async fn get_collector(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<CollectorInfo>> {
    let collector = state.coordinator.get_collector(&name).await?;
    let heartbeat = state.coordinator.heartbeat_config();

    Ok(Json(describe(collector, &heartbeat, util::now_millis())))
}

/// POST /api/v1/collectors/:name/heartbeat
///
/// A timestamp ahead of the hub clock is clamped to the hub clock, so a
/// collector with a fast clock cannot keep itself alive.
pub async fn heartbeat(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    request: Option<Json<HeartbeatRequest>>,
) -> ApiResult<Json<HeartbeatResponse>> {
    let now = util::now_millis();
    let timestamp = request
        .and_then(|Json(r)| r.timestamp)
        .map_or(now, |ts| ts.min(now));

    debug!("heartbeat from {name}");
    let ack = state.coordinator.record_heartbeat(&name, timestamp).await?;

    Ok(Json(HeartbeatResponse {
        collector: ack.collector,
        generators: ack.generators,
    }))
}

/// POST /api/v1/collectors/:name/stop
pub async fn stop_collector(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<TransitionResponse>> {
    let report = state
        .coordinator
        .stop_collector(&name, util::now_millis(), state.policy.current())
        .await?;
    let collector = state.coordinator.get_collector(&name).await.ok();

    Ok(Json(TransitionResponse::new(collector, report)))
}

/// POST /api/v1/collectors/:name/pause
pub async fn pause_collector(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<TransitionResponse>> {
    let report = state
        .coordinator
        .pause_collector(&name, util::now_millis(), state.policy.current())
        .await?;
    let collector = state.coordinator.get_collector(&name).await.ok();

    Ok(Json(TransitionResponse::new(collector, report)))
}

/// POST /api/v1/collectors/:name/resume
pub async fn resume_collector(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Collector>> {
    let collector = state
        .coordinator
        .resume_collector(&name, util::now_millis())
        .await?;

    Ok(Json(collector))
}

/// DELETE /api/v1/collectors/:name
pub async fn delete_collector(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<TransitionResponse>> {
    let report = state
        .coordinator
        .delete_collector(&name, util::now_millis(), state.policy.current())
        .await?;

    Ok(Json(TransitionResponse::new(None, report)))
}

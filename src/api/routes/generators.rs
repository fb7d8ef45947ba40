//! Generator endpoints
//!
//! Create and update are the post-commit triggers of the coordinator: the
//! response carries the generator with its resulting assignment.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    Generator, GeneratorPatch, GeneratorSpec, util,
    api::{error::ApiResult, state::ApiState, types::GeneratorsResponse},
};

/// GET /api/v1/generators
pub async fn list_generators(State(state): State<ApiState>) -> Json<GeneratorsResponse> {
    let generators = state.coordinator.list_generators().await;

    Json(GeneratorsResponse {
        count: generators.len(),
        generators,
    })
}

/// POST /api/v1/generators
pub async fn create_generator(
    State(state): State<ApiState>,
    Json(spec): Json<GeneratorSpec>,
) -> ApiResult<(StatusCode, Json<Generator>)> {
    let generator = state
        .coordinator
        .create_generator(spec, util::now_millis(), state.policy.current())
        .await?;

    Ok((StatusCode::CREATED, Json(generator)))
}

/// GET /api/v1/generators/:name
pub async fn get_generator(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Generator>> {
    Ok(Json(state.coordinator.get_generator(&name).await?))
}

/// PATCH /api/v1/generators/:name
pub async fn update_generator(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(patch): Json<GeneratorPatch>,
) -> ApiResult<Json<Generator>> {
    let generator = state
        .coordinator
        .update_generator(&name, patch, util::now_millis(), state.policy.current())
        .await?;

    Ok(Json(generator))
}

//! Pipeline trigger endpoints
//!
//! Thin wrappers over the producer. The CRUD layer that creates
//! submissions and rubric records lives elsewhere; these routes only start
//! generation for rows that already exist (the rubric trigger upserts its
//! row from the request, standing in for the external create).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use viva_common::message::RubricRequest;

use crate::db;
use crate::{ApiResult, AppState};

/// POST /submissions/:id/viva
///
/// Enqueue viva question generation for a submission. 202 on enqueue,
/// 404 unknown id, 422 no extracted text, 409 already in progress.
pub async fn submit_viva(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.producer.submit_submission(&id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /rubrics/generate
///
/// Enqueue rubric generation from assessment criteria. The rubric row is
/// created if absent; an in-flight generation for the same id yields 409.
pub async fn submit_rubric(
    State(state): State<AppState>,
    Json(request): Json<RubricRequest>,
) -> ApiResult<StatusCode> {
    let rubric = db::rubrics::Rubric::new(request.id.clone(), request.title.clone());
    db::rubrics::save_rubric(&state.db, &rubric).await?;

    state.producer.submit_rubric(request).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Build pipeline trigger routes
pub fn pipeline_routes() -> Router<AppState> {
    Router::new()
        .route("/submissions/:id/viva", post(submit_viva))
        .route("/rubrics/generate", post(submit_rubric))
}

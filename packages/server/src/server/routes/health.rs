use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::kernel::jobs::QueueStatus;
use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    queue: QueueStatus,
}

/// Health check endpoint
///
/// The scheduler lives in-process, so reporting its occupancy is the whole
/// check; if the process answers, it can take jobs.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            queue: state.scheduler.status(),
        }),
    )
}

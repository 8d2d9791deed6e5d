//! Job lifecycle endpoints: submission, stop, queue, history, and result
//! file downloads.

use axum::{
    extract::{Extension, Path},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::kernel::admission::QuotaError;
use crate::kernel::jobs::{Job, JobParams, JobStatus};
use crate::kernel::scheduler::SubmitError;
use crate::server::app::AppState;

const USER_ID_HEADER: &str = "x-user-id";

pub fn user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn error_body(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(json!({ "error": message.into() }))
}

/// POST /api/jobs
///
/// Validates the location against the countries API when one is configured,
/// checks the plan quota, and hands the job to the scheduler. Returns 202
/// with the job id; the caller follows progress over SSE.
pub async fn submit_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(params): Json<JobParams>,
) -> impl IntoResponse {
    let Some(user) = user_id(&headers) else {
        return (
            StatusCode::BAD_REQUEST,
            error_body("missing X-User-Id header"),
        )
            .into_response();
    };

    if let Some(countries) = &state.countries {
        // Upstream metadata failures must not block submissions; an unknown
        // country does.
        match countries.has_country(&params.country).await {
            Ok(false) => {
                return (
                    StatusCode::BAD_REQUEST,
                    error_body(format!("unknown country: {}", params.country)),
                )
                    .into_response();
            }
            Ok(true) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Country validation unavailable, accepting submission");
            }
        }

        if !params.states.is_empty() {
            match countries.states(&params.country).await {
                Ok(known) => {
                    if let Some(unknown) = params.states.iter().find(|s| !known.contains(s)) {
                        return (
                            StatusCode::BAD_REQUEST,
                            error_body(format!(
                                "unknown state for {}: {unknown}",
                                params.country
                            )),
                        )
                            .into_response();
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "State validation unavailable, accepting submission");
                }
            }
        }
    }

    if let Err(e) = state.quota.authorize(&user, &params).await {
        let status = match e {
            QuotaError::PlanDenied(_) | QuotaError::Exhausted(_) => StatusCode::FORBIDDEN,
        };
        return (status, error_body(e.to_string())).into_response();
    }

    match state.scheduler.submit(&user, params).await {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(json!({ "jobId": job.id, "status": job.status })),
        )
            .into_response(),
        Err(SubmitError::AlreadyActive) => (
            StatusCode::TOO_MANY_REQUESTS,
            error_body("user already has an active job"),
        )
            .into_response(),
        Err(SubmitError::InvalidParams(msg)) => {
            (StatusCode::BAD_REQUEST, error_body(msg)).into_response()
        }
    }
}

/// POST /api/jobs/:id/stop
pub async fn stop_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if state.scheduler.stop(id).await {
        (StatusCode::OK, Json(json!({ "stopping": true }))).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            error_body("no stoppable job with that id"),
        )
            .into_response()
    }
}

/// GET /api/jobs/:id/files/:name
///
/// Serves a result file, but only one the job itself reported producing.
pub async fn job_file_handler(
    Extension(state): Extension<AppState>,
    Path((id, name)): Path<(Uuid, String)>,
) -> impl IntoResponse {
    let Some(path) = state.scheduler.job_file_path(id, &name) else {
        return (
            StatusCode::NOT_FOUND,
            error_body("file not found for this job"),
        )
            .into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = match path.extension().and_then(|e| e.to_str()) {
                Some("json") => "application/json",
                Some("csv") => "text/csv",
                _ => "text/plain; charset=utf-8",
            };
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{name}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (
            StatusCode::NOT_FOUND,
            error_body("file not found for this job"),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Failed to read result file");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("failed to read result file"),
            )
                .into_response()
        }
    }
}

/// GET /api/queue
pub async fn queue_handler(Extension(state): Extension<AppState>) -> impl IntoResponse {
    Json(state.scheduler.status())
}

/// Job listing entry without the full event log.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: Uuid,
    pub status: JobStatus,
    pub params: JobParams,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub files: Vec<String>,
}

impl From<Job> for JobSummary {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            status: job.status,
            params: job.params,
            created_at: job.created_at,
            finished_at: job.finished_at,
            error: job.error,
            files: job.files,
        }
    }
}

/// GET /api/history
///
/// The calling user's jobs, newest first.
pub async fn history_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(user) = user_id(&headers) else {
        return (
            StatusCode::BAD_REQUEST,
            error_body("missing X-User-Id header"),
        )
            .into_response();
    };

    let jobs: Vec<JobSummary> = state
        .scheduler
        .user_history(&user)
        .into_iter()
        .map(JobSummary::from)
        .collect();
    Json(jobs).into_response()
}

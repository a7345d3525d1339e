//! Generation endpoints: submit, poll, fetch result, cancel.

use crate::engine::ProgressSnapshot;
use crate::jobs::{GenerationRequest, JobResult, JobState};
use crate::state::AppState;
use crate::web::error::{ApiError, ApiErrorCode};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_rs::TS;

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GenerateBody {
    pub course_id: Option<i64>,
    #[serde(default)]
    pub all: bool,
    pub label: Option<String>,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GenerateAccepted {
    pub job_id: String,
    pub status_url: String,
    pub redirect_url: String,
    pub label: String,
}

/// `POST /api/generate`
///
/// Accepts the job and returns 202 immediately; the generation runs on the
/// background worker.
pub(super) async fn submit(
    State(state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> Result<(StatusCode, Json<GenerateAccepted>), ApiError> {
    if body.course_id.is_none() && !body.all {
        return Err(ApiError::new(
            ApiErrorCode::InvalidRequest,
            "request must name a courseId or set all=true",
        ));
    }

    let label = body.label.unwrap_or_else(|| match body.course_id {
        Some(id) => format!("course {id}"),
        None => "all courses".to_owned(),
    });
    let request = GenerationRequest {
        course_id: body.course_id,
        all: body.all,
    };
    let job_id = state
        .jobs
        .submit(request, label.clone())
        .map_err(|e| ApiError::new(ApiErrorCode::Conflict, format!("{e:#}")))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateAccepted {
            status_url: format!("/api/generate/{job_id}/status"),
            redirect_url: format!("/generate/{job_id}"),
            job_id,
            label,
        }),
    ))
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub job_state: JobState,
    pub label: String,
    #[serde(flatten)]
    pub progress: ProgressSnapshot,
}

/// `GET /api/generate/{job_id}/status`
pub(super) async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let view = state
        .jobs
        .registry()
        .view(&job_id)
        .ok_or_else(|| ApiError::new(ApiErrorCode::NotFound, "unknown job id"))?;
    debug!(job_id = %job_id, state = ?view.state, "job status polled");
    Ok(Json(JobStatusResponse {
        job_id: view.id,
        job_state: view.state,
        label: view.label,
        progress: (*view.progress).clone(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResultResponse {
    pub job_id: String,
    pub job_state: JobState,
    #[serde(flatten)]
    pub result: JobResult,
}

/// `GET /api/generate/{job_id}/result`
///
/// Available once the job reaches a terminal state; 409 while it is still
/// queued or running.
pub(super) async fn job_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResultResponse>, ApiError> {
    let view = state
        .jobs
        .registry()
        .view(&job_id)
        .ok_or_else(|| ApiError::new(ApiErrorCode::NotFound, "unknown job id"))?;

    match (view.state, view.result) {
        (JobState::Success, Some(result)) => Ok(Json(JobResultResponse {
            job_id: view.id,
            job_state: view.state,
            result: (*result).clone(),
        })),
        (JobState::Failed | JobState::Cancelled, _) => Err(ApiError::new(
            ApiErrorCode::Conflict,
            view.error.unwrap_or_else(|| "generation did not finish".to_owned()),
        )),
        _ => Err(ApiError::new(
            ApiErrorCode::Conflict,
            "generation is still running",
        )),
    }
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CancelResponse {
    pub job_id: String,
    pub cancelling: bool,
}

/// `POST /api/generate/{job_id}/cancel`
///
/// Flips the job's cancel flag; the planner stops at its next suspension
/// point and the job transitions to `cancelled`.
pub(super) async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<(StatusCode, Json<CancelResponse>), ApiError> {
    if state.jobs.registry().view(&job_id).is_none() {
        return Err(ApiError::new(ApiErrorCode::NotFound, "unknown job id"));
    }
    let cancelling = state.jobs.registry().request_cancel(&job_id);
    if !cancelling {
        return Err(ApiError::new(
            ApiErrorCode::Conflict,
            "job already finished",
        ));
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(CancelResponse { job_id, cancelling }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListEntry {
    pub job_id: String,
    pub label: String,
    pub job_state: JobState,
    pub percent: f32,
    pub submitted_at: String,
}

/// `GET /api/generate/jobs`, most recent first.
pub(super) async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobListEntry>> {
    let entries = state
        .jobs
        .registry()
        .list()
        .into_iter()
        .map(|view| JobListEntry {
            job_id: view.id,
            label: view.label,
            job_state: view.state,
            percent: view.progress.percent,
            submitted_at: view.submitted_at.to_rfc3339(),
        })
        .collect();
    Json(entries)
}

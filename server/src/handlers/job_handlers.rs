use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use job_engine::error::JobError;
use job_engine::{JobId, JobResult, Submission};
use serde::Serialize;
use serde_json::json;

use crate::error::AppResult;
use crate::handlers::form::SubmissionForm;
use crate::state::{AppState, JobStatus};

/// Form field carrying an optional client-chosen job id.
pub const JOB_ID_FIELD: &str = "jobId";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub success: bool,
    pub message: &'static str,
    pub job_id: String,
}

/// POST /api/submit-form
///
/// Starts the worker and answers 202 with the job id right away, so the
/// client can open its progress stream before events start flowing.
pub async fn submit_form(
    State(state): State<AppState>,
    SubmissionForm(mut fields): SubmissionForm,
) -> AppResult<impl IntoResponse> {
    let requested = fields.remove(JOB_ID_FIELD);

    // An uncollected result keeps its id taken until it is fetched or pruned.
    if let Some(raw) = requested.as_deref().map(str::trim) {
        if state.jobs.contains_key(raw) {
            return Err(JobError::DuplicateJob(JobId::parse(raw)?).into());
        }
    }

    let submitted = state
        .orchestrator
        .submit(Submission {
            job_id: requested,
            fields,
        })
        .await?;

    let job_id = submitted.job_id.clone();
    state.jobs.insert(job_id.clone(), JobStatus::Pending);

    // Record the result once the job is finalized.
    let jobs = state.jobs.clone();
    let pending_id = job_id.clone();
    tokio::spawn(async move {
        let result = submitted.result.await.unwrap_or_else(|_| JobResult::Failed {
            job_id: pending_id.clone(),
            message: "Automation failed".to_string(),
        });
        jobs.insert(
            pending_id,
            JobStatus::Finished {
                result,
                finished_at: Utc::now(),
            },
        );
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            success: true,
            message: "Processing started",
            job_id: job_id.to_string(),
        }),
    ))
}

/// GET /api/jobs/{jobId}
///
/// Pending jobs answer 202. A finished result is handed out once and then
/// forgotten.
pub async fn poll_job(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let finished = state
        .jobs
        .remove_if(id.as_str(), |_, status| matches!(status, JobStatus::Finished { .. }));

    match finished {
        Some((_, JobStatus::Finished { result, .. })) => result_response(result),
        _ if state.jobs.contains_key(id.as_str()) => (
            StatusCode::ACCEPTED,
            Json(json!({ "success": true, "status": "pending", "jobId": id })),
        )
            .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Job not found", "jobId": id })),
        )
            .into_response(),
    }
}

fn result_response(result: JobResult) -> Response {
    match result {
        JobResult::Succeeded {
            job_id,
            artifact_data,
        } => (
            StatusCode::OK,
            Json(json!({ "success": true, "artifactData": artifact_data, "jobId": job_id })),
        )
            .into_response(),
        JobResult::Failed { job_id, message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": message, "jobId": job_id })),
        )
            .into_response(),
    }
}

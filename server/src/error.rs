use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use job_engine::error::JobError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Every variant renders as `{ "success": false, "message": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Job(JobError::InvalidJobId(_)) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Job(JobError::DuplicateJob(_)) => (StatusCode::CONFLICT, self.to_string()),
            AppError::Job(err) => {
                tracing::error!(error = %err, "Submission failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::health_handlers::health;
use crate::handlers::job_handlers::{poll_job, submit_form};
use crate::state::AppState;

pub fn job_routes(state: AppState) -> Router {
    Router::new()
        .route("/submit-form", post(submit_form))
        .route("/jobs/{jobId}", get(poll_job))
        .with_state(state)
}

pub fn health_routes(state: AppState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

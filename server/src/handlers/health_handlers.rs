use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "activeJobs": state.orchestrator.active_jobs(),
        "connections": state.registry().connection_count(),
    }))
}

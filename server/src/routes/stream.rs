use axum::{routing::get, Router};

use crate::handlers::stream_handlers::stream_progress;
use crate::state::AppState;

// Clients connect with `?id=<jobId>`, either on `/ws` or on the root path.
pub fn stream_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(stream_progress))
        .route("/ws", get(stream_progress))
        .with_state(state)
}

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use job_engine::{ConnectionRegistry, JobId};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::state::{AppState, JobStatus};

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub id: Option<String>,
}

/// GET /ws?id=<jobId>
///
/// Upgrades to a WebSocket that receives `{status, progress}` frames for the
/// given job until the job finishes or either side closes.
pub async fn stream_progress(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let raw = params
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing job id".to_string()))?;
    let job_id = JobId::parse(raw.trim())?;

    // Unknown ids stay open: clients connect before they submit.
    let already_finished = state
        .jobs
        .get(job_id.as_str())
        .is_some_and(|entry| matches!(*entry, JobStatus::Finished { .. }));
    if already_finished {
        tracing::debug!(job_id = %job_id, "Job already finished, closing stream");
        return Ok(ws.on_upgrade(close_finished));
    }

    let registry = Arc::clone(state.registry());
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, job_id, registry)))
}

async fn close_finished(mut socket: WebSocket) {
    let _ = socket.send(Message::Close(None)).await;
}

/// Register the socket under `job_id`, forward events until the registry
/// drops the channel or the client goes away, then release the entry.
async fn handle_socket(socket: WebSocket, job_id: JobId, registry: Arc<ConnectionRegistry>) {
    tracing::info!(job_id = %job_id, "WebSocket client connected");

    let mut rx = registry.register(job_id.clone());
    let (mut sink, mut stream) = socket.split();

    let sender_id = job_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(job_id = %sender_id, error = %e, "Failed to encode progress event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                tracing::debug!(job_id = %sender_id, "WebSocket sink closed");
                return;
            }
        }
        // Job finalized: no more events for this id.
        let _ = sink.send(Message::Close(None)).await;
    });

    let recv_id = job_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(job_id = %recv_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    let job_finished = tokio::select! {
        _ = &mut send_task => true,
        _ = &mut recv_task => false,
    };
    if job_finished {
        recv_task.abort();
    } else {
        send_task.abort();
        let _ = send_task.await;
    }

    registry.release(job_id.as_str());
    tracing::info!(job_id = %job_id, "WebSocket client disconnected");
}

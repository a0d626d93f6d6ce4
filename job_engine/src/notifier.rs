use std::sync::Arc;

use crate::registry::ConnectionRegistry;
use crate::{JobId, ProgressEvent, ProgressStatus};

/// Best-effort push of progress events to whichever client registered a job.
#[derive(Debug, Clone)]
pub struct ProgressNotifier {
    registry: Arc<ConnectionRegistry>,
}

impl ProgressNotifier {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Send `{status, progress}` to the job's connection if one is open.
    ///
    /// Returns whether the event was handed to a connection. A miss is not an
    /// error: the final job result is delivered independently of this stream.
    pub fn notify(&self, job_id: &JobId, status: ProgressStatus, progress: u8) -> bool {
        let event = ProgressEvent::new(status, progress);
        let delivered = self
            .registry
            .lookup(job_id.as_str())
            .is_some_and(|tx| tx.send(event).is_ok());

        if delivered {
            tracing::debug!(job_id = %job_id, %status, progress = event.progress, "Progress update sent");
        } else {
            tracing::trace!(job_id = %job_id, %status, "No open connection, progress update dropped");
        }
        delivered
    }
}

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::{JobId, ProgressEvent};

/// Sender half kept in the registry for a connected client.
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
/// Receiver half handed to the network layer, which forwards to the socket.
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Maps job ids to the live channel of the client watching that job.
///
/// At most one entry per id. An entry whose receiver has been dropped counts
/// as absent and is removed on the next lookup.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<JobId, ProgressSender>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `job_id`, replacing any previous one.
    ///
    /// Returns the receiver the caller should forward to its socket.
    pub fn register(&self, job_id: JobId) -> ProgressReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.connections.insert(job_id.clone(), tx).is_some() {
            tracing::debug!(job_id = %job_id, "Replaced existing connection");
        }
        rx
    }

    /// Remove the entry for `job_id`. Returns whether one was present.
    pub fn unregister(&self, job_id: &str) -> bool {
        self.connections.remove(job_id).is_some()
    }

    /// Remove the entry for `job_id` only if its channel is already closed.
    ///
    /// A disconnecting socket calls this so it never drops a newer
    /// connection registered under the same id.
    pub fn release(&self, job_id: &str) -> bool {
        self.connections
            .remove_if(job_id, |_, tx| tx.is_closed())
            .is_some()
    }

    pub fn lookup(&self, job_id: &str) -> Option<ProgressSender> {
        let sender = self.connections.get(job_id).map(|e| e.value().clone())?;
        if sender.is_closed() {
            self.release(job_id);
            return None;
        }
        Some(sender)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

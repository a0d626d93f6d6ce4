use std::path::PathBuf;
use std::time::Duration;

use crate::JobId;

/// Errors raised while accepting a submission.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid job id: {0:?}")]
    InvalidJobId(String),

    #[error("Job {0} is already running")]
    DuplicateJob(JobId),

    #[error("Failed to prepare artifact directory {}: {source}", .path.display())]
    ArtifactDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a worker run ended without producing an artifact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerFailure {
    #[error("failed to start worker: {0}")]
    Start(String),

    #[error("worker exited with code {code:?}")]
    Exit { code: Option<i32> },

    #[error("worker did not finish within {after:?}")]
    TimedOut { after: Duration },

    #[error("failed to wait for worker: {0}")]
    Wait(String),
}

impl WorkerFailure {
    /// Message handed back to the submitting client.
    pub fn client_message(&self) -> &'static str {
        match self {
            WorkerFailure::Start(_) => "Failed to start automation",
            WorkerFailure::Exit { .. } => "Automation failed",
            WorkerFailure::TimedOut { .. } => "Automation timed out",
            WorkerFailure::Wait(_) => "Automation failed",
        }
    }
}

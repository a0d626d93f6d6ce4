pub mod error;
pub mod notifier;
pub mod orchestrator;
pub mod registry;
pub mod worker;

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::JobError;

pub use notifier::ProgressNotifier;
pub use orchestrator::{JobOrchestrator, JobResult, JobSettings, Submission, SubmittedJob};
pub use registry::ConnectionRegistry;
pub use worker::{JobOutcome, WorkerConfig, WorkerHandle, WorkerManager};

/// Longest client-supplied job id we accept. The id ends up in a file name.
pub const MAX_JOB_ID_LEN: usize = 64;

/// Opaque token tying a submission, its worker process and a streaming
/// connection together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Accept a client-supplied id. Only `[A-Za-z0-9_-]` is allowed.
    pub fn parse(raw: &str) -> Result<Self, JobError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_JOB_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(JobError::InvalidJobId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for JobId {
    type Error = JobError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Hands out millisecond timestamps as job ids, bumping past the previous
/// value so two ids from the same allocator never collide.
#[derive(Debug, Default)]
pub struct JobIdAllocator {
    last: AtomicI64,
}

impl JobIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> JobId {
        let now = Utc::now().timestamp_millis();
        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_else(|prev| prev);
        JobId(now.max(prev + 1).to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Starting,
    Processing,
    Error,
    Complete,
}

impl ProgressStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProgressStatus::Error | ProgressStatus::Complete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::Starting => "starting",
            ProgressStatus::Processing => "processing",
            ProgressStatus::Error => "error",
            ProgressStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `{status, progress}` update pushed to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    pub progress: u8,
}

impl ProgressEvent {
    pub fn new(status: ProgressStatus, progress: u8) -> Self {
        Self {
            status,
            progress: progress.min(100),
        }
    }
}

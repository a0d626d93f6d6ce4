//! Job orchestration: id allocation, worker launch, progress wiring and
//! finalization.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dashmap::DashSet;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::{JobError, WorkerFailure};
use crate::notifier::ProgressNotifier;
use crate::registry::ConnectionRegistry;
use crate::worker::{JobOutcome, WorkerHandle, WorkerManager};
use crate::{JobId, JobIdAllocator, ProgressStatus};

/// Default form fields forwarded to the worker, in argument order.
pub const DEFAULT_FIELDS: [&str; 8] = [
    "firstName",
    "middleName",
    "surname",
    "idNumber",
    "dateOfBirth",
    "districtOfBirth",
    "mobileNumber",
    "email",
];

/// Per-deployment job settings: where artifacts go and how the worker's
/// argument list is built.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub artifact_dir: PathBuf,
    pub artifact_prefix: String,
    pub artifact_extension: String,
    /// Field names passed as `--<name> <value>`, in this order.
    pub fields: Vec<String>,
    /// Flag carrying the job id, without the leading dashes.
    pub id_flag: String,
    /// Flag carrying the artifact path, without the leading dashes.
    pub output_flag: String,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            artifact_dir: std::env::temp_dir(),
            artifact_prefix: "artifact".into(),
            artifact_extension: "pdf".into(),
            fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
            id_flag: "requestId".into(),
            output_flag: "pdfPath".into(),
        }
    }
}

/// A request to run one job.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    /// Client-chosen id; a fresh one is allocated when absent or blank.
    pub job_id: Option<String>,
    pub fields: HashMap<String, String>,
}

/// Final result of a job, handed back exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobResult {
    Succeeded { job_id: JobId, artifact_data: String },
    Failed { job_id: JobId, message: String },
}

impl JobResult {
    pub fn job_id(&self) -> &JobId {
        match self {
            JobResult::Succeeded { job_id, .. } | JobResult::Failed { job_id, .. } => job_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Succeeded { .. })
    }
}

/// Returned by [`JobOrchestrator::submit`] as soon as the worker is launched.
#[derive(Debug)]
pub struct SubmittedJob {
    pub job_id: JobId,
    pub result: oneshot::Receiver<JobResult>,
}

#[derive(Debug, Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    registry: Arc<ConnectionRegistry>,
    notifier: ProgressNotifier,
    workers: WorkerManager,
    settings: JobSettings,
    ids: JobIdAllocator,
    active: DashSet<JobId>,
}

impl JobOrchestrator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        workers: WorkerManager,
        settings: JobSettings,
    ) -> Self {
        let notifier = ProgressNotifier::new(Arc::clone(&registry));
        Self {
            inner: Arc::new(Inner {
                registry,
                notifier,
                workers,
                settings,
                ids: JobIdAllocator::new(),
                active: DashSet::new(),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.inner.registry
    }

    pub fn settings(&self) -> &JobSettings {
        &self.inner.settings
    }

    /// Number of jobs whose worker has not been finalized yet.
    pub fn active_jobs(&self) -> usize {
        self.inner.active.len()
    }

    /// Start a job and return its id without waiting for it to finish.
    ///
    /// The job's result arrives on [`SubmittedJob::result`]. Progress is
    /// pushed to whichever connection is registered under the id.
    pub async fn submit(&self, submission: Submission) -> Result<SubmittedJob, JobError> {
        let job_id = self.reserve_id(submission.job_id.as_deref())?;
        let settings = &self.inner.settings;

        if let Err(source) = tokio::fs::create_dir_all(&settings.artifact_dir).await {
            self.inner.active.remove(&job_id);
            return Err(JobError::ArtifactDir {
                path: settings.artifact_dir.clone(),
                source,
            });
        }
        let artifact = self.artifact_path(&job_id);

        self.inner.notifier.notify(&job_id, ProgressStatus::Starting, 0);

        let args = self.worker_args(&job_id, &submission.fields, &artifact);
        let handle = self.inner.workers.run(&job_id, args, artifact.clone());

        let (result_tx, result_rx) = oneshot::channel();
        tokio::spawn(self.clone().finish(job_id.clone(), handle, artifact, result_tx));

        tracing::info!(job_id = %job_id, "Job submitted");
        Ok(SubmittedJob {
            job_id,
            result: result_rx,
        })
    }

    fn reserve_id(&self, requested: Option<&str>) -> Result<JobId, JobError> {
        match requested.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => {
                let job_id = JobId::parse(raw)?;
                if !self.inner.active.insert(job_id.clone()) {
                    return Err(JobError::DuplicateJob(job_id));
                }
                Ok(job_id)
            }
            None => loop {
                let job_id = self.inner.ids.next();
                if self.inner.active.insert(job_id.clone()) {
                    return Ok(job_id);
                }
            },
        }
    }

    fn artifact_path(&self, job_id: &JobId) -> PathBuf {
        let settings = &self.inner.settings;
        settings.artifact_dir.join(format!(
            "{}_{}.{}",
            settings.artifact_prefix, job_id, settings.artifact_extension
        ))
    }

    fn worker_args(
        &self,
        job_id: &JobId,
        fields: &HashMap<String, String>,
        artifact: &Path,
    ) -> Vec<String> {
        let settings = &self.inner.settings;
        let mut args = Vec::with_capacity(settings.fields.len() * 2 + 4);
        args.push(format!("--{}", settings.id_flag));
        args.push(job_id.to_string());
        for name in &settings.fields {
            args.push(format!("--{name}"));
            args.push(fields.get(name).cloned().unwrap_or_default());
        }
        args.push(format!("--{}", settings.output_flag));
        args.push(artifact.to_string_lossy().into_owned());
        args
    }

    async fn finish(
        self,
        job_id: JobId,
        mut handle: WorkerHandle,
        artifact: PathBuf,
        result_tx: oneshot::Sender<JobResult>,
    ) {
        let notifier = &self.inner.notifier;

        while let Some(pct) = handle.progress.recv().await {
            notifier.notify(&job_id, ProgressStatus::Processing, pct);
        }

        let outcome = handle.outcome.await.unwrap_or_else(|_| {
            JobOutcome::Failure(WorkerFailure::Wait("worker supervisor went away".into()))
        });

        let result = match outcome {
            JobOutcome::Failure(failure) => {
                tracing::warn!(job_id = %job_id, error = %failure, "Job failed");
                notifier.notify(&job_id, ProgressStatus::Error, 100);
                JobResult::Failed {
                    job_id: job_id.clone(),
                    message: failure.client_message().to_string(),
                }
            }
            JobOutcome::Success { artifact: produced } => match tokio::fs::read(&produced).await {
                Ok(bytes) => {
                    tracing::info!(job_id = %job_id, bytes = bytes.len(), "Job complete");
                    notifier.notify(&job_id, ProgressStatus::Complete, 100);
                    JobResult::Succeeded {
                        job_id: job_id.clone(),
                        artifact_data: STANDARD.encode(bytes),
                    }
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, path = %produced.display(), error = %e, "Failed to read artifact");
                    notifier.notify(&job_id, ProgressStatus::Error, 100);
                    JobResult::Failed {
                        job_id: job_id.clone(),
                        message: "Failed to read artifact".to_string(),
                    }
                }
            },
        };

        if let Err(e) = tokio::fs::remove_file(&artifact).await {
            tracing::debug!(job_id = %job_id, error = %e, "Artifact cleanup skipped");
        }

        // No event may follow the terminal one.
        self.inner.registry.unregister(job_id.as_str());
        self.inner.active.remove(&job_id);

        if result_tx.send(result).is_err() {
            tracing::debug!(job_id = %job_id, "Result receiver dropped");
        }
    }
}

//! Worker process management.
//!
//! Each job gets its own child process. Its stdout is read line by line and
//! `PROGRESS:<n>` lines are forwarded on the handle's progress channel; the
//! exit status becomes a single [`JobOutcome`] delivered on a oneshot.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};

use crate::error::WorkerFailure;
use crate::JobId;

/// Prefix of a progress line on the worker's stdout.
pub const PROGRESS_PREFIX: &str = "PROGRESS:";

/// How long buffered stdout may keep draining once the worker has exited.
const STDOUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// How to launch the external worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Executable to run, e.g. `node`.
    pub program: String,
    /// Arguments placed before the per-job arguments, e.g. a script path.
    pub leading_args: Vec<String>,
    /// Kill the worker if it runs longer than this. `None` lets it run to
    /// its own completion.
    pub timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: "node".into(),
            leading_args: vec!["automation.js".into()],
            timeout: None,
        }
    }
}

/// Terminal result of one worker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success { artifact: PathBuf },
    Failure(WorkerFailure),
}

/// Live view of a running worker.
///
/// `progress` closes before `outcome` fires, so draining progress and then
/// awaiting the outcome observes stdout order with the outcome last.
#[derive(Debug)]
pub struct WorkerHandle {
    pub progress: mpsc::UnboundedReceiver<u8>,
    pub outcome: oneshot::Receiver<JobOutcome>,
}

#[derive(Debug, Clone)]
pub struct WorkerManager {
    config: Arc<WorkerConfig>,
}

impl WorkerManager {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Spawn the worker for `job_id` with `args` appended after the leading
    /// arguments. Must be called from within a tokio runtime.
    pub fn run(&self, job_id: &JobId, args: Vec<String>, artifact: PathBuf) -> WorkerHandle {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.leading_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        match cmd.spawn() {
            Ok(child) => {
                tracing::info!(job_id = %job_id, pid = ?child.id(), program = %self.config.program, "Worker started");
                tokio::spawn(supervise(
                    job_id.clone(),
                    child,
                    progress_tx,
                    outcome_tx,
                    artifact,
                    self.config.timeout,
                ));
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, program = %self.config.program, error = %e, "Failed to start worker");
                drop(progress_tx);
                let _ = outcome_tx.send(JobOutcome::Failure(WorkerFailure::Start(e.to_string())));
            }
        }

        WorkerHandle {
            progress: progress_rx,
            outcome: outcome_rx,
        }
    }
}

async fn supervise(
    job_id: JobId,
    mut child: Child,
    progress: mpsc::UnboundedSender<u8>,
    outcome: oneshot::Sender<JobOutcome>,
    artifact: PathBuf,
    timeout: Option<Duration>,
) {
    let reader = child
        .stdout
        .take()
        .map(|stdout| tokio::spawn(forward_progress(job_id.clone(), stdout, progress)));

    let waited = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
        None => Some(child.wait().await),
    };

    let timed_out = waited.is_none();
    let result = match waited {
        Some(Ok(status)) => classify_exit(&job_id, status, artifact),
        Some(Err(e)) => JobOutcome::Failure(WorkerFailure::Wait(e.to_string())),
        None => {
            let after = timeout.unwrap_or_default();
            tracing::warn!(job_id = %job_id, ?after, "Worker timed out, killing it");
            if let Err(e) = child.kill().await {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to kill worker");
            }
            JobOutcome::Failure(WorkerFailure::TimedOut { after })
        }
    };

    // The reader owns the progress sender; it must be gone before the outcome
    // is published. Background processes may still hold stdout open after the
    // worker exits, so only buffered output gets a short grace period.
    if let Some(mut reader) = reader {
        let drained = !timed_out
            && tokio::time::timeout(STDOUT_DRAIN_GRACE, &mut reader)
                .await
                .is_ok();
        if !drained {
            if !timed_out {
                tracing::debug!(job_id = %job_id, "Worker stdout still open after exit");
            }
            reader.abort();
            let _ = reader.await;
        }
    }

    if outcome.send(result).is_err() {
        tracing::debug!(job_id = %job_id, "Outcome receiver dropped");
    }
}

fn classify_exit(job_id: &JobId, status: ExitStatus, artifact: PathBuf) -> JobOutcome {
    if status.success() {
        tracing::info!(job_id = %job_id, "Worker finished");
        JobOutcome::Success { artifact }
    } else {
        tracing::warn!(job_id = %job_id, code = ?status.code(), "Worker exited with failure");
        JobOutcome::Failure(WorkerFailure::Exit {
            code: status.code(),
        })
    }
}

async fn forward_progress(job_id: JobId, stdout: ChildStdout, progress: mpsc::UnboundedSender<u8>) {
    let mut reader = BufReader::new(stdout);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                match parse_progress_line(&text) {
                    // Keep draining even if nobody listens, so the worker never
                    // blocks on a full pipe.
                    Some(pct) => {
                        let _ = progress.send(pct);
                    }
                    None => tracing::debug!(job_id = %job_id, line = %text.trim_end(), "Worker output"),
                }
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to read worker stdout");
                break;
            }
        }
    }
}

/// Parse a `PROGRESS:<n>` line.
///
/// Leading digits after the prefix are taken and anything after them is
/// ignored, so `PROGRESS:40%` reads as 40. Values are clamped to 0..=100.
/// Returns `None` for lines that are not progress lines or carry no digits.
pub fn parse_progress_line(line: &str) -> Option<u8> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?.trim_start();
    let (negative, digits) = match rest.as_bytes().first() {
        Some(b'-') => (true, &rest[1..]),
        Some(b'+') => (false, &rest[1..]),
        _ => (false, rest),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    if negative {
        return Some(0);
    }
    let value: u64 = digits[..end].parse().unwrap_or(u64::MAX);
    Some(value.min(100) as u8)
}

#[cfg(test)]
mod tests {
    use super::parse_progress_line;

    #[test]
    fn parses_plain_progress() {
        assert_eq!(parse_progress_line("PROGRESS:50"), Some(50));
        assert_eq!(parse_progress_line("PROGRESS:0\n"), Some(0));
        assert_eq!(parse_progress_line("  PROGRESS: 75 \r\n"), Some(75));
    }

    #[test]
    fn ignores_trailing_junk() {
        assert_eq!(parse_progress_line("PROGRESS:40%"), Some(40));
        assert_eq!(parse_progress_line("PROGRESS:12.5"), Some(12));
    }

    #[test]
    fn clamps_out_of_range() {
        assert_eq!(parse_progress_line("PROGRESS:250"), Some(100));
        assert_eq!(parse_progress_line("PROGRESS:-3"), Some(0));
        assert_eq!(parse_progress_line("PROGRESS:99999999999999999999999"), Some(100));
    }

    #[test]
    fn rejects_other_lines() {
        assert_eq!(parse_progress_line("Filling form"), None);
        assert_eq!(parse_progress_line("PROGRESS:"), None);
        assert_eq!(parse_progress_line("PROGRESS:abc"), None);
        assert_eq!(parse_progress_line("progress:10"), None);
        assert_eq!(parse_progress_line("step PROGRESS:10"), None);
    }
}

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use job_engine::{WorkerConfig, WorkerManager};

/// Build a worker that runs `script` with `sh -c`.
///
/// The job arguments become the script's positional parameters; the artifact
/// path is always the last one.
pub fn sh_worker(script: &str) -> WorkerManager {
    sh_worker_with_timeout(script, None)
}

pub fn sh_worker_with_timeout(script: &str, timeout: Option<Duration>) -> WorkerManager {
    WorkerManager::new(WorkerConfig {
        program: "sh".to_string(),
        leading_args: vec!["-c".to_string(), script.to_string(), "worker".to_string()],
        timeout,
    })
}

/// Shell prefix that stores the last positional parameter in `$out`.
pub const LAST_ARG: &str = "for out; do :; done; ";

pub fn assert_missing(path: &Path) {
    assert!(!path.exists(), "{} should have been removed", path.display());
}

use std::path::PathBuf;
use std::time::Duration;

use job_engine::{JobSettings, WorkerConfig};

/// Server configuration loaded from environment variables.
///
/// Every field has a default matching the original deployment
/// (`node automation.js`, PDFs under the system temp dir).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    pub worker: WorkerConfig,
    pub jobs: JobSettings,
    /// How long a finished but uncollected result is kept.
    pub result_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            cors_origins: Vec::new(),
            worker: WorkerConfig::default(),
            jobs: JobSettings::default(),
            result_ttl: Duration::from_secs(600),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                  |
    /// |-----------------------|--------------------------|
    /// | `HOST`                | `0.0.0.0`                |
    /// | `PORT`                | `8080`                   |
    /// | `CORS_ORIGINS`        | any origin               |
    /// | `WORKER_PROGRAM`      | `node`                   |
    /// | `WORKER_ARGS`         | `automation.js`          |
    /// | `WORKER_FIELDS`       | the eight form fields    |
    /// | `WORKER_ID_FLAG`      | `requestId`              |
    /// | `WORKER_OUTPUT_FLAG`  | `pdfPath`                |
    /// | `WORKER_TIMEOUT_SECS` | none                     |
    /// | `OUTPUT_DIR`          | system temp dir          |
    /// | `ARTIFACT_PREFIX`     | `artifact`               |
    /// | `ARTIFACT_EXTENSION`  | `pdf`                    |
    /// | `RESULT_TTL_SECS`     | `600`                    |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(host) = var("HOST") {
            config.host = host;
        }
        if let Some(port) = var("PORT") {
            config.port = port.parse().expect("PORT must be a valid u16");
        }
        if let Some(origins) = var("CORS_ORIGINS") {
            config.cors_origins = split_list(&origins, ',');
        }

        if let Some(program) = var("WORKER_PROGRAM") {
            config.worker.program = program;
        }
        if let Ok(args) = std::env::var("WORKER_ARGS") {
            config.worker.leading_args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(secs) = var("WORKER_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().expect("WORKER_TIMEOUT_SECS must be a valid u64");
            config.worker.timeout = Some(Duration::from_secs(secs));
        }

        if let Some(fields) = var("WORKER_FIELDS") {
            config.jobs.fields = split_list(&fields, ',');
        }
        if let Some(flag) = var("WORKER_ID_FLAG") {
            config.jobs.id_flag = flag;
        }
        if let Some(flag) = var("WORKER_OUTPUT_FLAG") {
            config.jobs.output_flag = flag;
        }
        if let Some(dir) = var("OUTPUT_DIR") {
            config.jobs.artifact_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = var("ARTIFACT_PREFIX") {
            config.jobs.artifact_prefix = prefix;
        }
        if let Some(ext) = var("ARTIFACT_EXTENSION") {
            config.jobs.artifact_extension = ext.trim_start_matches('.').to_string();
        }

        if let Some(secs) = var("RESULT_TTL_SECS") {
            let secs: u64 = secs.parse().expect("RESULT_TTL_SECS must be a valid u64");
            config.result_ttl = Duration::from_secs(secs);
        }

        config
    }
}

/// Non-empty value of an environment variable.
fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: &str, sep: char) -> Vec<String> {
    raw.split(sep)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

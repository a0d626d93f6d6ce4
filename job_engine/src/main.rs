use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Parser;
use dotenv::dotenv;
use job_engine::{
    ConnectionRegistry, JobIdAllocator, JobOrchestrator, JobResult, JobSettings, Submission,
    WorkerConfig, WorkerManager,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Run a single worker job locally and print its progress events as JSON lines.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Worker executable
    #[arg(long, env = "WORKER_PROGRAM", default_value = "node")]
    program: String,

    /// Arguments placed before the job arguments (space separated)
    #[arg(long, env = "WORKER_ARGS", value_delimiter = ' ', default_value = "automation.js")]
    worker_args: Vec<String>,

    /// Field passed to the worker as `--name value`, given as name=value
    #[arg(short, long = "field", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// Directory the worker writes its artifact to
    #[arg(short, long, env = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Save the produced artifact here
    #[arg(short, long)]
    save_to: Option<PathBuf>,

    /// Kill the worker after this many seconds
    #[arg(short, long, env = "WORKER_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got {raw:?}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "job_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut settings = JobSettings {
        fields: args.fields.iter().map(|(name, _)| name.clone()).collect(),
        ..JobSettings::default()
    };
    if let Some(dir) = args.output_dir {
        settings.artifact_dir = dir;
    }
    let worker = WorkerConfig {
        program: args.program,
        leading_args: args.worker_args.into_iter().filter(|a| !a.is_empty()).collect(),
        timeout: args.timeout_secs.map(Duration::from_secs),
    };

    let registry = Arc::new(ConnectionRegistry::new());
    let orchestrator =
        JobOrchestrator::new(Arc::clone(&registry), WorkerManager::new(worker), settings);

    // Register before submitting so the `starting` event is not missed.
    let job_id = JobIdAllocator::new().next();
    let mut events = registry.register(job_id.clone());
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{line}");
            }
        }
    });

    let submitted = orchestrator
        .submit(Submission {
            job_id: Some(job_id.to_string()),
            fields: args.fields.into_iter().collect(),
        })
        .await?;
    let result = submitted.result.await?;
    let _ = printer.await;

    match result {
        JobResult::Succeeded { artifact_data, .. } => {
            let bytes = STANDARD.decode(artifact_data)?;
            match args.save_to {
                Some(path) => {
                    std::fs::write(&path, &bytes)?;
                    eprintln!("✅ {} written ({} bytes)", path.display(), bytes.len());
                }
                None => eprintln!("✅ job {} produced {} bytes", job_id, bytes.len()),
            }
            Ok(())
        }
        JobResult::Failed { message, .. } => Err(format!("job {job_id} failed: {message}").into()),
    }
}

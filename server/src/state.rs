use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use job_engine::{ConnectionRegistry, JobId, JobOrchestrator, JobResult, WorkerManager};

use crate::config::ServerConfig;

// Where a submitted job stands from the client's point of view.
#[derive(Clone, Debug)]
pub enum JobStatus {
    Pending,
    Finished {
        result: JobResult,
        finished_at: DateTime<Utc>,
    },
}

// Shared application state: the orchestrator plus job_id → JobStatus.
#[derive(Clone, Debug)]
pub struct AppState {
    pub orchestrator: JobOrchestrator,
    pub jobs: Arc<DashMap<JobId, JobStatus>>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let workers = WorkerManager::new(config.worker.clone());
        AppState {
            orchestrator: JobOrchestrator::new(registry, workers, config.jobs.clone()),
            jobs: Arc::new(DashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.orchestrator.registry()
    }

    /// Drop finished results nobody collected within `ttl`.
    pub fn prune_expired(&self, ttl: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            return 0;
        };
        let before = self.jobs.len();
        self.jobs.retain(|_, status| match status {
            JobStatus::Pending => true,
            JobStatus::Finished { finished_at, .. } => *finished_at > cutoff,
        });
        before.saturating_sub(self.jobs.len())
    }

    /// Periodically prune uncollected results.
    pub fn spawn_result_sweeper(&self, ttl: Duration) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        let period = (ttl / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let pruned = state.prune_expired(ttl);
                if pruned > 0 {
                    tracing::info!(pruned, "Dropped uncollected job results");
                }
            }
        })
    }
}

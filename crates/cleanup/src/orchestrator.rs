//! Cleanup Orchestrator: bounded background maintenance registered on
//! a `tokio_cron_scheduler` scheduler, plus an emergency variant
//! triggered by memory pressure onset.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use resume_spine_credentials::CredentialStore;
use resume_spine_governance::QuotaLedger;
use resume_spine_queue::{JobStore, PayloadCache};
use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::artifacts::purge_orphan_artifacts;
use crate::error::CleanupResult;

const WINDOW_COUNTER_MAX_AGE: Duration = Duration::from_secs(60 * 60);
const DAILY_COUNTER_MAX_AGE_DAYS: i64 = 90;
const MINUTE_SWEEP_JOB_AGE: Duration = Duration::from_secs(24 * 60 * 60);
const EMERGENCY_SWEEP_JOB_AGE: Duration = Duration::from_secs(30 * 60);

pub struct CleanupOrchestrator {
    credentials: Arc<dyn CredentialStore>,
    quota: Arc<dyn QuotaLedger>,
    jobs: Arc<dyn JobStore>,
    cache: Arc<PayloadCache>,
    artifact_root: PathBuf,
}

impl CleanupOrchestrator {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        quota: Arc<dyn QuotaLedger>,
        jobs: Arc<dyn JobStore>,
        cache: Arc<PayloadCache>,
        artifact_root: PathBuf,
    ) -> Self {
        Self {
            credentials,
            quota,
            jobs,
            cache,
            artifact_root,
        }
    }

    /// Every `cleanup_interval` (default 60s): purge terminal jobs and
    /// orphan artifact directories older than 24h.
    pub async fn minute_sweep(&self) -> CleanupResult<()> {
        let jobs_removed = self.jobs.sweep_terminal(MINUTE_SWEEP_JOB_AGE).await?;
        let artifacts_removed =
            purge_orphan_artifacts(self.jobs.as_ref(), &self.artifact_root, MINUTE_SWEEP_JOB_AGE)
                .await?;
        info!(jobs_removed, artifacts_removed, "Minute sweep complete");
        Ok(())
    }

    /// Every 6h: expire credentials and trim quota history.
    pub async fn six_hour_sweep(&self) -> CleanupResult<()> {
        let (sessions_removed, revocations_removed) = self.credentials.sweep_expired().await?;
        let (windows_removed, daily_removed) = self
            .quota
            .prune(WINDOW_COUNTER_MAX_AGE, DAILY_COUNTER_MAX_AGE_DAYS)
            .await?;
        info!(
            sessions_removed,
            revocations_removed, windows_removed, daily_removed, "Six-hour sweep complete"
        );
        Ok(())
    }

    /// Emergency variant triggered on pressure onset: stricter age
    /// threshold and drop every in-memory payload cache entry.
    pub async fn emergency_sweep(&self) -> CleanupResult<()> {
        let jobs_removed = self.jobs.sweep_terminal(EMERGENCY_SWEEP_JOB_AGE).await?;
        let artifacts_removed = purge_orphan_artifacts(
            self.jobs.as_ref(),
            &self.artifact_root,
            EMERGENCY_SWEEP_JOB_AGE,
        )
        .await?;
        self.cache.clear().await;
        warn!(
            jobs_removed,
            artifacts_removed, "Emergency sweep complete (memory pressure onset)"
        );
        Ok(())
    }

    /// Registers the two fixed-interval sweeps with the scheduler.
    /// Errors from either pass are logged and do not stop future runs.
    pub async fn schedule(
        self: Arc<Self>,
        scheduler: &JobScheduler,
        cleanup_interval: Duration,
    ) -> anyhow::Result<(uuid::Uuid, uuid::Uuid)> {
        let minute = self.clone();
        let minute_job = Job::new_repeated_async(cleanup_interval, move |_uuid, _l| {
            let orchestrator = minute.clone();
            Box::pin(async move {
                if let Err(e) = orchestrator.minute_sweep().await {
                    error!(error = %e, "Minute sweep failed");
                }
            })
        })?;

        let six_hourly = self.clone();
        let six_hour_job =
            Job::new_repeated_async(Duration::from_secs(6 * 60 * 60), move |_uuid, _l| {
                let orchestrator = six_hourly.clone();
                Box::pin(async move {
                    if let Err(e) = orchestrator.six_hour_sweep().await {
                        error!(error = %e, "Six-hour sweep failed");
                    }
                })
            })?;

        let minute_id = scheduler.add(minute_job).await?;
        let six_hour_id = scheduler.add(six_hour_job).await?;

        info!(cleanup_interval = ?cleanup_interval, "Scheduled: minute sweep and six-hour sweep");
        Ok((minute_id, six_hour_id))
    }

    /// Spawns a task that reacts to `PressureSensor::subscribe_onset()`
    /// by running the emergency sweep variant.
    pub fn spawn_pressure_listener(
        self: Arc<Self>,
        mut onset_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match onset_rx.recv().await {
                    Ok(()) => {
                        if let Err(e) = self.emergency_sweep().await {
                            error!(error = %e, "Emergency sweep failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resume_spine_credentials::InMemoryCredentialStore;
    use resume_spine_governance::InMemoryQuotaLedger;
    use resume_spine_queue::{InMemoryJobStore, JobStatus};
    use resume_spine_shared::PrincipalId;

    fn orchestrator(root: PathBuf) -> (Arc<CleanupOrchestrator>, Arc<InMemoryJobStore>, Arc<PayloadCache>) {
        let jobs = Arc::new(InMemoryJobStore::new());
        let cache = Arc::new(PayloadCache::new(Duration::from_secs(60), 16));
        let orchestrator = Arc::new(CleanupOrchestrator::new(
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(InMemoryQuotaLedger::new()),
            jobs.clone(),
            cache.clone(),
            root,
        ));
        (orchestrator, jobs, cache)
    }

    #[tokio::test]
    async fn minute_sweep_tolerates_missing_artifact_root() {
        let missing = std::env::temp_dir().join(format!("cleanup-test-missing-{}", std::process::id()));
        let (orchestrator, _jobs, _cache) = orchestrator(missing);
        orchestrator.minute_sweep().await.unwrap();
    }

    #[tokio::test]
    async fn six_hour_sweep_runs_without_error_on_empty_stores() {
        let (orchestrator, _jobs, _cache) =
            orchestrator(std::env::temp_dir().join("cleanup-test-six-hour"));
        orchestrator.six_hour_sweep().await.unwrap();
    }

    #[tokio::test]
    async fn emergency_sweep_clears_the_payload_cache() {
        let (orchestrator, _jobs, cache) =
            orchestrator(std::env::temp_dir().join("cleanup-test-emergency"));
        cache
            .put(
                resume_spine_shared::PayloadRef("p1".to_string()),
                "text".to_string(),
            )
            .await;
        assert_eq!(cache.len().await, 1);

        orchestrator.emergency_sweep().await.unwrap();
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn minute_sweep_removes_old_terminal_jobs() {
        let (orchestrator, jobs, _cache) =
            orchestrator(std::env::temp_dir().join("cleanup-test-terminal"));
        let p = PrincipalId::new();
        let enqueued = jobs
            .enqueue(p, resume_spine_shared::PayloadRef("a".to_string()))
            .await
            .unwrap();
        jobs.claim_next().await.unwrap();
        jobs.complete_success(enqueued.job_id, serde_json::json!({}), 1.0)
            .await
            .unwrap();

        let job = jobs.get(enqueued.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);

        // Fresh job; the 24h sweep threshold should not remove it.
        orchestrator.minute_sweep().await.unwrap();
        assert!(jobs.get(enqueued.job_id).await.unwrap().is_some());
    }
}

//! Background worker: runs the Queue Engine's operation loop, the
//! Pressure Sensor's sampler, and the Cleanup Orchestrator's scheduled
//! sweeps. A separate process from the API server so a stuck
//! extraction call never blocks request handling.

use std::path::PathBuf;
use std::sync::Arc;

use resume_spine_cleanup::CleanupOrchestrator;
use resume_spine_credentials::PgCredentialStore;
use resume_spine_extraction::{ExtractionClient, HttpLlmBackend, LlmBackend};
use resume_spine_governance::{DailyPolicy, PgQuotaLedger, PressureSensor, QuotaLedger};
use resume_spine_queue::{JobStore, PayloadCache, PgDocumentStore, PgJobStore, QueueEngine};
use resume_spine_shared::{create_pool, init_tracing, Config, LlmBackendKind};
use tokio::sync::watch;
use tokio_cron_scheduler::JobScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing("info,resume_spine_worker=debug");

    tracing::info!("Starting resume-spine worker v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let pool = create_pool(&config.database_url).await?;

    let credentials = Arc::new(PgCredentialStore::new(pool.clone()));
    let quota: Arc<dyn QuotaLedger> = Arc::new(PgQuotaLedger::new(pool.clone()));
    let jobs: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
    let documents = Arc::new(PgDocumentStore::new(pool.clone()));
    let cache = Arc::new(PayloadCache::new(
        config.payload_cache_ttl,
        config.payload_cache_max_entries,
    ));
    let pressure = Arc::new(PressureSensor::new(
        config.memory_high_mark_mb,
        config.memory_low_mark_ratio,
    ));

    let backend: Arc<dyn LlmBackend> = match config.llm_backend {
        LlmBackendKind::Http => {
            let api_base = config
                .llm_api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
            let api_key = config
                .llm_api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("LLM_API_KEY must be set when LLM_BACKEND=http"))?;
            Arc::new(HttpLlmBackend::new(api_base, api_key, config.llm_model.clone()))
        }
        LlmBackendKind::Fixture => {
            anyhow::bail!(
                "LLM_BACKEND=fixture has no production backend to run; use a test binary instead"
            );
        }
    };

    let extraction = Arc::new(ExtractionClient::new(
        backend,
        quota.clone(),
        DailyPolicy {
            daily_requests: config.llm_daily_requests_per_principal,
            monthly_tokens: config.llm_monthly_tokens_per_principal,
        },
        config.llm_deadline,
    ));

    let engine = Arc::new(QueueEngine::new(
        jobs.clone(),
        cache.clone(),
        documents.clone(),
        extraction,
        config.queue_poll_interval,
        config.engine_deadline,
    ));

    tracing::info!("Recovering jobs interrupted by a prior crash...");
    engine.recover_on_startup().await?;

    let pressure_sampler = pressure.clone().spawn_sampler(config.pressure_sample_interval);

    let orchestrator = Arc::new(CleanupOrchestrator::new(
        credentials,
        quota,
        jobs,
        cache,
        PathBuf::from(std::env::var("ARTIFACT_ROOT").unwrap_or_else(|_| "./data/artifacts".to_string())),
    ));

    let scheduler = JobScheduler::new().await?;
    orchestrator
        .clone()
        .schedule(&scheduler, config.cleanup_interval)
        .await?;
    scheduler.start().await?;

    let pressure_listener = orchestrator.spawn_pressure_listener(pressure.subscribe_onset());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = tokio::spawn(async move {
        engine.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    engine_task.await?;
    pressure_sampler.abort();
    pressure_listener.abort();

    Ok(())
}

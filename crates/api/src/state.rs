//! Application state: every collaborator wired together once at
//! startup and handed to every handler.

use std::sync::Arc;

use resume_spine_credentials::{CredentialStore, PgCredentialStore};
use resume_spine_governance::{AdmissionConfig, AdmissionController, DailyPolicy, PgQuotaLedger, PressureSensor, QuotaLedger};
use resume_spine_queue::{JobStore, PayloadCache, PgDocumentStore, PgJobStore};
use resume_spine_shared::Config;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub credentials: Arc<dyn CredentialStore>,
    pub quota: Arc<dyn QuotaLedger>,
    pub pressure: Arc<PressureSensor>,
    pub admission: Arc<AdmissionController>,
    pub jobs: Arc<dyn JobStore>,
    pub documents: Arc<PgDocumentStore>,
    pub payload_cache: Arc<PayloadCache>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let credentials: Arc<dyn CredentialStore> = Arc::new(PgCredentialStore::new(pool.clone()));
        let quota: Arc<dyn QuotaLedger> = Arc::new(PgQuotaLedger::new(pool.clone()));
        let pressure = Arc::new(PressureSensor::new(
            config.memory_high_mark_mb,
            config.memory_low_mark_ratio,
        ));
        let admission = Arc::new(AdmissionController::new(
            quota.clone(),
            pressure.clone(),
            AdmissionConfig {
                window_size: config.window_size,
                window_max_default: config.window_max_default,
                window_max_llm: config.window_max_llm,
                window_max_identity: config.window_max_identity,
                daily_policy: DailyPolicy {
                    daily_requests: config.llm_daily_requests_per_principal,
                    monthly_tokens: config.llm_monthly_tokens_per_principal,
                },
            },
        ));
        let jobs: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
        let documents = Arc::new(PgDocumentStore::new(pool.clone()));
        let payload_cache = Arc::new(PayloadCache::new(
            config.payload_cache_ttl,
            config.payload_cache_max_entries,
        ));

        Self {
            config,
            credentials,
            quota,
            pressure,
            admission,
            jobs,
            documents,
            payload_cache,
        }
    }
}

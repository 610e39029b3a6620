//! Immutable application configuration, loaded once at startup.
//!
//! Every tunable named in the service spine's external configuration
//! surface lives here. Nothing in the spine mutates a `Config` after
//! `Config::from_env` returns; components that need a derived value
//! (e.g. a `Duration`) compute it once at construction.

use std::time::Duration;

/// Which LLM backend the Extraction Client should call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackendKind {
    /// Generic HTTP JSON backend (OpenAI/Anthropic-compatible chat completion).
    Http,
    /// In-memory fixture backend, used only in tests and local dev.
    Fixture,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,

    // Credential Store
    pub max_sessions_per_principal: i64,
    pub session_ttl: Duration,
    pub revocation_ttl: Duration,

    // Quota Ledger
    pub llm_daily_requests_per_principal: i64,
    pub llm_monthly_tokens_per_principal: i64,

    // Admission Controller / rolling window
    pub window_size: Duration,
    pub window_max_default: i64,
    pub window_max_llm: i64,
    pub window_max_identity: i64,

    // Pressure Sensor
    pub memory_high_mark_mb: f64,
    pub memory_low_mark_ratio: f64,
    pub pressure_sample_interval: Duration,

    // Queue Engine
    pub queue_poll_interval: Duration,
    pub engine_deadline: Duration,

    // Cleanup Orchestrator
    pub cleanup_interval: Duration,
    pub credential_sweep_interval: Duration,
    pub job_retention: Duration,

    // Extraction Client
    pub llm_deadline: Duration,
    pub llm_backend: LlmBackendKind,
    pub llm_api_key: Option<String>,
    pub llm_api_base: Option<String>,
    pub llm_model: String,

    // Payload cache
    pub payload_cache_ttl: Duration,
    pub payload_cache_max_entries: usize,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_parse(key, default_secs))
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Fails fast when the selected LLM backend is missing required
    /// credentials.
    pub fn from_env() -> anyhow::Result<Self> {
        #[allow(clippy::expect_used)] // Fail-fast on startup if required config is missing
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let llm_backend = match env_or("LLM_BACKEND", "http").as_str() {
            "fixture" => LlmBackendKind::Fixture,
            _ => LlmBackendKind::Http,
        };
        let llm_api_key = std::env::var("LLM_API_KEY").ok();
        let llm_api_base = std::env::var("LLM_API_BASE").ok();

        if llm_backend == LlmBackendKind::Http && llm_api_key.is_none() {
            anyhow::bail!(
                "LLM_BACKEND=http requires LLM_API_KEY to be set; refusing to start"
            );
        }

        Ok(Self {
            database_url,

            max_sessions_per_principal: env_parse("MAX_SESSIONS_PER_PRINCIPAL", 5),
            session_ttl: env_secs("SESSION_TTL_SECS", 24 * 3600),
            revocation_ttl: env_secs("REVOCATION_TTL_SECS", 7 * 24 * 3600),

            llm_daily_requests_per_principal: env_parse("LLM_DAILY_REQUESTS_PER_PRINCIPAL", 50),
            llm_monthly_tokens_per_principal: env_parse(
                "LLM_MONTHLY_TOKENS_PER_PRINCIPAL",
                100_000,
            ),

            window_size: env_secs("WINDOW_SIZE_SECS", 15 * 60),
            window_max_default: env_parse("WINDOW_MAX_DEFAULT", 100),
            window_max_llm: env_parse("WINDOW_MAX_LLM", 50),
            window_max_identity: env_parse("WINDOW_MAX_IDENTITY", 20),

            memory_high_mark_mb: env_parse("MEMORY_HIGH_MARK_MB", 400.0),
            memory_low_mark_ratio: env_parse("MEMORY_LOW_MARK_RATIO", 0.8),
            pressure_sample_interval: env_secs("PRESSURE_SAMPLE_INTERVAL_SECS", 30),

            queue_poll_interval: env_secs("QUEUE_POLL_INTERVAL_SECS", 2),
            engine_deadline: env_secs("ENGINE_DEADLINE_SECS", 45),

            cleanup_interval: env_secs("CLEANUP_INTERVAL_SECS", 60),
            credential_sweep_interval: env_secs("CREDENTIAL_SWEEP_INTERVAL_SECS", 6 * 3600),
            job_retention: env_secs("JOB_RETENTION_SECS", 24 * 3600),

            llm_deadline: env_secs("LLM_DEADLINE_SECS", 30),
            llm_backend,
            llm_api_key,
            llm_api_base,
            llm_model: env_or("LLM_MODEL", "gpt-4o-mini"),

            payload_cache_ttl: env_secs("PAYLOAD_CACHE_TTL_SECS", 3600),
            payload_cache_max_entries: env_parse("PAYLOAD_CACHE_MAX_ENTRIES", 1_000),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_on_missing_or_invalid() {
        assert_eq!(env_parse::<i64>("DOES_NOT_EXIST_XYZ", 42), 42);
    }
}

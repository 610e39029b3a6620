//! Queue Engine: drives jobs from `queued` to terminal state, one at a
//! time. Holds no persistent state of its own — a restart recovers
//! intent entirely from the Job Store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use resume_spine_extraction::{ExtractionClient, ExtractionError};
use resume_spine_shared::PayloadRef;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::cache::{DocumentStore, PayloadCache};
use crate::error::QueueResult;
use crate::store::JobStore;

/// Maps an `ExtractionError` to the fixed user-facing sentence the
/// Queue Engine is responsible for; the raw provider message is never
/// surfaced.
fn user_facing_message(error: &ExtractionError) -> &'static str {
    match error {
        ExtractionError::Unavailable => {
            "The AI service is temporarily unavailable. Please try again later."
        }
        ExtractionError::Timeout => {
            "Processing timed out. The document may be too complex or the service is busy."
        }
        ExtractionError::QuotaExhausted => "Service usage limit reached. Please try again later.",
        ExtractionError::ParseFailure => "We couldn't understand the AI's response. Please try again.",
        ExtractionError::SchemaFailure => "Extraction returned an incomplete result. Please try again.",
        ExtractionError::Unknown(_) => "Processing failed. Please try again.",
    }
}

pub struct QueueEngine {
    store: Arc<dyn JobStore>,
    cache: Arc<PayloadCache>,
    document_store: Arc<dyn DocumentStore>,
    extraction: Arc<ExtractionClient>,
    poll_interval: Duration,
    engine_deadline: Duration,
}

impl QueueEngine {
    pub fn new(
        store: Arc<dyn JobStore>,
        cache: Arc<PayloadCache>,
        document_store: Arc<dyn DocumentStore>,
        extraction: Arc<ExtractionClient>,
        poll_interval: Duration,
        engine_deadline: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            document_store,
            extraction,
            poll_interval,
            engine_deadline,
        }
    }

    /// Startup recovery: fail forward any job a crash left `processing`,
    /// rather than silently re-claiming it.
    pub async fn recover_on_startup(&self) -> QueueResult<()> {
        let recovered = self
            .store
            .recover_interrupted("unknown", "Interrupted; please retry")
            .await?;
        for job_id in &recovered {
            warn!(job_id = %job_id, "Recovered interrupted job from a prior crash");
        }
        Ok(())
    }

    async fn resolve_payload(&self, payload_ref: &PayloadRef) -> Option<String> {
        if let Some(text) = self.cache.get(payload_ref).await {
            return Some(text);
        }
        let text = self.document_store.fetch_text(payload_ref).await?;
        self.cache.put(payload_ref.clone(), text.clone()).await;
        Some(text)
    }

    /// One pass of the operation loop. Returns `true` if a job was
    /// claimed and processed, `false` if the queue was empty.
    pub async fn run_once(&self) -> QueueResult<bool> {
        let Some(job) = self.store.claim_next().await? else {
            return Ok(false);
        };

        let start = Instant::now();

        let outcome: Result<serde_json::Value, (&'static str, String)> =
            match self.resolve_payload(&job.payload_ref).await {
                None => Err(("unknown", "payload not found".to_string())),
                Some(text) => {
                    match tokio::time::timeout(
                        self.engine_deadline,
                        self.extraction.extract(&text, job.principal_id),
                    )
                    .await
                    {
                        Ok(Ok(record)) => {
                            Ok(serde_json::to_value(&record).unwrap_or(serde_json::Value::Null))
                        }
                        Ok(Err(e)) => Err((e.kind_str(), user_facing_message(&e).to_string())),
                        Err(_) => Err((
                            "timeout",
                            user_facing_message(&ExtractionError::Timeout).to_string(),
                        )),
                    }
                }
            };

        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            Ok(result) => {
                info!(job_id = %job.job_id, elapsed_seconds = elapsed, "Job completed");
                self.store.complete_success(job.job_id, result, elapsed).await?;
            }
            Err((kind, message)) => {
                warn!(job_id = %job.job_id, kind, "Job failed");
                self.store.complete_failure(job.job_id, kind, &message, elapsed).await?;
            }
        }

        self.store.recompute_positions().await?;
        Ok(true)
    }

    /// Runs the poll loop until `shutdown` signals true. On shutdown the
    /// loop stops claiming new jobs; an in-flight `run_once` call already
    /// underway is allowed to finish.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Queue engine tick failed");
                    }
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Queue engine shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryJobStore;
    use resume_spine_extraction::FixtureLlmBackend;
    use resume_spine_governance::{DailyPolicy, InMemoryQuotaLedger};
    use resume_spine_shared::PrincipalId;

    struct FixedDocumentStore(Option<String>);

    #[async_trait::async_trait]
    impl DocumentStore for FixedDocumentStore {
        async fn fetch_text(&self, _payload_ref: &PayloadRef) -> Option<String> {
            self.0.clone()
        }
    }

    fn extraction_client(json: &str) -> Arc<ExtractionClient> {
        Arc::new(ExtractionClient::new(
            Arc::new(FixtureLlmBackend::ok(json)),
            Arc::new(InMemoryQuotaLedger::new()),
            DailyPolicy {
                daily_requests: 50,
                monthly_tokens: 100_000,
            },
            Duration::from_secs(5),
        ))
    }

    fn engine(json: &str, doc: Option<String>) -> (Arc<InMemoryJobStore>, QueueEngine) {
        let store = Arc::new(InMemoryJobStore::new());
        let cache = Arc::new(PayloadCache::new(Duration::from_secs(60), 16));
        let document_store = Arc::new(FixedDocumentStore(doc));
        let engine = QueueEngine::new(
            store.clone(),
            cache,
            document_store,
            extraction_client(json),
            Duration::from_millis(10),
            Duration::from_secs(5),
        );
        (store, engine)
    }

    #[tokio::test]
    async fn happy_path_completes_job() {
        let (store, engine) = engine(
            r#"{"personalInfo":{"name":"Jane Smith"},"experience":[{"title":"Chef"}]}"#,
            Some("resume text".to_string()),
        );
        let job = store
            .enqueue(PrincipalId::new(), PayloadRef("p1".to_string()))
            .await
            .unwrap();

        let claimed = engine.run_once().await.unwrap();
        assert!(claimed);

        let fetched = store.get(job.job_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, crate::model::JobStatus::Completed);
    }

    #[tokio::test]
    async fn missing_payload_is_terminal_failure_with_unknown_kind() {
        let (store, engine) = engine(r#"{"personalInfo":{"name":"X"}}"#, None);
        let job = store
            .enqueue(PrincipalId::new(), PayloadRef("missing".to_string()))
            .await
            .unwrap();

        engine.run_once().await.unwrap();

        let fetched = store.get(job.job_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, crate::model::JobStatus::Failed);
        assert_eq!(fetched.error_kind.as_deref(), Some("unknown"));
        assert_eq!(fetched.error_message.as_deref(), Some("payload not found"));
    }

    #[tokio::test]
    async fn empty_queue_does_nothing() {
        let (_store, engine) = engine("{}", Some("text".to_string()));
        assert!(!engine.run_once().await.unwrap());
    }

    #[tokio::test]
    async fn recover_on_startup_fails_forward_stuck_processing_job() {
        let (store, engine) = engine("{}", Some("text".to_string()));
        let job = store
            .enqueue(PrincipalId::new(), PayloadRef("p1".to_string()))
            .await
            .unwrap();
        store.claim_next().await.unwrap();

        engine.recover_on_startup().await.unwrap();

        let fetched = store.get(job.job_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, crate::model::JobStatus::Failed);
        assert_eq!(fetched.error_kind.as_deref(), Some("unknown"));
    }
}

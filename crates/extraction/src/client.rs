//! Extraction Client: a single-pass LLM call that turns cleaned résumé
//! text into a normalized `ExtractionRecord`.

use std::sync::Arc;
use std::time::Duration;

use resume_spine_governance::{ApiKind, DailyDecision, DailyPolicy, QuotaLedger};
use resume_spine_shared::PrincipalId;
use tracing::warn;

use crate::backend::{BackendError, GenerationConfig, LlmBackend};
use crate::error::{ExtractionError, ExtractionResult};
use crate::prompt::{build_prompt, estimate_tokens};
use crate::record::ExtractionRecord;

pub struct ExtractionClient {
    backend: Arc<dyn LlmBackend>,
    quota: Arc<dyn QuotaLedger>,
    daily_policy: DailyPolicy,
    deadline: Duration,
}

impl ExtractionClient {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        quota: Arc<dyn QuotaLedger>,
        daily_policy: DailyPolicy,
        deadline: Duration,
    ) -> Self {
        Self {
            backend,
            quota,
            daily_policy,
            deadline,
        }
    }

    pub async fn extract(
        &self,
        cleaned_text: &str,
        principal_id: PrincipalId,
    ) -> ExtractionResult<ExtractionRecord> {
        let kind = ApiKind::llm();

        // Step 1: consult the Quota Ledger.
        match self
            .quota
            .check_daily(principal_id, &kind, self.daily_policy)
            .await
        {
            Ok(DailyDecision::Exceeded { .. }) => return Err(ExtractionError::QuotaExhausted),
            Ok(DailyDecision::Remaining { .. }) => {}
            Err(e) => return Err(ExtractionError::Unknown(e.to_string())),
        }

        // Steps 2-3: build the prompt and call the LLM.
        let prompt = build_prompt(cleaned_text);
        let config = GenerationConfig {
            deadline: self.deadline,
            ..GenerationConfig::default()
        };

        let response = match self.backend.generate(&prompt, &config).await {
            Ok(text) => text,
            Err(BackendError::Unavailable) => return Err(ExtractionError::Unavailable),
            Err(BackendError::Timeout) => return Err(ExtractionError::Timeout),
            Err(BackendError::Other(msg)) => return Err(ExtractionError::Unknown(msg)),
        };

        // Step 4: parse, with one repair pass on failure.
        let record = parse_with_repair(&response)?;

        if !record.has_any_content() {
            return Err(ExtractionError::SchemaFailure);
        }

        // Step 5: normalize.
        let record = record.normalize();

        // Step 6: record usage. Failed calls never reach this line, so
        // failed extractions do not consume a quota slot.
        let estimated_tokens = estimate_tokens(&prompt, &response);
        if let Err(e) = self.quota.record(principal_id, &kind, 1, estimated_tokens).await {
            warn!(error = %e, "Failed to record LLM usage after successful extraction");
        }

        Ok(record)
    }
}

/// Parse as JSON; on failure, strip trailing commentary and extract
/// the largest balanced JSON object, then retry once. No further
/// retries.
fn parse_with_repair(response: &str) -> ExtractionResult<ExtractionRecord> {
    if let Ok(record) = serde_json::from_str::<ExtractionRecord>(response) {
        return Ok(record);
    }

    let repaired = extract_largest_balanced_object(response).ok_or(ExtractionError::ParseFailure)?;
    serde_json::from_str::<ExtractionRecord>(&repaired).map_err(|_| ExtractionError::ParseFailure)
}

/// Scans for the largest substring that is a balanced `{ ... }` object,
/// ignoring braces that occur inside string literals.
fn extract_largest_balanced_object(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut best: Option<(usize, usize)> = None;
    let mut depth = 0i32;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start {
                            let len = i - s;
                            if best.map(|(bs, be)| be - bs).unwrap_or(0) < len {
                                best = Some((s, i + 1));
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    best.map(|(s, e)| text[s..e].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FixtureLlmBackend;
    use resume_spine_governance::InMemoryQuotaLedger;

    fn client(backend: FixtureLlmBackend) -> ExtractionClient {
        ExtractionClient::new(
            Arc::new(backend),
            Arc::new(InMemoryQuotaLedger::new()),
            DailyPolicy {
                daily_requests: 50,
                monthly_tokens: 100_000,
            },
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn happy_path_extracts_and_records_usage() {
        let json = r#"{"personalInfo":{"name":"Jane Smith"},"experience":[{"title":"Chef","company":"X","startDate":"2020","endDate":"2023"}],"skills":{"technical":["French cuisine","knife skills"]}}"#;
        let c = client(FixtureLlmBackend::ok(json));
        let principal = PrincipalId::new();

        let record = c.extract("resume text", principal).await.unwrap();
        assert_eq!(record.personal_info.name, "Jane Smith");
        assert_eq!(record.experience[0].title, "Chef");
        assert_eq!(record.skills.technical, vec!["French cuisine", "knife skills"]);
    }

    #[tokio::test]
    async fn repairs_response_with_trailing_commentary() {
        let json = format!(
            "Sure, here is the JSON:\n{}\nHope that helps!",
            r#"{"personalInfo":{"name":"Jane Smith"}}"#
        );
        let c = client(FixtureLlmBackend::ok(json));
        let record = c.extract("resume text", PrincipalId::new()).await.unwrap();
        assert_eq!(record.personal_info.name, "Jane Smith");
    }

    #[tokio::test]
    async fn unrepairable_garbage_is_parse_failure() {
        let c = client(FixtureLlmBackend::ok("not json at all, no braces"));
        let result = c.extract("resume text", PrincipalId::new()).await;
        assert_eq!(result, Err(ExtractionError::ParseFailure));
    }

    #[tokio::test]
    async fn empty_object_is_schema_failure() {
        let c = client(FixtureLlmBackend::ok("{}"));
        let result = c.extract("resume text", PrincipalId::new()).await;
        assert_eq!(result, Err(ExtractionError::SchemaFailure));
    }

    #[tokio::test]
    async fn backend_unavailable_propagates_without_retry() {
        let c = client(FixtureLlmBackend::err(BackendError::Unavailable));
        let result = c.extract("resume text", PrincipalId::new()).await;
        assert_eq!(result, Err(ExtractionError::Unavailable));
    }

    #[tokio::test]
    async fn quota_exhausted_short_circuits_before_calling_backend() {
        let quota = Arc::new(InMemoryQuotaLedger::new());
        let principal = PrincipalId::new();
        let policy = DailyPolicy {
            daily_requests: 0,
            monthly_tokens: 100_000,
        };
        let c = ExtractionClient::new(
            Arc::new(FixtureLlmBackend::ok("{}")),
            quota,
            policy,
            Duration::from_secs(30),
        );
        let result = c.extract("resume text", principal).await;
        assert_eq!(result, Err(ExtractionError::QuotaExhausted));
    }
}

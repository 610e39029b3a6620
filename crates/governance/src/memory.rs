//! In-memory `QuotaLedger` fake for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use resume_spine_shared::PrincipalId;
use time::{Date, OffsetDateTime};

use crate::error::GovernanceResult;
use crate::model::{ApiKind, DailyDecision, ExceededReason, WindowDecision};
use crate::quota::{DailyPolicy, QuotaLedger};

#[derive(Default)]
struct DailyRow {
    call_count: i64,
    token_count: i64,
}

#[derive(Default)]
pub struct InMemoryQuotaLedger {
    daily: Mutex<HashMap<(PrincipalId, String, Date), DailyRow>>,
    windows: Mutex<HashMap<(PrincipalId, String, i64), i64>>,
}

impl InMemoryQuotaLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaLedger for InMemoryQuotaLedger {
    async fn check_daily(
        &self,
        principal_id: PrincipalId,
        api_kind: &ApiKind,
        policy: DailyPolicy,
    ) -> GovernanceResult<DailyDecision> {
        let today = OffsetDateTime::now_utc().date();
        let month_start = today.replace_day(1).unwrap_or(today);
        let daily = self.daily.lock().expect("lock poisoned");

        let call_count = daily
            .get(&(principal_id, api_kind.0.clone(), today))
            .map(|r| r.call_count)
            .unwrap_or(0);
        let token_count: i64 = daily
            .iter()
            .filter(|((p, k, d), _)| *p == principal_id && k == &api_kind.0 && *d >= month_start)
            .map(|(_, r)| r.token_count)
            .sum();

        if call_count >= policy.daily_requests {
            return Ok(DailyDecision::Exceeded {
                reason: ExceededReason::DailyRequests,
            });
        }
        if token_count >= policy.monthly_tokens {
            return Ok(DailyDecision::Exceeded {
                reason: ExceededReason::MonthlyTokens,
            });
        }
        Ok(DailyDecision::Remaining {
            requests_remaining: policy.daily_requests - call_count,
            tokens_remaining: policy.monthly_tokens - token_count,
        })
    }

    async fn record(
        &self,
        principal_id: PrincipalId,
        api_kind: &ApiKind,
        requests: i64,
        tokens: i64,
    ) -> GovernanceResult<()> {
        let today = OffsetDateTime::now_utc().date();
        let mut daily = self.daily.lock().expect("lock poisoned");
        let row = daily
            .entry((principal_id, api_kind.0.clone(), today))
            .or_default();
        row.call_count += requests;
        row.token_count += tokens;
        Ok(())
    }

    async fn check_window(
        &self,
        principal_id: PrincipalId,
        endpoint: &str,
        window_size: std::time::Duration,
        max_in_window: i64,
    ) -> GovernanceResult<WindowDecision> {
        let now = OffsetDateTime::now_utc();
        let window_secs = window_size.as_secs().max(1) as i64;
        let start_epoch = (now.unix_timestamp() / window_secs) * window_secs;

        let mut windows = self.windows.lock().expect("lock poisoned");
        let count = windows
            .entry((principal_id, endpoint.to_string(), start_epoch))
            .or_insert(0);
        *count += 1;

        if *count > max_in_window {
            let retry_after = (start_epoch + window_secs - now.unix_timestamp()).max(0) as u64;
            Ok(WindowDecision::Deny {
                retry_after_secs: retry_after,
            })
        } else {
            Ok(WindowDecision::Accept)
        }
    }

    async fn prune(
        &self,
        _window_older_than: std::time::Duration,
        _daily_older_than_days: i64,
    ) -> GovernanceResult<(u64, u64)> {
        Ok((0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn daily_boundary_denies_on_the_limit_plus_one() {
        let ledger = InMemoryQuotaLedger::new();
        let principal = PrincipalId::new();
        let kind = ApiKind::llm();
        let policy = DailyPolicy {
            daily_requests: 3,
            monthly_tokens: 1_000_000,
        };

        for _ in 0..3 {
            let decision = ledger.check_daily(principal, &kind, policy).await.unwrap();
            assert!(matches!(decision, DailyDecision::Remaining { .. }));
            ledger.record(principal, &kind, 1, 10).await.unwrap();
        }

        let decision = ledger.check_daily(principal, &kind, policy).await.unwrap();
        assert_eq!(
            decision,
            DailyDecision::Exceeded {
                reason: ExceededReason::DailyRequests
            }
        );
    }

    #[tokio::test]
    async fn concurrent_records_sum() {
        let ledger = std::sync::Arc::new(InMemoryQuotaLedger::new());
        let principal = PrincipalId::new();
        let kind = ApiKind::llm();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = ledger.clone();
            let kind = kind.clone();
            handles.push(tokio::spawn(async move {
                ledger.record(principal, &kind, 1, 5).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let policy = DailyPolicy {
            daily_requests: 1_000,
            monthly_tokens: 1_000_000,
        };
        match ledger.check_daily(principal, &kind, policy).await.unwrap() {
            DailyDecision::Remaining {
                requests_remaining,
                tokens_remaining,
            } => {
                assert_eq!(requests_remaining, 1_000 - 20);
                assert_eq!(tokens_remaining, 1_000_000 - 100);
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[tokio::test]
    async fn window_denies_once_over_max() {
        let ledger = InMemoryQuotaLedger::new();
        let principal = PrincipalId::new();
        let window = std::time::Duration::from_secs(900);

        for _ in 0..2 {
            let decision = ledger
                .check_window(principal, "submit", window, 2)
                .await
                .unwrap();
            assert_eq!(decision, WindowDecision::Accept);
        }

        let decision = ledger
            .check_window(principal, "submit", window, 2)
            .await
            .unwrap();
        assert!(matches!(decision, WindowDecision::Deny { .. }));
    }
}

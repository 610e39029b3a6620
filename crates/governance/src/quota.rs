//! Quota Ledger: per-principal, per-API, per-day call caps and a
//! monthly token budget, plus a rolling fixed-window counter for
//! per-endpoint rate limiting.

use async_trait::async_trait;
use resume_spine_shared::PrincipalId;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::GovernanceResult;
use crate::model::{ApiKind, DailyDecision, ExceededReason, WindowDecision};

#[derive(Debug, Clone, Copy)]
pub struct DailyPolicy {
    pub daily_requests: i64,
    pub monthly_tokens: i64,
}

#[async_trait]
pub trait QuotaLedger: Send + Sync {
    async fn check_daily(
        &self,
        principal_id: PrincipalId,
        api_kind: &ApiKind,
        policy: DailyPolicy,
    ) -> GovernanceResult<DailyDecision>;

    /// Atomic upsert: first call of the day inserts, later calls add to
    /// the existing row. Concurrent callers for the same
    /// (principal, api, day) must see the sum of all increments.
    async fn record(
        &self,
        principal_id: PrincipalId,
        api_kind: &ApiKind,
        requests: i64,
        tokens: i64,
    ) -> GovernanceResult<()>;

    async fn check_window(
        &self,
        principal_id: PrincipalId,
        endpoint: &str,
        window_size: std::time::Duration,
        max_in_window: i64,
    ) -> GovernanceResult<WindowDecision>;

    /// Window counters older than `older_than`; daily counters older
    /// than `daily_older_than` days. Used by the Cleanup Orchestrator.
    async fn prune(
        &self,
        window_older_than: std::time::Duration,
        daily_older_than_days: i64,
    ) -> GovernanceResult<(u64, u64)>;
}

pub struct PgQuotaLedger {
    pool: PgPool,
}

impl PgQuotaLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn window_start(now: OffsetDateTime, window_size: std::time::Duration) -> OffsetDateTime {
    let window_secs = window_size.as_secs().max(1) as i64;
    let epoch_secs = now.unix_timestamp();
    let floored = (epoch_secs / window_secs) * window_secs;
    OffsetDateTime::from_unix_timestamp(floored).unwrap_or(now)
}

#[async_trait]
impl QuotaLedger for PgQuotaLedger {
    async fn check_daily(
        &self,
        principal_id: PrincipalId,
        api_kind: &ApiKind,
        policy: DailyPolicy,
    ) -> GovernanceResult<DailyDecision> {
        let today = OffsetDateTime::now_utc().date();

        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT call_count FROM quota_daily
            WHERE principal_id = $1 AND api_kind = $2 AND day = $3
            "#,
        )
        .bind(principal_id)
        .bind(&api_kind.0)
        .bind(today)
        .fetch_optional(&self.pool)
        .await?;
        let call_count = row.map(|r| r.0).unwrap_or(0);

        let month_start = today.replace_day(1).unwrap_or(today);
        let monthly_row: Option<(Option<i64>,)> = sqlx::query_as(
            r#"
            SELECT SUM(token_count) FROM quota_daily
            WHERE principal_id = $1 AND api_kind = $2 AND day >= $3
            "#,
        )
        .bind(principal_id)
        .bind(&api_kind.0)
        .bind(month_start)
        .fetch_optional(&self.pool)
        .await?;
        let token_count = monthly_row.and_then(|r| r.0).unwrap_or(0);

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

        sqlx::query(
            r#"
            INSERT INTO quota_daily (principal_id, api_kind, day, call_count, token_count, last_touched_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (principal_id, api_kind, day)
            DO UPDATE SET
                call_count = quota_daily.call_count + EXCLUDED.call_count,
                token_count = quota_daily.token_count + EXCLUDED.token_count,
                last_touched_at = NOW()
            "#,
        )
        .bind(principal_id)
        .bind(&api_kind.0)
        .bind(today)
        .bind(requests)
        .bind(tokens)
        .execute(&self.pool)
        .await?;

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
        let start = window_start(now, window_size);

        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO quota_window (principal_id, endpoint, window_start, count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (principal_id, endpoint, window_start)
            DO UPDATE SET count = quota_window.count + 1
            RETURNING count
            "#,
        )
        .bind(principal_id)
        .bind(endpoint)
        .bind(start)
        .fetch_one(&self.pool)
        .await?;

        if row.0 > max_in_window {
            let retry_after = (start + window_size - now).whole_seconds().max(0) as u64;
            Ok(WindowDecision::Deny {
                retry_after_secs: retry_after,
            })
        } else {
            Ok(WindowDecision::Accept)
        }
    }

    async fn prune(
        &self,
        window_older_than: std::time::Duration,
        daily_older_than_days: i64,
    ) -> GovernanceResult<(u64, u64)> {
        let window_cutoff = OffsetDateTime::now_utc() - window_older_than;
        let windows_removed = sqlx::query("DELETE FROM quota_window WHERE window_start < $1")
            .bind(window_cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let daily_cutoff = OffsetDateTime::now_utc().date()
            - time::Duration::days(daily_older_than_days);
        let daily_removed = sqlx::query("DELETE FROM quota_daily WHERE day < $1")
            .bind(daily_cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok((windows_removed, daily_removed))
    }
}

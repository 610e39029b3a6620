//! Quota Ledger data model and decision types.

use serde::{Deserialize, Serialize};

/// The API a quota counter or admission check applies to. `"llm"` is
/// the only kind the spine currently charges against, but the type
/// stays open so a future API surface doesn't require a schema change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiKind(pub String);

impl ApiKind {
    pub fn llm() -> Self {
        Self("llm".to_string())
    }
}

impl std::fmt::Display for ApiKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaCounter {
    pub api_kind: ApiKind,
    pub call_count: i64,
    pub token_count: i64,
}

/// Result of `CheckDaily`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DailyDecision {
    Remaining {
        requests_remaining: i64,
        tokens_remaining: i64,
    },
    Exceeded {
        reason: ExceededReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceededReason {
    DailyRequests,
    MonthlyTokens,
}

/// Result of `CheckWindow`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowDecision {
    Accept,
    Deny { retry_after_secs: u64 },
}

//! Job Store data model.

use resume_spine_shared::{JobId, PayloadRef, PrincipalId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub job_id: JobId,
    pub principal_id: PrincipalId,
    pub payload_ref: PayloadRef,
    pub status: JobStatus,
    pub position: i32,
    pub created_at: OffsetDateTime,
    pub started_at: Option<OffsetDateTime>,
    pub completed_at: Option<OffsetDateTime>,
    pub result: Option<serde_json::Value>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub processing_seconds: Option<f64>,
    pub estimated_wait_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnqueueResult {
    pub job_id: JobId,
    pub position: i32,
    pub estimated_wait_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Ok,
    NotFound,
    NoLongerCancellable,
}

/// `estimated-wait-seconds = max(60, 120 * position)`.
pub fn estimate_wait_seconds(position: i32) -> f64 {
    (120 * position as i64).max(60) as f64
}

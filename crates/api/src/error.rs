//! API-edge error type. Maps every domain error into HTTP status codes
//! and JSON bodies: store failures become a generic "temporarily
//! unavailable", auth failures fail closed, and admission denials
//! carry their retry-after hint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use resume_spine_credentials::CredentialError;
use resume_spine_governance::GovernanceError;
use resume_spine_queue::QueueError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("revoked")]
    Revoked,
    #[error("session_expired")]
    SessionExpired,
    #[error("admission denied: {reason}")]
    Denied {
        code: &'static str,
        reason: String,
        retry_after_secs: Option<u64>,
    },
    #[error("job not found")]
    JobNotFound,
    #[error("job no longer cancellable")]
    NotCancellable,
    #[error("payload must not be empty")]
    EmptyPayload,
    #[error("temporarily unavailable: {0}")]
    Storage(String),
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        ApiError::Storage(e.to_string())
    }
}

impl From<GovernanceError> for ApiError {
    fn from(e: GovernanceError) -> Self {
        ApiError::Storage(e.to_string())
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        ApiError::Storage(e.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, retry_after) = match &self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Authentication required".to_string(),
                None,
            ),
            ApiError::Revoked => (
                StatusCode::UNAUTHORIZED,
                "revoked",
                "This credential has been revoked".to_string(),
                None,
            ),
            ApiError::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                "session_expired",
                "Session has expired".to_string(),
                None,
            ),
            ApiError::Denied {
                code,
                reason,
                retry_after_secs,
            } => (StatusCode::TOO_MANY_REQUESTS, *code, reason.clone(), *retry_after_secs),
            ApiError::JobNotFound => (
                StatusCode::NOT_FOUND,
                "not_found",
                "Job not found".to_string(),
                None,
            ),
            ApiError::NotCancellable => (
                StatusCode::CONFLICT,
                "not_cancellable",
                "Job is no longer cancellable".to_string(),
                None,
            ),
            ApiError::EmptyPayload => (
                StatusCode::BAD_REQUEST,
                "empty_payload",
                "Payload must not be empty".to_string(),
                None,
            ),
            ApiError::Storage(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "temporarily_unavailable",
                "The service is temporarily unavailable. Please retry.".to_string(),
                Some(5),
            ),
        };

        tracing::warn!(code = code, status = %status, "Request rejected");

        let body = Json(json!({
            "error": code,
            "message": message,
            "retryAfterSeconds": retry_after,
        }));

        (status, body).into_response()
    }
}

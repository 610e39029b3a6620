//! HTTP surface: `Submit`, `Status`, `Cancel`, `Authenticate`, plus the
//! liveness/readiness endpoints. Thin by design — every decision is
//! delegated to the Admission Controller, Job Store, or Credential
//! Store; handlers only translate HTTP <-> the domain calls.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use resume_spine_governance::{AdmissionDecision, ApiKind, DenyCode, EndpointCategory, EndpointSpec};
use resume_spine_queue::{CancelOutcome, Job, JobStatus};
use resume_spine_shared::{CredentialId, JobId, PayloadRef, PrincipalId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedPrincipal;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/v1/sessions", post(create_session))
        .route("/v1/authenticate", post(authenticate_handler))
        .route("/v1/jobs", post(submit))
        .route("/v1/jobs/:job_id", get(status))
        .route("/v1/jobs/:job_id/cancel", post(cancel))
        .with_state(state)
}

/// Liveness: never touches Admission or storage.
async fn healthz() -> &'static str {
    "ok"
}

/// Readiness: a single lightweight round-trip against the Job Store,
/// since an unreachable database is the one dependency that would make
/// every other endpoint fail.
async fn readyz(State(state): State<AppState>) -> ApiResult<&'static str> {
    state.jobs.peek_next().await?;
    Ok("ready")
}

fn deny_code(code: DenyCode) -> &'static str {
    match code {
        DenyCode::MemoryPressure => "memory_pressure",
        DenyCode::RateLimited => "rate_limited",
        DenyCode::QuotaExhausted => "quota_exhausted",
    }
}

async fn admit(
    state: &AppState,
    endpoint: &EndpointSpec,
    principal_id: PrincipalId,
    api_kind: Option<&ApiKind>,
) -> ApiResult<()> {
    match state.admission.admit(principal_id, endpoint, api_kind).await? {
        AdmissionDecision::Accept => Ok(()),
        AdmissionDecision::Deny {
            code,
            reason,
            retry_after_secs,
        } => Err(ApiError::Denied {
            code: deny_code(code),
            reason,
            retry_after_secs,
        }),
    }
}

// --- Authenticate -----------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    /// Trusted upstream principal identifier. Stands in for an
    /// external OAuth/identity provider; a real deployment fronts this
    /// endpoint with that provider's callback rather than accepting it
    /// directly.
    principal_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    credential: String,
    principal_id: Uuid,
}

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<Json<CreateSessionResponse>> {
    let principal_id = req.principal_id.map(PrincipalId).unwrap_or_default();
    let credential_id = CredentialId(Uuid::new_v4().to_string());

    state
        .credentials
        .create_session(
            principal_id,
            credential_id.clone(),
            state.config.session_ttl,
            state.config.max_sessions_per_principal,
            state.config.revocation_ttl,
        )
        .await?;

    Ok(Json(CreateSessionResponse {
        credential: credential_id.0,
        principal_id: principal_id.0,
    }))
}

#[derive(Debug, Deserialize)]
struct AuthenticateRequest {
    credential: String,
}

#[derive(Debug, Serialize)]
struct AuthenticateResponse {
    principal_id: Uuid,
}

async fn authenticate_handler(
    State(state): State<AppState>,
    Json(req): Json<AuthenticateRequest>,
) -> ApiResult<Json<AuthenticateResponse>> {
    let endpoint = EndpointSpec::new("authenticate", EndpointCategory::Identity, false);
    // Admission has no principal yet to key the window on before the
    // credential resolves, so the window check runs after resolution,
    // against the now-known principal.
    let principal_id = crate::auth::authenticate(&state, &req.credential).await?;
    admit(&state, &endpoint, principal_id, None).await?;

    Ok(Json(AuthenticateResponse {
        principal_id: principal_id.0,
    }))
}

// --- Submit / Status / Cancel ------------------------------------------

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    cleaned_text: String,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    job_id: Uuid,
    position: i32,
    estimated_wait_seconds: f64,
}

async fn submit(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal_id): AuthenticatedPrincipal,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<Json<SubmitResponse>> {
    if req.cleaned_text.trim().is_empty() {
        return Err(ApiError::EmptyPayload);
    }

    let endpoint = EndpointSpec::new("submit", EndpointCategory::Llm, true);
    admit(&state, &endpoint, principal_id, Some(&ApiKind::llm())).await?;

    let payload_ref = PayloadRef(Uuid::new_v4().to_string());
    state.documents.put_text(&payload_ref, &req.cleaned_text).await?;
    state.payload_cache.put(payload_ref.clone(), req.cleaned_text).await;

    let enqueued = state.jobs.enqueue(principal_id, payload_ref).await?;

    tracing::info!(
        principal_id = %principal_id,
        job_id = %enqueued.job_id,
        position = enqueued.position,
        "Job enqueued"
    );

    Ok(Json(SubmitResponse {
        job_id: enqueued.job_id.0,
        position: enqueued.position,
        estimated_wait_seconds: enqueued.estimated_wait_seconds,
    }))
}

#[derive(Debug, Serialize)]
struct JobResponse {
    job_id: Uuid,
    status: JobStatus,
    position: i32,
    result: Option<serde_json::Value>,
    error_kind: Option<String>,
    error_message: Option<String>,
    estimated_wait_seconds: f64,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.job_id.0,
            status: job.status,
            position: job.position,
            result: job.result,
            error_kind: job.error_kind,
            error_message: job.error_message,
            estimated_wait_seconds: job.estimated_wait_seconds,
        }
    }
}

async fn status(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal_id): AuthenticatedPrincipal,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobResponse>> {
    let job = state.jobs.get(JobId(job_id)).await?.ok_or(ApiError::JobNotFound)?;
    if job.principal_id != principal_id {
        return Err(ApiError::JobNotFound);
    }
    Ok(Json(job.into()))
}

async fn cancel(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal_id): AuthenticatedPrincipal,
    Path(job_id): Path<Uuid>,
) -> ApiResult<&'static str> {
    match state.jobs.cancel(JobId(job_id), principal_id).await? {
        CancelOutcome::Ok => {
            state.jobs.recompute_positions().await?;
            Ok("cancelled")
        }
        CancelOutcome::NotFound => Err(ApiError::JobNotFound),
        CancelOutcome::NoLongerCancellable => Err(ApiError::NotCancellable),
    }
}

//! Resolves a credential to a principal-id, exposed both as a standalone
//! endpoint and as an Axum extractor so every principal-scoped handler
//! authenticates the caller the same way.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use resume_spine_shared::{CredentialId, PrincipalId};

use crate::error::ApiError;
use crate::state::AppState;

/// Resolves a credential to a principal-id, touching the session's
/// `last_active_at` on success. Fails closed on any storage error —
/// callers must treat transient errors as authentication failure.
pub async fn authenticate(state: &AppState, credential: &str) -> Result<PrincipalId, ApiError> {
    let credential_id = CredentialId(credential.to_string());

    if state
        .credentials
        .is_revoked(&credential_id)
        .await
        .map_err(|_| ApiError::Unauthenticated)?
    {
        return Err(ApiError::Revoked);
    }

    let session = state
        .credentials
        .find_by_credential(&credential_id)
        .await
        .map_err(|_| ApiError::Unauthenticated)?
        .ok_or(ApiError::Unauthenticated)?;

    if session.is_expired(time::OffsetDateTime::now_utc()) {
        return Err(ApiError::SessionExpired);
    }

    let _ = state.credentials.touch_session(session.session_id).await;

    Ok(session.principal_id)
}

fn extract_bearer(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Extractor: any handler taking `AuthenticatedPrincipal` as an argument
/// requires a valid bearer credential.
pub struct AuthenticatedPrincipal(pub PrincipalId);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let credential = extract_bearer(parts).ok_or(ApiError::Unauthenticated)?;
        let principal_id = authenticate(state, &credential).await?;
        Ok(AuthenticatedPrincipal(principal_id))
    }
}

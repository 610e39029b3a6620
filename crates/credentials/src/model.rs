//! Data model for the Credential Store: Session Record and Revocation
//! List Entry.

use resume_spine_shared::{CredentialId, PrincipalId, SessionId};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub principal_id: PrincipalId,
    pub credential_id: CredentialId,
    pub created_at: OffsetDateTime,
    pub last_active_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl SessionRecord {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationEntry {
    pub credential_id: CredentialId,
    pub revoked_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl RevocationEntry {
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now
    }
}

/// Outcome of `TouchSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchOutcome {
    Ok,
    Gone,
}

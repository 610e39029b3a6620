//! Credential Store error type.

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type CredentialResult<T> = Result<T, CredentialError>;

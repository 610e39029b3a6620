#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("credential store error: {0}")]
    Credential(#[from] resume_spine_credentials::CredentialError),
    #[error("governance error: {0}")]
    Governance(#[from] resume_spine_governance::GovernanceError),
    #[error("queue error: {0}")]
    Queue(#[from] resume_spine_queue::QueueError),
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CleanupResult<T> = Result<T, CleanupError>;

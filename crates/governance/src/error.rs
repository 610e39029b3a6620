#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type GovernanceResult<T> = Result<T, GovernanceError>;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type QueueResult<T> = Result<T, QueueError>;

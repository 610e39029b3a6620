//! Extraction Client failure taxonomy. The engine maps each variant to
//! a fixed user-facing sentence; the raw provider message is never
//! surfaced.

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("provider unreachable")]
    Unavailable,
    #[error("call exceeded deadline")]
    Timeout,
    #[error("quota exhausted")]
    QuotaExhausted,
    #[error("response could not be parsed")]
    ParseFailure,
    #[error("response missing required structural anchors")]
    SchemaFailure,
    #[error("unclassified failure: {0}")]
    Unknown(String),
}

impl ExtractionError {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::QuotaExhausted => "quota_exhausted",
            Self::ParseFailure => "parse_failure",
            Self::SchemaFailure => "schema_failure",
            Self::Unknown(_) => "unknown",
        }
    }
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

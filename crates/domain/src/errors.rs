use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Malformed order payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Order key mismatch: expected {expected}, payload carries {actual}")]
    KeyMismatch { expected: String, actual: String },
}

impl DomainError {
    /// Parse failures are distinct from records that parsed but broke an invariant.
    pub fn is_parse(&self) -> bool {
        matches!(self, DomainError::Parse(_))
    }
}

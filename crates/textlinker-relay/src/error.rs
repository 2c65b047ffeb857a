use thiserror::Error;

/// Failures of relay operations. Each one is terminal for the request that
/// caused it and leaves other tokens untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Text too large ({len} chars, limit {limit})")]
    PayloadTooLarge { len: usize, limit: usize },

    #[error("{0}")]
    Conflict(String),

    #[error("No text found")]
    NotFound,
}

impl RelayError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        RelayError::InvalidInput(msg.into())
    }
}

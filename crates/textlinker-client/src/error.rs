use chrono::Duration;
use thiserror::Error;

/// Why a refresh was not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshBlocked {
    #[error("Upload in progress. Try again in a sec.")]
    UploadInProgress,

    #[error("Please wait a moment after upload before refreshing ({}s left)", .remaining.num_seconds().max(1))]
    Cooldown { remaining: Duration },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network failure: {0}")]
    NetworkFailure(#[from] reqwest::Error),

    #[error("Server returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Server returned unexpected data: {0}")]
    UnexpectedShape(String),

    #[error("Text too large ({0} chars)")]
    PayloadTooLarge(usize),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Upload already in progress for this token")]
    UploadInProgress,

    #[error("Local store failed: {0}")]
    LocalStore(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("QR code failed: {0}")]
    QrCode(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    RefreshBlocked(#[from] RefreshBlocked),
}

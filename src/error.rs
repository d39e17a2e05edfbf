use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedbackError>;

#[derive(Debug, Error)]
pub enum FeedbackError {
    // Caller passed something outside the closed category set
    #[error("invalid category: {0:?} (expected Insatisfeito, Neutro or Satisfeito)")]
    InvalidCategory(String),

    #[error("invalid month filter: {0} (expected 0 for all months or 1-12)")]
    InvalidMonth(u32),

    // Write failed. The in-memory tally keeps its increment.
    #[error("failed to persist ledger to {location}: {reason}")]
    Persistence { location: String, reason: String },

    // Storage exists but cannot be understood
    #[error("failed to read ledger from {location}: {reason}")]
    StorageRead { location: String, reason: String },

    #[error("ledger writer task is no longer running")]
    WriterClosed,

    #[error("configuration error: {0}")]
    Config(String),

    // Votes cannot be taken this session; reports still work
    #[error("voting is unavailable: {0}")]
    LedgerUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FeedbackError {
    pub fn persistence(location: impl Into<String>, reason: impl ToString) -> Self {
        FeedbackError::Persistence {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    pub fn storage_read(location: impl Into<String>, reason: impl ToString) -> Self {
        FeedbackError::StorageRead {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

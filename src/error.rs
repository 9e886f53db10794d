//! Error types for ranking and advisory reranking

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RankError {
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Task '{task_id}' is missing data: {reason}")]
    Data { task_id: String, reason: String },

    #[error("Advisory call for task '{task_id}' timed out after {timeout_secs:.1}s")]
    AdvisoryTimeout { task_id: String, timeout_secs: f64 },

    #[error("Advisory call for task '{task_id}' failed: {reason}")]
    AdvisoryTransport { task_id: String, reason: String },

    #[error("Could not parse advisory response for task '{task_id}': {reason}")]
    AdvisoryParse { task_id: String, reason: String },

    /// Raised instead of falling back when `fallback_on_error` is off
    #[error("Strict mode: {0}")]
    Strict(Box<RankError>),
}

impl RankError {
    /// Whether `fallback_on_error` may absorb this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, RankError::Strict(_))
    }

    pub fn into_strict(self) -> Self {
        match self {
            RankError::Strict(_) => self,
            other => RankError::Strict(Box::new(other)),
        }
    }
}

pub type RankResult<T> = Result<T, RankError>;

//! # Dispatch Error Types

use thiserror::Error;

/// Failure to hand a job to the compute layer
///
/// The orchestrator treats both variants the same way; the split only exists
/// so logs can tell a refusing queue from a broken one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Dispatch rejected: {reason}")]
    Rejected { reason: String },

    #[error("Dispatch transport error: {0}")]
    Transport(String),

    #[error("Job serialization error: {0}")]
    Serialization(String),
}

impl DispatchError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

impl From<sqlx::Error> for DispatchError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => Self::rejected(db_err.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;

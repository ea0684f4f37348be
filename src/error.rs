//! Crate-level error type
//!
//! Each layer has its own error enum; this one unifies them for callers that
//! wire the whole system together.

use crate::config::ConfigurationError;
use crate::messaging::DispatchError;
use crate::orchestration::OrchestrationError;
use crate::repository::RepositoryError;
use crate::services::RuleGenerationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Rule generator error: {0}")]
    RuleGenerator(#[from] RuleGenerationError),

    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),
}

pub type Result<T> = std::result::Result<T, ScreeningError>;

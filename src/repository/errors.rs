use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by batch storage backends
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepositoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Database error: {operation} - {reason}")]
    Database { operation: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepositoryError {
    pub fn batch_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "BatchTask",
            id,
        }
    }

    pub fn sub_task_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "SubTask",
            id,
        }
    }

    /// Wrap a driver error, keeping constraint violations distinguishable
    pub fn database(operation: impl Into<String>, error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.is_unique_violation() || db_error.is_foreign_key_violation() {
                return Self::Constraint(db_error.message().to_string());
            }
        }

        Self::Database {
            operation: operation.into(),
            reason: error.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

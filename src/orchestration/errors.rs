//! # Orchestration Errors
//!
//! Every way a batch operation can fail maps to its own variant so callers
//! can tell "nothing happened" apart from "the batch exists but is stuck".

use crate::messaging::DispatchError;
use crate::repository::RepositoryError;
use crate::services::{RuleGenerationError, ScanError};
use crate::state_machine::{BatchStatus, StateMachineError};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestrationError {
    #[error("Invalid batch request: {0}")]
    InvalidRequest(String),

    #[error("Rule generation failed: {0}")]
    RuleGeneration(#[from] RuleGenerationError),

    #[error("Materials directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("No eligible .{extension} files in {}", .directory.display())]
    NoEligibleFiles { directory: PathBuf, extension: String },

    #[error("Directory scan failed: {0}")]
    ScanFailed(ScanError),

    #[error("Failed to persist batch: {0}")]
    Persistence(RepositoryError),

    /// The batch and its sub-tasks are stored but not every job was accepted
    #[error("Batch {batch_uuid} persisted but {failed} of {total} sub-task dispatches failed")]
    Dispatch {
        batch_uuid: Uuid,
        failed: usize,
        total: usize,
        first_error: DispatchError,
    },

    #[error("Batch {0} not found")]
    NotFound(Uuid),

    #[error("Batch {batch_uuid} is {actual}, expected {expected}")]
    InvalidBatchState {
        batch_uuid: Uuid,
        expected: BatchStatus,
        actual: BatchStatus,
    },

    #[error("State machine error: {0}")]
    StateMachine(#[from] StateMachineError),
}

impl OrchestrationError {
    /// True when rows were written but the batch could not advance
    pub fn is_partial_failure(&self) -> bool {
        matches!(self, Self::Dispatch { .. })
    }

    /// Batch the error refers to, when one was created or looked up
    pub fn batch_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Dispatch { batch_uuid, .. }
            | Self::InvalidBatchState { batch_uuid, .. }
            | Self::NotFound(batch_uuid) => Some(*batch_uuid),
            _ => None,
        }
    }

    /// Stable, machine-readable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::RuleGeneration(_) => "rule_generation_failed",
            Self::DirectoryNotFound(_) => "directory_not_found",
            Self::NoEligibleFiles { .. } => "no_eligible_files",
            Self::ScanFailed(_) => "scan_failed",
            Self::Persistence(_) => "persistence_failed",
            Self::Dispatch { .. } => "dispatch_failed",
            Self::NotFound(_) => "not_found",
            Self::InvalidBatchState { .. } => "invalid_batch_state",
            Self::StateMachine(_) => "state_machine",
        }
    }
}

impl From<RepositoryError> for OrchestrationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { id, .. } => Self::NotFound(id),
            other => Self::Persistence(other),
        }
    }
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

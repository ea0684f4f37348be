//! # Sub-Task Model
//!
//! One per-file unit of work. The `batch_uuid` column is a back-reference used
//! for lookups; ownership stays with the batch (rows cascade on batch delete).

use crate::state_machine::SubTaskStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Persisted sub-task row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SubTask {
    pub sub_task_uuid: Uuid,
    pub batch_uuid: Uuid,
    pub status: SubTaskStatus,
    pub original_file_path: String,
    /// Written by the compute layer after structure optimization
    pub final_optimized_path: Option<String>,
    /// Analysis results written by the compute layer
    pub results: serde_json::Value,
    pub error_message: Option<String>,
    /// Number of dispatch submissions attempted for this sub-task
    pub dispatch_attempts: i32,
    pub last_dispatched_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// New sub-task for creation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewSubTask {
    pub original_file_path: String,
}

impl NewSubTask {
    pub fn new(original_file_path: impl Into<String>) -> Self {
        Self {
            original_file_path: original_file_path.into(),
        }
    }
}

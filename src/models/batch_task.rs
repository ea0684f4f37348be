//! # Batch Task Model
//!
//! A batch is one user-initiated screening request. It exclusively owns its
//! sub-tasks and is only ever persisted together with all of them.
//!
//! ## Database Schema
//!
//! Maps to `screening_batch_tasks`:
//! - `batch_uuid`: Primary key (UUID, generated by the database)
//! - `task_name`: Optional label
//! - `filtering_prompt`: Natural-language request as typed by the user
//! - `generated_rules`: JSONB rule set
//! - `materials_directory`: Directory the sub-tasks were discovered in
//! - `status`: `screening_batch_status` enum

use crate::models::rules::RuleSet;
use crate::models::sub_task::SubTask;
use crate::state_machine::BatchStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Persisted batch row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BatchTask {
    pub batch_uuid: Uuid,
    pub task_name: Option<String>,
    pub filtering_prompt: String,
    #[sqlx(json)]
    pub generated_rules: RuleSet,
    pub materials_directory: String,
    pub status: BatchStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// New batch for creation (identifier and timestamps are assigned by the store)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBatchTask {
    pub task_name: Option<String>,
    pub filtering_prompt: String,
    pub generated_rules: RuleSet,
    pub materials_directory: String,
}

impl NewBatchTask {
    pub fn new(
        task_name: Option<String>,
        filtering_prompt: impl Into<String>,
        generated_rules: RuleSet,
        materials_directory: impl Into<String>,
    ) -> Self {
        Self {
            task_name,
            filtering_prompt: filtering_prompt.into(),
            generated_rules,
            materials_directory: materials_directory.into(),
        }
    }
}

/// A batch together with its complete, ordered sub-task set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchWithSubTasks {
    pub batch: BatchTask,
    pub sub_tasks: Vec<SubTask>,
}

impl BatchWithSubTasks {
    pub fn batch_uuid(&self) -> Uuid {
        self.batch.batch_uuid
    }

    pub fn sub_task_count(&self) -> usize {
        self.sub_tasks.len()
    }

    /// Count sub-tasks currently in the given status
    pub fn count_in_status(&self, status: crate::state_machine::SubTaskStatus) -> usize {
        self.sub_tasks.iter().filter(|s| s.status == status).count()
    }
}

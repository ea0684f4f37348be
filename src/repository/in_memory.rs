//! # In-Memory Batch Repository
//!
//! Thread-safe storage with the same atomicity contract as the PostgreSQL
//! backend. A save validates the complete batch before touching any map and
//! then inserts every row under one write lock, so readers see either nothing
//! or the full batch.

use super::{counts_as_dispatch_attempt, BatchRepository, RepositoryError, RepositoryResult};
use crate::models::{BatchTask, BatchWithSubTasks, NewBatchTask, NewSubTask, SubTask};
use crate::state_machine::{BatchStatus, SubTaskStatus};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Default)]
struct InMemoryState {
    batches: HashMap<Uuid, BatchTask>,
    sub_tasks: HashMap<Uuid, SubTask>,
    /// batch_uuid -> sub-task ids ordered by file path
    batch_sub_tasks: HashMap<Uuid, Vec<Uuid>>,
}

/// In-memory batch repository
#[derive(Debug, Default)]
pub struct InMemoryBatchRepository {
    state: RwLock<InMemoryState>,
}

impl InMemoryBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored batches
    pub fn batch_count(&self) -> usize {
        self.state.read().batches.len()
    }

    /// Number of stored sub-tasks across all batches
    pub fn sub_task_count(&self) -> usize {
        self.state.read().sub_tasks.len()
    }

    fn validate_new_batch(sub_tasks: &[NewSubTask]) -> RepositoryResult<()> {
        if sub_tasks.is_empty() {
            return Err(RepositoryError::Constraint(
                "a batch must own at least one sub-task".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(sub_tasks.len());
        for sub_task in sub_tasks {
            if !seen.insert(sub_task.original_file_path.as_str()) {
                return Err(RepositoryError::Constraint(format!(
                    "duplicate sub-task file path in batch: {}",
                    sub_task.original_file_path
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl BatchRepository for InMemoryBatchRepository {
    async fn save_batch_with_sub_tasks(
        &self,
        batch: NewBatchTask,
        sub_tasks: Vec<NewSubTask>,
    ) -> RepositoryResult<BatchWithSubTasks> {
        Self::validate_new_batch(&sub_tasks)?;

        let now = Utc::now().naive_utc();
        let batch_row = BatchTask {
            batch_uuid: Uuid::new_v4(),
            task_name: batch.task_name,
            filtering_prompt: batch.filtering_prompt,
            generated_rules: batch.generated_rules,
            materials_directory: batch.materials_directory,
            status: BatchStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let mut sub_task_rows: Vec<SubTask> = sub_tasks
            .into_iter()
            .map(|new_sub_task| SubTask {
                sub_task_uuid: Uuid::new_v4(),
                batch_uuid: batch_row.batch_uuid,
                status: SubTaskStatus::Pending,
                original_file_path: new_sub_task.original_file_path,
                final_optimized_path: None,
                results: serde_json::json!({}),
                error_message: None,
                dispatch_attempts: 0,
                last_dispatched_at: None,
                created_at: now,
                updated_at: now,
            })
            .collect();
        sub_task_rows.sort_by(|a, b| a.original_file_path.cmp(&b.original_file_path));

        let mut state = self.state.write();
        state.batch_sub_tasks.insert(
            batch_row.batch_uuid,
            sub_task_rows.iter().map(|s| s.sub_task_uuid).collect(),
        );
        for sub_task in &sub_task_rows {
            state.sub_tasks.insert(sub_task.sub_task_uuid, sub_task.clone());
        }
        state.batches.insert(batch_row.batch_uuid, batch_row.clone());

        Ok(BatchWithSubTasks {
            batch: batch_row,
            sub_tasks: sub_task_rows,
        })
    }

    async fn get_batch(&self, batch_uuid: Uuid) -> RepositoryResult<BatchTask> {
        self.state
            .read()
            .batches
            .get(&batch_uuid)
            .cloned()
            .ok_or_else(|| RepositoryError::batch_not_found(batch_uuid))
    }

    async fn get_sub_tasks_for_batch(&self, batch_uuid: Uuid) -> RepositoryResult<Vec<SubTask>> {
        let state = self.state.read();
        let ids = state
            .batch_sub_tasks
            .get(&batch_uuid)
            .ok_or_else(|| RepositoryError::batch_not_found(batch_uuid))?;

        Ok(ids
            .iter()
            .filter_map(|id| state.sub_tasks.get(id).cloned())
            .collect())
    }

    async fn transition_batch_status(
        &self,
        batch_uuid: Uuid,
        expected: BatchStatus,
        to: BatchStatus,
    ) -> RepositoryResult<bool> {
        let mut state = self.state.write();
        let batch = state
            .batches
            .get_mut(&batch_uuid)
            .ok_or_else(|| RepositoryError::batch_not_found(batch_uuid))?;

        if batch.status != expected {
            return Ok(false);
        }

        batch.status = to;
        batch.updated_at = Utc::now().naive_utc();
        Ok(true)
    }

    async fn transition_sub_task_status(
        &self,
        sub_task_uuid: Uuid,
        expected: &[SubTaskStatus],
        to: SubTaskStatus,
        error_message: Option<String>,
    ) -> RepositoryResult<bool> {
        let mut state = self.state.write();
        let sub_task = state
            .sub_tasks
            .get_mut(&sub_task_uuid)
            .ok_or_else(|| RepositoryError::sub_task_not_found(sub_task_uuid))?;

        if !expected.contains(&sub_task.status) {
            return Ok(false);
        }

        let now = Utc::now().naive_utc();
        sub_task.status = to;
        sub_task.error_message = error_message;
        sub_task.updated_at = now;
        if counts_as_dispatch_attempt(to) {
            sub_task.dispatch_attempts += 1;
            sub_task.last_dispatched_at = Some(now);
        }

        Ok(true)
    }

    async fn list_batches_by_status(
        &self,
        statuses: &[BatchStatus],
    ) -> RepositoryResult<Vec<BatchTask>> {
        let state = self.state.read();
        let mut batches: Vec<BatchTask> = state
            .batches
            .values()
            .filter(|b| statuses.contains(&b.status))
            .cloned()
            .collect();
        batches.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.batch_uuid.cmp(&b.batch_uuid))
        });
        Ok(batches)
    }
}

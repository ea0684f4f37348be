//! # Batch Repository
//!
//! Durable storage contract for batches and their sub-tasks.
//!
//! The one hard guarantee is that `save_batch_with_sub_tasks` is atomic: a
//! reader can never observe a batch without its full sub-task set, and a failed
//! save leaves nothing behind. Two backends implement the contract:
//!
//! - [`PostgresBatchRepository`] - sqlx transactions against PostgreSQL
//! - [`InMemoryBatchRepository`] - lock-protected maps for embedding and tests

pub mod errors;
pub mod in_memory;
pub mod postgres;

pub use errors::{RepositoryError, RepositoryResult};
pub use in_memory::InMemoryBatchRepository;
pub use postgres::PostgresBatchRepository;

use crate::models::{BatchTask, BatchWithSubTasks, NewBatchTask, NewSubTask, SubTask};
use crate::state_machine::{BatchStatus, SubTaskStatus};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait BatchRepository: Send + Sync + 'static {
    /// Persist a batch and all of its sub-tasks in a single transaction
    ///
    /// Identifiers and timestamps are assigned here. The batch is stored as
    /// `Pending` and every sub-task as `Pending`; sub-tasks are returned
    /// ordered by file path.
    async fn save_batch_with_sub_tasks(
        &self,
        batch: NewBatchTask,
        sub_tasks: Vec<NewSubTask>,
    ) -> RepositoryResult<BatchWithSubTasks>;

    /// Fetch a batch row
    async fn get_batch(&self, batch_uuid: Uuid) -> RepositoryResult<BatchTask>;

    /// Fetch every sub-task of a batch, ordered by file path
    async fn get_sub_tasks_for_batch(&self, batch_uuid: Uuid) -> RepositoryResult<Vec<SubTask>>;

    /// Compare-and-set a batch status
    ///
    /// The row is only written while its current status is still `expected`.
    /// Returns `Ok(false)` when the batch exists but another writer moved it.
    async fn transition_batch_status(
        &self,
        batch_uuid: Uuid,
        expected: BatchStatus,
        to: BatchStatus,
    ) -> RepositoryResult<bool>;

    /// Compare-and-set a sub-task status
    ///
    /// The row is only written when its current status is one of `expected`.
    /// Returns `Ok(false)` when the sub-task exists but has moved on. Moving
    /// to `Dispatched` or `DispatchFailed` also bumps the dispatch counters.
    async fn transition_sub_task_status(
        &self,
        sub_task_uuid: Uuid,
        expected: &[SubTaskStatus],
        to: SubTaskStatus,
        error_message: Option<String>,
    ) -> RepositoryResult<bool>;

    /// List batches currently in any of the given statuses, oldest first
    async fn list_batches_by_status(
        &self,
        statuses: &[BatchStatus],
    ) -> RepositoryResult<Vec<BatchTask>>;

    /// Fetch a batch together with its sub-tasks
    async fn get_batch_with_sub_tasks(
        &self,
        batch_uuid: Uuid,
    ) -> RepositoryResult<BatchWithSubTasks> {
        let batch = self.get_batch(batch_uuid).await?;
        let sub_tasks = self.get_sub_tasks_for_batch(batch_uuid).await?;
        Ok(BatchWithSubTasks { batch, sub_tasks })
    }
}

/// Whether a sub-task status write records a dispatch attempt
pub(crate) fn counts_as_dispatch_attempt(to: SubTaskStatus) -> bool {
    matches!(to, SubTaskStatus::Dispatched | SubTaskStatus::DispatchFailed)
}

//! # PostgreSQL Batch Repository
//!
//! sqlx-backed storage. Batch creation runs in one transaction: the batch row
//! and every sub-task row are inserted before the commit, so a failure at any
//! point drops the transaction and rolls everything back.

use super::{counts_as_dispatch_attempt, BatchRepository, RepositoryError, RepositoryResult};
use crate::models::{BatchTask, BatchWithSubTasks, NewBatchTask, NewSubTask, SubTask};
use crate::state_machine::{BatchStatus, SubTaskStatus};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

const BATCH_COLUMNS: &str = "batch_uuid, task_name, filtering_prompt, generated_rules, \
     materials_directory, status, created_at, updated_at";

const SUB_TASK_COLUMNS: &str = "sub_task_uuid, batch_uuid, status, original_file_path, \
     final_optimized_path, results, error_message, dispatch_attempts, last_dispatched_at, \
     created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresBatchRepository {
    pool: PgPool,
}

impl PostgresBatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn batch_exists(&self, batch_uuid: Uuid) -> RepositoryResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM screening_batch_tasks WHERE batch_uuid = $1)",
        )
        .bind(batch_uuid)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::database("check batch existence", e))
    }
}

#[async_trait]
impl BatchRepository for PostgresBatchRepository {
    #[instrument(skip(self, batch, sub_tasks), fields(sub_task_count = sub_tasks.len()))]
    async fn save_batch_with_sub_tasks(
        &self,
        batch: NewBatchTask,
        sub_tasks: Vec<NewSubTask>,
    ) -> RepositoryResult<BatchWithSubTasks> {
        if sub_tasks.is_empty() {
            return Err(RepositoryError::Constraint(
                "a batch must own at least one sub-task".to_string(),
            ));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::database("begin transaction", e))?;

        let batch_row = sqlx::query_as::<_, BatchTask>(&format!(
            r#"
            INSERT INTO screening_batch_tasks
                (task_name, filtering_prompt, generated_rules, materials_directory, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING {BATCH_COLUMNS}
            "#
        ))
        .bind(&batch.task_name)
        .bind(&batch.filtering_prompt)
        .bind(Json(&batch.generated_rules))
        .bind(&batch.materials_directory)
        .bind(BatchStatus::Pending)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::database("insert batch", e))?;

        debug!(batch_uuid = %batch_row.batch_uuid, "Inserted batch row in transaction");

        let paths: Vec<String> = sub_tasks
            .into_iter()
            .map(|s| s.original_file_path)
            .collect();

        let mut sub_task_rows = sqlx::query_as::<_, SubTask>(&format!(
            r#"
            INSERT INTO screening_sub_tasks
                (batch_uuid, original_file_path, status, created_at, updated_at)
            SELECT $1, path, $3, NOW(), NOW()
            FROM UNNEST($2::text[]) AS t(path)
            RETURNING {SUB_TASK_COLUMNS}
            "#
        ))
        .bind(batch_row.batch_uuid)
        .bind(&paths)
        .bind(SubTaskStatus::Pending)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| RepositoryError::database("insert sub-tasks", e))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::database("commit transaction", e))?;

        sub_task_rows.sort_by(|a, b| a.original_file_path.cmp(&b.original_file_path));

        debug!(
            batch_uuid = %batch_row.batch_uuid,
            sub_task_count = sub_task_rows.len(),
            "Committed batch with sub-tasks"
        );

        Ok(BatchWithSubTasks {
            batch: batch_row,
            sub_tasks: sub_task_rows,
        })
    }

    async fn get_batch(&self, batch_uuid: Uuid) -> RepositoryResult<BatchTask> {
        sqlx::query_as::<_, BatchTask>(&format!(
            "SELECT {BATCH_COLUMNS} FROM screening_batch_tasks WHERE batch_uuid = $1"
        ))
        .bind(batch_uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::database("get batch", e))?
        .ok_or_else(|| RepositoryError::batch_not_found(batch_uuid))
    }

    async fn get_sub_tasks_for_batch(&self, batch_uuid: Uuid) -> RepositoryResult<Vec<SubTask>> {
        let rows = sqlx::query_as::<_, SubTask>(&format!(
            r#"
            SELECT {SUB_TASK_COLUMNS}
            FROM screening_sub_tasks
            WHERE batch_uuid = $1
            ORDER BY original_file_path
            "#
        ))
        .bind(batch_uuid)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::database("get sub-tasks for batch", e))?;

        // Batches never exist without sub-tasks, so an empty result needs a second look
        if rows.is_empty() && !self.batch_exists(batch_uuid).await? {
            return Err(RepositoryError::batch_not_found(batch_uuid));
        }

        Ok(rows)
    }

    async fn transition_batch_status(
        &self,
        batch_uuid: Uuid,
        expected: BatchStatus,
        to: BatchStatus,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE screening_batch_tasks
            SET status = $2, updated_at = NOW()
            WHERE batch_uuid = $1
              AND status = $3
            "#,
        )
        .bind(batch_uuid)
        .bind(to)
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::database("transition batch status", e))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        if self.batch_exists(batch_uuid).await? {
            debug!(batch_uuid = %batch_uuid, expected = %expected, "Batch status already moved on");
            Ok(false)
        } else {
            Err(RepositoryError::batch_not_found(batch_uuid))
        }
    }

    async fn transition_sub_task_status(
        &self,
        sub_task_uuid: Uuid,
        expected: &[SubTaskStatus],
        to: SubTaskStatus,
        error_message: Option<String>,
    ) -> RepositoryResult<bool> {
        let expected: Vec<String> = expected.iter().map(ToString::to_string).collect();

        let result = sqlx::query(
            r#"
            UPDATE screening_sub_tasks
            SET status = $2,
                error_message = $3,
                dispatch_attempts = dispatch_attempts + CASE WHEN $4 THEN 1 ELSE 0 END,
                last_dispatched_at = CASE WHEN $4 THEN NOW() ELSE last_dispatched_at END,
                updated_at = NOW()
            WHERE sub_task_uuid = $1
              AND status::text = ANY($5)
            "#,
        )
        .bind(sub_task_uuid)
        .bind(to)
        .bind(error_message)
        .bind(counts_as_dispatch_attempt(to))
        .bind(&expected)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::database("transition sub-task status", e))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM screening_sub_tasks WHERE sub_task_uuid = $1)",
        )
        .bind(sub_task_uuid)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::database("check sub-task existence", e))?;

        if exists {
            Ok(false)
        } else {
            Err(RepositoryError::sub_task_not_found(sub_task_uuid))
        }
    }

    async fn list_batches_by_status(
        &self,
        statuses: &[BatchStatus],
    ) -> RepositoryResult<Vec<BatchTask>> {
        let statuses: Vec<String> = statuses.iter().map(ToString::to_string).collect();

        sqlx::query_as::<_, BatchTask>(&format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM screening_batch_tasks
            WHERE status::text = ANY($1)
            ORDER BY created_at, batch_uuid
            "#
        ))
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::database("list batches by status", e))
    }
}

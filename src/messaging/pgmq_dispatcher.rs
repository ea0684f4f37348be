//! # pgmq Dispatcher
//!
//! Sends jobs through the pgmq extension using the application's own
//! connection pool, so no second client or connection string is needed.

use super::dispatcher::{DispatchReceipt, Dispatcher};
use super::errors::{DispatchError, DispatchResult};
use super::message::JobMessage;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

/// Queue for per-file analysis jobs
pub const ANALYSIS_QUEUE: &str = "screening_analysis";
/// Queue for batch-level second filter jobs
pub const SECOND_FILTER_QUEUE: &str = "screening_second_filter";

#[derive(Debug, Clone)]
pub struct PgmqDispatcher {
    pool: PgPool,
    analysis_queue: String,
    second_filter_queue: String,
}

impl PgmqDispatcher {
    pub fn new(pool: PgPool) -> Self {
        Self::with_queues(pool, ANALYSIS_QUEUE, SECOND_FILTER_QUEUE)
    }

    pub fn with_queues(
        pool: PgPool,
        analysis_queue: impl Into<String>,
        second_filter_queue: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            analysis_queue: analysis_queue.into(),
            second_filter_queue: second_filter_queue.into(),
        }
    }

    pub fn analysis_queue(&self) -> &str {
        &self.analysis_queue
    }

    pub fn second_filter_queue(&self) -> &str {
        &self.second_filter_queue
    }

    /// Create both queues if they do not exist yet (`pgmq.create` is idempotent)
    pub async fn ensure_queues(&self) -> DispatchResult<()> {
        for queue_name in [&self.analysis_queue, &self.second_filter_queue] {
            debug!(queue = %queue_name, "Ensuring pgmq queue exists");
            sqlx::query("SELECT pgmq.create($1)")
                .bind(queue_name)
                .execute(&self.pool)
                .await
                .map_err(|e| DispatchError::transport(format!("create queue {queue_name}: {e}")))?;
        }

        info!(
            analysis_queue = %self.analysis_queue,
            second_filter_queue = %self.second_filter_queue,
            "pgmq queues ready"
        );
        Ok(())
    }

    async fn send(&self, queue_name: &str, message: &JobMessage) -> DispatchResult<DispatchReceipt> {
        let payload = message.to_json()?;

        let row = sqlx::query("SELECT pgmq.send($1, $2) AS msg_id")
            .bind(queue_name)
            .bind(payload)
            .fetch_one(&self.pool)
            .await?;
        let message_id: i64 = row.try_get("msg_id")?;

        debug!(
            queue = %queue_name,
            message_id,
            job_type = message.job_type(),
            "Job enqueued"
        );
        Ok(DispatchReceipt::new(message_id, queue_name))
    }
}

#[async_trait]
impl Dispatcher for PgmqDispatcher {
    async fn submit(&self, sub_task_uuid: Uuid, file_path: &str) -> DispatchResult<DispatchReceipt> {
        let message = JobMessage::analyze(sub_task_uuid, file_path);
        self.send(&self.analysis_queue, &message).await
    }

    async fn submit_second_filter(&self, batch_uuid: Uuid) -> DispatchResult<DispatchReceipt> {
        let message = JobMessage::second_filter(batch_uuid);
        self.send(&self.second_filter_queue, &message).await
    }

    fn provider_name(&self) -> &'static str {
        "pgmq"
    }
}

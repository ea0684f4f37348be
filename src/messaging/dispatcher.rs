//! # Dispatcher Boundary

use super::errors::DispatchResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Acknowledgement that a job was accepted by the queue
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReceipt {
    pub message_id: i64,
    pub queue_name: String,
    pub accepted_at: DateTime<Utc>,
}

impl DispatchReceipt {
    pub fn new(message_id: i64, queue_name: impl Into<String>) -> Self {
        Self {
            message_id,
            queue_name: queue_name.into(),
            accepted_at: Utc::now(),
        }
    }
}

/// Hands work to the compute layer
///
/// Implementations must be safe to call concurrently; the orchestrator
/// submits sibling sub-tasks in parallel.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    /// Submit the analysis job for one sub-task
    async fn submit(&self, sub_task_uuid: Uuid, file_path: &str) -> DispatchResult<DispatchReceipt>;

    /// Submit the batch-level second filter job
    async fn submit_second_filter(&self, batch_uuid: Uuid) -> DispatchResult<DispatchReceipt>;

    /// Name used in logs
    fn provider_name(&self) -> &'static str;
}

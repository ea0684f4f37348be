//! # Dispatch Reconciler
//!
//! Recovers batches that were persisted but never fully dispatched. Only
//! sub-tasks still in `pending` or `dispatch_failed` are re-submitted; jobs
//! that were accepted before are left alone.
//!
//! Delivery is at-least-once: if a submission was accepted but recording it
//! failed, the sub-task still looks dispatchable and will be submitted again.
//!
//! A batch whose outstanding sub-tasks have already used up
//! `max_dispatch_attempts` is abandoned (`Pending -> Failed`) instead of being
//! submitted again.

use super::batch_transition::apply_batch_event;
use super::errors::{OrchestrationError, OrchestrationResult};
use super::sub_task_dispatch::dispatch_sub_tasks;
use crate::logging::log_batch_operation;
use crate::messaging::Dispatcher;
use crate::models::SubTask;
use crate::repository::BatchRepository;
use crate::state_machine::{BatchEvent, BatchStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Outcome of re-driving one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedriveResult {
    pub batch_uuid: Uuid,
    /// Sub-tasks submitted in this pass
    pub redriven: usize,
    pub batch_status: BatchStatus,
}

/// Outcome of a sweep over stale pending batches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub examined: usize,
    pub advanced: usize,
    pub abandoned: usize,
    pub still_pending: usize,
}

pub struct DispatchReconciler {
    repository: Arc<dyn BatchRepository>,
    dispatcher: Arc<dyn Dispatcher>,
    dispatch_concurrency: usize,
    stale_after: Duration,
    max_dispatch_attempts: u32,
}

impl DispatchReconciler {
    pub fn new(
        repository: Arc<dyn BatchRepository>,
        dispatcher: Arc<dyn Dispatcher>,
        dispatch_concurrency: usize,
        stale_after: Duration,
        max_dispatch_attempts: u32,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            dispatch_concurrency,
            stale_after,
            max_dispatch_attempts,
        }
    }

    /// Re-submit the undispatched sub-tasks of a pending batch
    #[instrument(skip(self))]
    pub async fn redrive_batch(&self, batch_uuid: Uuid) -> OrchestrationResult<RedriveResult> {
        let batch = self.repository.get_batch_with_sub_tasks(batch_uuid).await?;
        if batch.batch.status != BatchStatus::Pending {
            return Err(OrchestrationError::InvalidBatchState {
                batch_uuid,
                expected: BatchStatus::Pending,
                actual: batch.batch.status,
            });
        }

        let outstanding: Vec<SubTask> = batch
            .sub_tasks
            .into_iter()
            .filter(|sub_task| sub_task.status.is_dispatchable())
            .collect();

        let exhausted = outstanding
            .iter()
            .filter(|sub_task| self.attempts_exhausted(sub_task))
            .count();
        if exhausted > 0 {
            return self.abandon(batch_uuid, exhausted).await;
        }

        let summary = dispatch_sub_tasks(
            self.repository.as_ref(),
            self.dispatcher.as_ref(),
            batch_uuid,
            &outstanding,
            self.dispatch_concurrency,
        )
        .await;

        if let Some(first_error) = summary.first_error {
            warn!(
                batch_uuid = %batch_uuid,
                failed = summary.failed,
                total = summary.total,
                "Re-drive left batch pending"
            );
            return Err(OrchestrationError::Dispatch {
                batch_uuid,
                failed: summary.failed,
                total: summary.total,
                first_error,
            });
        }

        let batch_status = apply_batch_event(
            self.repository.as_ref(),
            batch_uuid,
            BatchStatus::Pending,
            &BatchEvent::DispatchConfirmed,
        )
        .await?;

        log_batch_operation(
            "redrive_batch",
            Some(batch_uuid),
            &batch_status.to_string(),
            Some(outstanding.len()),
            None,
        );

        Ok(RedriveResult {
            batch_uuid,
            redriven: outstanding.len(),
            batch_status,
        })
    }

    fn attempts_exhausted(&self, sub_task: &SubTask) -> bool {
        i64::from(sub_task.dispatch_attempts) >= i64::from(self.max_dispatch_attempts)
    }

    /// Fail a pending batch that can no longer be dispatched
    async fn abandon(&self, batch_uuid: Uuid, exhausted: usize) -> OrchestrationResult<RedriveResult> {
        let event = BatchEvent::Abandon(format!(
            "{exhausted} sub-tasks reached {} dispatch attempts",
            self.max_dispatch_attempts
        ));
        let batch_status =
            apply_batch_event(self.repository.as_ref(), batch_uuid, BatchStatus::Pending, &event)
                .await?;

        log_batch_operation(
            "abandon_batch",
            Some(batch_uuid),
            &batch_status.to_string(),
            Some(exhausted),
            event.error_message(),
        );

        Ok(RedriveResult {
            batch_uuid,
            redriven: 0,
            batch_status,
        })
    }

    /// Re-drive every pending batch older than the staleness threshold
    ///
    /// Younger batches may still be inside their own `create_batch` call and
    /// are skipped.
    pub async fn redrive_stalled(&self) -> OrchestrationResult<ReconciliationSummary> {
        let cutoff = Utc::now().naive_utc()
            - chrono::Duration::from_std(self.stale_after).unwrap_or_else(|_| chrono::Duration::zero());
        let pending = self
            .repository
            .list_batches_by_status(&[BatchStatus::Pending])
            .await?;

        let mut summary = ReconciliationSummary::default();
        for batch in pending.into_iter().filter(|b| b.created_at <= cutoff) {
            summary.examined += 1;
            match self.redrive_batch(batch.batch_uuid).await {
                Ok(result) => match result.batch_status {
                    BatchStatus::Processing => summary.advanced += 1,
                    BatchStatus::Failed => summary.abandoned += 1,
                    _ => summary.still_pending += 1,
                },
                Err(e) if e.is_partial_failure() => summary.still_pending += 1,
                Err(OrchestrationError::InvalidBatchState { .. }) => {
                    // advanced concurrently
                }
                Err(e) => {
                    error!(batch_uuid = %batch.batch_uuid, error = %e, "Re-drive failed");
                    summary.still_pending += 1;
                }
            }
        }

        info!(
            examined = summary.examined,
            advanced = summary.advanced,
            abandoned = summary.abandoned,
            still_pending = summary.still_pending,
            "Stale pending batches reconciled"
        );
        Ok(summary)
    }
}

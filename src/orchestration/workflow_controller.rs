//! # Workflow Controller
//!
//! Periodic pass over in-flight batches. It advances a batch when its
//! sub-tasks, driven by the compute layer, reach a batch-level milestone:
//!
//! - every open sub-task of a `Processing` batch waits at the second filter,
//!   so the batch-level second filter job is submitted and the batch moves to
//!   `AwaitingSecondFilter`;
//! - every sub-task is terminal, so the batch is closed from either in-flight
//!   status as completed, partially completed or failed.
//!
//! Every status write is a compare-and-set on the status read at the start of
//! the pass. A batch another writer moved in the meantime is left alone.

use super::batch_transition::apply_batch_event;
use super::errors::{OrchestrationError, OrchestrationResult};
use crate::logging::{log_batch_operation, log_error};
use crate::messaging::Dispatcher;
use crate::models::BatchTask;
use crate::repository::BatchRepository;
use crate::state_machine::{BatchEvent, BatchStateMachine, BatchStatus, SubTaskStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What one controller pass did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerPassSummary {
    pub examined: usize,
    pub second_filter_submitted: usize,
    pub completed: usize,
    pub partially_completed: usize,
    pub failed: usize,
    pub errors: usize,
}

pub struct WorkflowController {
    repository: Arc<dyn BatchRepository>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl WorkflowController {
    pub fn new(repository: Arc<dyn BatchRepository>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            repository,
            dispatcher,
        }
    }

    /// Examine every in-flight batch once
    pub async fn run_once(&self) -> OrchestrationResult<ControllerPassSummary> {
        let batches = self
            .repository
            .list_batches_by_status(&BatchStatus::IN_FLIGHT)
            .await?;

        let mut summary = ControllerPassSummary::default();
        for batch in batches {
            summary.examined += 1;
            match self.advance_batch(&batch, &mut summary).await {
                Ok(()) => {}
                Err(OrchestrationError::InvalidBatchState { .. }) => {
                    // moved by another writer since the listing
                }
                Err(e) => {
                    summary.errors += 1;
                    log_error(
                        "workflow_controller",
                        "advance_batch",
                        &e.to_string(),
                        Some(&batch.batch_uuid.to_string()),
                    );
                }
            }
        }

        if summary.examined > 0 {
            debug!(?summary, "Controller pass finished");
        }
        Ok(summary)
    }

    /// Run passes on a fixed interval until `shutdown` flips to `true`
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_ms = interval.as_millis() as u64, "Workflow controller started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        warn!(error = %e, "Controller pass failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Workflow controller stopped");
    }

    async fn advance_batch(
        &self,
        batch: &BatchTask,
        summary: &mut ControllerPassSummary,
    ) -> OrchestrationResult<()> {
        let statuses: Vec<SubTaskStatus> = self
            .repository
            .get_sub_tasks_for_batch(batch.batch_uuid)
            .await?
            .into_iter()
            .map(|sub_task| sub_task.status)
            .collect();

        if let Some(event) = BatchStateMachine::completion_event(&statuses) {
            let target =
                apply_batch_event(self.repository.as_ref(), batch.batch_uuid, batch.status, &event)
                    .await?;
            match target {
                BatchStatus::Completed => summary.completed += 1,
                BatchStatus::PartiallyCompleted => summary.partially_completed += 1,
                _ => summary.failed += 1,
            }
            log_batch_operation(
                "complete_batch",
                Some(batch.batch_uuid),
                &target.to_string(),
                Some(statuses.len()),
                event.error_message(),
            );
            return Ok(());
        }

        if batch.status == BatchStatus::Processing
            && BatchStateMachine::ready_for_second_filter(&statuses)
        {
            self.start_second_filter(batch.batch_uuid).await?;
            summary.second_filter_submitted += 1;
        }

        Ok(())
    }

    /// Move to `AwaitingSecondFilter` and submit the batch-level job
    ///
    /// If the submission fails the batch goes back to `Processing` so the next
    /// pass tries again.
    async fn start_second_filter(&self, batch_uuid: Uuid) -> OrchestrationResult<()> {
        let awaiting = apply_batch_event(
            self.repository.as_ref(),
            batch_uuid,
            BatchStatus::Processing,
            &BatchEvent::AwaitSecondFilter,
        )
        .await?;

        match self.dispatcher.submit_second_filter(batch_uuid).await {
            Ok(receipt) => {
                log_batch_operation(
                    "submit_second_filter",
                    Some(batch_uuid),
                    &awaiting.to_string(),
                    None,
                    Some(&format!("message_id={}", receipt.message_id)),
                );
                Ok(())
            }
            Err(dispatch_error) => {
                warn!(
                    batch_uuid = %batch_uuid,
                    error = %dispatch_error,
                    "Second filter submission failed; returning batch to processing"
                );
                apply_batch_event(
                    self.repository.as_ref(),
                    batch_uuid,
                    awaiting,
                    &BatchEvent::ResumeProcessing,
                )
                .await?;
                Err(OrchestrationError::Dispatch {
                    batch_uuid,
                    failed: 1,
                    total: 1,
                    first_error: dispatch_error,
                })
            }
        }
    }
}

//! # Sub-Task Dispatch
//!
//! Submits a set of sibling sub-tasks and records each outcome on the
//! sub-task row. Used both right after batch creation and when re-driving a
//! batch that was left `Pending`.

use crate::logging::log_dispatch_operation;
use crate::messaging::{DispatchError, Dispatcher};
use crate::models::SubTask;
use crate::repository::BatchRepository;
use crate::state_machine::{SubTaskEvent, SubTaskStateMachine};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

/// Aggregate result of one dispatch round
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DispatchSummary {
    pub total: usize,
    pub accepted: usize,
    pub failed: usize,
    pub first_error: Option<DispatchError>,
}

impl DispatchSummary {
    pub fn all_accepted(&self) -> bool {
        self.failed == 0
    }
}

/// Submit every sub-task with at most `concurrency` submissions in flight
///
/// Dispatch outcomes are written with a compare-and-set on the dispatchable
/// states, so a worker that already picked the job up is never overwritten.
/// A failed status write is logged and does not change the summary: the
/// queue's answer is what decides whether the batch may advance.
pub(crate) async fn dispatch_sub_tasks(
    repository: &dyn BatchRepository,
    dispatcher: &dyn Dispatcher,
    batch_uuid: Uuid,
    sub_tasks: &[SubTask],
    concurrency: usize,
) -> DispatchSummary {
    let dispatches: Vec<_> = sub_tasks
        .iter()
        .map(|sub_task| async move {
            let outcome = dispatcher
                .submit(sub_task.sub_task_uuid, &sub_task.original_file_path)
                .await
                .map(|receipt| {
                    debug!(
                        batch_uuid = %batch_uuid,
                        sub_task_uuid = %sub_task.sub_task_uuid,
                        message_id = receipt.message_id,
                        queue = %receipt.queue_name,
                        "Sub-task accepted"
                    );
                });

            let event = match &outcome {
                Ok(()) => SubTaskEvent::DispatchAccepted,
                Err(e) => {
                    warn!(
                        batch_uuid = %batch_uuid,
                        sub_task_uuid = %sub_task.sub_task_uuid,
                        file_path = %sub_task.original_file_path,
                        error = %e,
                        "Sub-task dispatch failed"
                    );
                    SubTaskEvent::DispatchRejected(e.to_string())
                }
            };
            record_outcome(repository, sub_task.sub_task_uuid, &event).await;
            outcome
        })
        .collect();
    let outcomes: Vec<Result<(), DispatchError>> = stream::iter(dispatches)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut summary = DispatchSummary {
        total: outcomes.len(),
        ..DispatchSummary::default()
    };
    for outcome in outcomes {
        match outcome {
            Ok(()) => summary.accepted += 1,
            Err(e) => {
                summary.failed += 1;
                summary.first_error.get_or_insert(e);
            }
        }
    }

    log_dispatch_operation(
        "dispatch_sub_tasks",
        batch_uuid,
        dispatcher.provider_name(),
        summary.accepted,
        summary.failed,
    );
    summary
}

async fn record_outcome(repository: &dyn BatchRepository, sub_task_uuid: Uuid, event: &SubTaskEvent) {
    let result = repository
        .transition_sub_task_status(
            sub_task_uuid,
            SubTaskStateMachine::source_states(event),
            SubTaskStateMachine::target_state(event),
            event.error_message().map(str::to_string),
        )
        .await;

    match result {
        Ok(true) => {}
        Ok(false) => debug!(
            sub_task_uuid = %sub_task_uuid,
            event = event.event_type(),
            "Sub-task already advanced by a worker; dispatch outcome not recorded"
        ),
        Err(e) => warn!(
            sub_task_uuid = %sub_task_uuid,
            event = event.event_type(),
            error = %e,
            "Failed to record dispatch outcome"
        ),
    }
}

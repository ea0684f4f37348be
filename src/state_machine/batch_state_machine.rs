use super::{
    errors::{StateMachineError, StateMachineResult},
    events::BatchEvent,
    states::{BatchStatus, SubTaskStatus},
};
use uuid::Uuid;

/// Batch lifecycle state machine
///
/// Holds the last known status of one batch and validates events against the
/// transition table. Callers persist the returned target status.
#[derive(Debug, Clone)]
pub struct BatchStateMachine {
    batch_uuid: Uuid,
    current: BatchStatus,
}

impl BatchStateMachine {
    pub fn new(batch_uuid: Uuid, current: BatchStatus) -> Self {
        Self {
            batch_uuid,
            current,
        }
    }

    pub fn batch_uuid(&self) -> Uuid {
        self.batch_uuid
    }

    pub fn current_state(&self) -> BatchStatus {
        self.current
    }

    /// Apply an event, returning the new status
    pub fn transition(&mut self, event: &BatchEvent) -> StateMachineResult<BatchStatus> {
        let target = Self::determine_target_state(self.current, event)?;
        self.current = target;
        Ok(target)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current: BatchStatus,
        event: &BatchEvent,
    ) -> StateMachineResult<BatchStatus> {
        let target = match (current, event) {
            (BatchStatus::Pending, BatchEvent::DispatchConfirmed) => BatchStatus::Processing,
            (BatchStatus::Pending, BatchEvent::Abandon(_)) => BatchStatus::Failed,

            (BatchStatus::Processing, BatchEvent::AwaitSecondFilter) => {
                BatchStatus::AwaitingSecondFilter
            }
            (BatchStatus::AwaitingSecondFilter, BatchEvent::ResumeProcessing) => {
                BatchStatus::Processing
            }

            (BatchStatus::Processing | BatchStatus::AwaitingSecondFilter, BatchEvent::Complete) => {
                BatchStatus::Completed
            }
            (
                BatchStatus::Processing | BatchStatus::AwaitingSecondFilter,
                BatchEvent::CompletePartially,
            ) => BatchStatus::PartiallyCompleted,

            (BatchStatus::Processing | BatchStatus::AwaitingSecondFilter, BatchEvent::Fail(_)) => {
                BatchStatus::Failed
            }

            (from, event) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Decide the completion event for a batch from its sub-task statuses
    ///
    /// Returns `None` while any sub-task is still open.
    pub fn completion_event(sub_task_statuses: &[SubTaskStatus]) -> Option<BatchEvent> {
        if sub_task_statuses.is_empty() || !sub_task_statuses.iter().all(|s| s.is_terminal()) {
            return None;
        }

        let failed = sub_task_statuses
            .iter()
            .filter(|s| **s == SubTaskStatus::Failed)
            .count();

        Some(if failed == 0 {
            BatchEvent::Complete
        } else if failed == sub_task_statuses.len() {
            BatchEvent::Fail(format!("all {failed} sub-tasks failed"))
        } else {
            BatchEvent::CompletePartially
        })
    }

    /// Check whether the batch is ready for the second filtering stage
    ///
    /// Every sub-task that has not moved past the second filter must be
    /// waiting in `SecondFiltering`, and at least one must be waiting.
    pub fn ready_for_second_filter(sub_task_statuses: &[SubTaskStatus]) -> bool {
        let any_waiting = sub_task_statuses
            .iter()
            .any(|s| *s == SubTaskStatus::SecondFiltering);

        any_waiting
            && sub_task_statuses
                .iter()
                .filter(|s| !s.is_past_second_filter())
                .all(|s| *s == SubTaskStatus::SecondFiltering)
    }
}

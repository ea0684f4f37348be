use super::{
    errors::{StateMachineError, StateMachineResult},
    events::SubTaskEvent,
    states::SubTaskStatus,
};

/// Orchestrator-side sub-task transitions
///
/// Only dispatch outcomes are modelled here; the compute layer owns every
/// other status and the orchestrator must never write over them.
pub struct SubTaskStateMachine;

impl SubTaskStateMachine {
    /// Source states an event may be applied from
    pub fn source_states(event: &SubTaskEvent) -> &'static [SubTaskStatus] {
        match event {
            SubTaskEvent::DispatchAccepted | SubTaskEvent::DispatchRejected(_) => {
                &SubTaskStatus::DISPATCHABLE
            }
        }
    }

    /// Target state of an event
    pub fn target_state(event: &SubTaskEvent) -> SubTaskStatus {
        match event {
            SubTaskEvent::DispatchAccepted => SubTaskStatus::Dispatched,
            SubTaskEvent::DispatchRejected(_) => SubTaskStatus::DispatchFailed,
        }
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current: SubTaskStatus,
        event: &SubTaskEvent,
    ) -> StateMachineResult<SubTaskStatus> {
        if Self::source_states(event).contains(&current) {
            Ok(Self::target_state(event))
        } else {
            Err(StateMachineError::InvalidTransition {
                from: current.to_string(),
                event: event.event_type().to_string(),
            })
        }
    }
}

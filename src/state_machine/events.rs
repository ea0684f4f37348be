use serde::{Deserialize, Serialize};

/// Events that can trigger batch status transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BatchEvent {
    /// Every sub-task was accepted by the dispatcher
    DispatchConfirmed,
    /// All open sub-tasks are waiting at the second filter
    AwaitSecondFilter,
    /// Second filter submission failed or finished; keep processing
    ResumeProcessing,
    /// All sub-tasks finished without failures
    Complete,
    /// All sub-tasks finished with a mix of failures and successes
    CompletePartially,
    /// Mark the batch as failed
    Fail(String),
    /// Give up on a batch that never left `Pending`
    Abandon(String),
}

impl BatchEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::DispatchConfirmed => "dispatch_confirmed",
            Self::AwaitSecondFilter => "await_second_filter",
            Self::ResumeProcessing => "resume_processing",
            Self::Complete => "complete",
            Self::CompletePartially => "complete_partially",
            Self::Fail(_) => "fail",
            Self::Abandon(_) => "abandon",
        }
    }

    /// Extract the reason if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) | Self::Abandon(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Events the orchestrator applies to sub-tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SubTaskEvent {
    /// The dispatcher accepted the job
    DispatchAccepted,
    /// The dispatcher rejected the job or could not be reached
    DispatchRejected(String),
}

impl SubTaskEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::DispatchAccepted => "dispatch_accepted",
            Self::DispatchRejected(_) => "dispatch_rejected",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::DispatchRejected(msg) => Some(msg),
            Self::DispatchAccepted => None,
        }
    }
}

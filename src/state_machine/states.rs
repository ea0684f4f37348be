use serde::{Deserialize, Serialize};
use std::fmt;

/// Batch status definitions
///
/// Stored as the `screening_batch_status` PostgreSQL enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "screening_batch_status", rename_all = "snake_case")]
pub enum BatchStatus {
    /// Initial state; rows are persisted but dispatch is not confirmed
    Pending,
    /// Every sub-task was accepted by the dispatcher
    Processing,
    /// Batch-level second filtering job has been requested
    AwaitingSecondFilter,
    /// All sub-tasks finished without failures
    Completed,
    /// All sub-tasks finished, some of them failed
    PartiallyCompleted,
    /// Batch failed or was abandoned
    Failed,
}

impl BatchStatus {
    /// Statuses the workflow controller examines on each pass
    pub const IN_FLIGHT: [BatchStatus; 2] = [Self::Processing, Self::AwaitingSecondFilter];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::PartiallyCompleted | Self::Failed
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::AwaitingSecondFilter => write!(f, "awaiting_second_filter"),
            Self::Completed => write!(f, "completed"),
            Self::PartiallyCompleted => write!(f, "partially_completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "awaiting_second_filter" => Ok(Self::AwaitingSecondFilter),
            "completed" => Ok(Self::Completed),
            "partially_completed" => Ok(Self::PartiallyCompleted),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid batch status: {s}")),
        }
    }
}

/// Sub-task status definitions
///
/// The orchestrator only ever writes `Pending`, `Dispatched` and
/// `DispatchFailed`. Everything from `InitialAnalysis` onwards belongs to the
/// compute layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "screening_sub_task_status", rename_all = "snake_case")]
pub enum SubTaskStatus {
    Pending,
    Dispatched,
    DispatchFailed,
    InitialAnalysis,
    FirstFiltering,
    MaceOptimization,
    PostMaceAnalysis,
    SecondFiltering,
    XtbOptimization,
    Completed,
    Failed,
    FilteredOut,
}

impl SubTaskStatus {
    /// Statuses from which a dispatch may be (re)attempted
    pub const DISPATCHABLE: [SubTaskStatus; 2] = [Self::Pending, Self::DispatchFailed];

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::FilteredOut)
    }

    /// Check if a dispatch may be attempted from this state
    pub fn is_dispatchable(&self) -> bool {
        Self::DISPATCHABLE.contains(self)
    }

    /// Check if the compute layer owns this state
    pub fn is_compute_owned(&self) -> bool {
        !matches!(self, Self::Pending | Self::Dispatched | Self::DispatchFailed)
    }

    /// Check if the sub-task no longer participates in the second filter
    pub fn is_past_second_filter(&self) -> bool {
        self.is_terminal() || matches!(self, Self::XtbOptimization)
    }
}

impl fmt::Display for SubTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Dispatched => "dispatched",
            Self::DispatchFailed => "dispatch_failed",
            Self::InitialAnalysis => "initial_analysis",
            Self::FirstFiltering => "first_filtering",
            Self::MaceOptimization => "mace_optimization",
            Self::PostMaceAnalysis => "post_mace_analysis",
            Self::SecondFiltering => "second_filtering",
            Self::XtbOptimization => "xtb_optimization",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::FilteredOut => "filtered_out",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for SubTaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "dispatched" => Ok(Self::Dispatched),
            "dispatch_failed" => Ok(Self::DispatchFailed),
            "initial_analysis" => Ok(Self::InitialAnalysis),
            "first_filtering" => Ok(Self::FirstFiltering),
            "mace_optimization" => Ok(Self::MaceOptimization),
            "post_mace_analysis" => Ok(Self::PostMaceAnalysis),
            "second_filtering" => Ok(Self::SecondFiltering),
            "xtb_optimization" => Ok(Self::XtbOptimization),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "filtered_out" => Ok(Self::FilteredOut),
            _ => Err(format!("Invalid sub-task status: {s}")),
        }
    }
}

impl Default for BatchStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl Default for SubTaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

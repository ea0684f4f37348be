//! # Data Models
//!
//! Row types for batches and sub-tasks, plus the structured rule set produced
//! by the rule generator.
//!
//! - [`BatchTask`] - one screening request spanning a directory of files
//! - [`SubTask`] - one per-file unit of work belonging to a batch
//! - [`RuleSet`] - validated filtering rules stored on the batch

pub mod batch_task;
pub mod rules;
pub mod sub_task;

pub use batch_task::{BatchTask, BatchWithSubTasks, NewBatchTask};
pub use rules::{Condition, FilterRule, Metric, RuleSet, RuleSetError};
pub use sub_task::{NewSubTask, SubTask};

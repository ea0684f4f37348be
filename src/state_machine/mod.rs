// State machine module for batch and sub-task lifecycles
//
// Transition tables are pure functions over the status enums; persistence is
// left to the repository so the same rules apply to every storage backend.

pub mod batch_state_machine;
pub mod errors;
pub mod events;
pub mod states;
pub mod sub_task_state_machine;

pub use batch_state_machine::BatchStateMachine;
pub use errors::{StateMachineError, StateMachineResult};
pub use events::{BatchEvent, SubTaskEvent};
pub use states::{BatchStatus, SubTaskStatus};
pub use sub_task_state_machine::SubTaskStateMachine;

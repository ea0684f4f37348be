//! # Orchestration
//!
//! - [`BatchOrchestrator`] creates batches and dispatches their sub-tasks
//! - [`DispatchReconciler`] re-drives batches left `Pending` by a failed dispatch
//! - [`WorkflowController`] advances in-flight batches at batch-level milestones
//! - [`ScreeningSystem`] wires them to configuration-built components

pub mod batch_orchestrator;
mod batch_transition;
pub mod bootstrap;
pub mod dispatch_reconciler;
pub mod errors;
pub mod sub_task_dispatch;
pub mod workflow_controller;

pub use batch_orchestrator::{
    BatchCreationResult, BatchOrchestrator, BatchOrchestratorConfig, CreateBatchRequest,
};
pub use bootstrap::{ScreeningComponents, ScreeningSystem};
pub use dispatch_reconciler::{DispatchReconciler, ReconciliationSummary, RedriveResult};
pub use errors::{OrchestrationError, OrchestrationResult};
pub use sub_task_dispatch::DispatchSummary;
pub use workflow_controller::{ControllerPassSummary, WorkflowController};

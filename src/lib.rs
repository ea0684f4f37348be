#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Screening Core
//!
//! Batch orchestration for prompt-driven screening of crystal structure (CIF)
//! files.
//!
//! ## Overview
//!
//! A user describes the materials they want in natural language and points at
//! a directory. The core turns the description into a structured rule set,
//! creates one batch with one sub-task per eligible file, persists all of it
//! atomically, and then hands every sub-task to the compute layer through a
//! queue. The compute layer advances sub-tasks through analysis, filtering
//! and optimization; the core closes batches once their sub-tasks finish.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Batch creation, dispatch re-drive, batch-level control loop
//! - [`repository`] - Atomic batch storage (PostgreSQL and in-memory)
//! - [`messaging`] - Queue boundary (pgmq and in-process channel)
//! - [`services`] - Rule generation and directory scanning
//! - [`state_machine`] - Batch and sub-task status transitions
//! - [`models`] - Batch, sub-task and rule set types
//! - [`config`] - Layered configuration
//! - [`database`] - Connection pooling and migrations
//! - [`logging`] - Structured logging setup
//! - [`error`] - Crate-level error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use screening_core::config::ConfigManager;
//! use screening_core::orchestration::{CreateBatchRequest, ScreeningSystem};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! screening_core::logging::init_structured_logging();
//! let manager = ConfigManager::load()?;
//! let system = ScreeningSystem::from_config(manager.config().clone()).await?;
//!
//! let result = system
//!     .orchestrator()
//!     .create_batch(CreateBatchRequest::new("surface area above 1000", "/data/mofs"))
//!     .await?;
//! println!("Batch {} is {}", result.batch_uuid, result.batch_status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod repository;
pub mod services;
pub mod state_machine;

pub use config::{ConfigManager, ScreeningConfig};
pub use error::{Result, ScreeningError};
pub use models::{BatchTask, BatchWithSubTasks, RuleSet, SubTask};
pub use orchestration::{
    BatchCreationResult, BatchOrchestrator, CreateBatchRequest, DispatchReconciler,
    OrchestrationError, ScreeningSystem, WorkflowController,
};
pub use repository::{BatchRepository, InMemoryBatchRepository, PostgresBatchRepository};
pub use state_machine::{BatchStatus, SubTaskStatus};

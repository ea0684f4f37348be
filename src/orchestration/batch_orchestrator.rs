//! # Batch Orchestrator
//!
//! Creates screening batches: prompt to rules, directory to sub-tasks, one
//! atomic save, then dispatch of every sub-task.
//!
//! ## Ordering guarantees
//!
//! - Rule generation and the directory checks happen before anything is
//!   written, so a failure there leaves no trace.
//! - The batch and all its sub-tasks are committed in a single transaction
//!   before the first job is submitted. A worker can therefore always find the
//!   row for the job it receives.
//! - The batch only moves to `Processing` once every sub-task was accepted.
//!   Otherwise it stays `Pending` and the failed sub-tasks are marked
//!   `dispatch_failed` for the [`DispatchReconciler`](super::DispatchReconciler).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use screening_core::orchestration::{BatchOrchestrator, CreateBatchRequest};
//!
//! # async fn example(orchestrator: BatchOrchestrator) -> Result<(), Box<dyn std::error::Error>> {
//! let request = CreateBatchRequest::new(
//!     "pore diameter larger than 7 angstrom, 3D channels",
//!     "/data/mofs/run-42",
//! )
//! .with_task_name("wide pores");
//!
//! let result = orchestrator.create_batch(request).await?;
//! println!("Batch {} created with {} sub-tasks", result.batch_uuid, result.sub_task_count);
//! # Ok(())
//! # }
//! ```

use super::batch_transition::apply_batch_event;
use super::errors::{OrchestrationError, OrchestrationResult};
use super::sub_task_dispatch::dispatch_sub_tasks;
use crate::config::ScreeningConfig;
use crate::logging::log_batch_operation;
use crate::messaging::Dispatcher;
use crate::models::{BatchWithSubTasks, NewBatchTask, NewSubTask, RuleSet};
use crate::repository::BatchRepository;
use crate::services::{DirectoryScanner, RuleGenerationError, RuleGenerator, ScanError};
use crate::state_machine::{BatchEvent, BatchStatus};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Request to screen a directory of materials against a prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBatchRequest {
    pub task_name: Option<String>,
    pub filtering_prompt: String,
    pub materials_directory: PathBuf,
}

impl CreateBatchRequest {
    pub fn new(filtering_prompt: impl Into<String>, materials_directory: impl Into<PathBuf>) -> Self {
        Self {
            task_name: None,
            filtering_prompt: filtering_prompt.into(),
            materials_directory: materials_directory.into(),
        }
    }

    pub fn with_task_name(mut self, task_name: impl Into<String>) -> Self {
        self.task_name = Some(task_name.into());
        self
    }
}

/// Result of batch creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCreationResult {
    pub batch_uuid: Uuid,
    pub sub_task_count: usize,
    /// Status as last persisted; `Pending` if the final status write failed
    pub batch_status: BatchStatus,
}

/// Tunables for batch creation
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOrchestratorConfig {
    /// Extension (without dot) a file needs to become a sub-task
    pub eligible_extension: String,
    pub rule_generation_timeout: Duration,
    pub scan_timeout: Duration,
    pub dispatch_concurrency: usize,
}

impl Default for BatchOrchestratorConfig {
    fn default() -> Self {
        Self::from(&ScreeningConfig::default())
    }
}

impl From<&ScreeningConfig> for BatchOrchestratorConfig {
    fn from(config: &ScreeningConfig) -> Self {
        Self {
            eligible_extension: config.scanner.eligible_extension.clone(),
            rule_generation_timeout: config.orchestration.rule_generation_timeout(),
            scan_timeout: config.scanner.scan_timeout(),
            dispatch_concurrency: config.orchestration.dispatch_concurrency,
        }
    }
}

/// Creates batches and hands their sub-tasks to the compute layer
///
/// All collaborators are shared handles; one orchestrator serves any number
/// of concurrent `create_batch` calls, which share nothing but the repository.
#[derive(Clone)]
pub struct BatchOrchestrator {
    repository: Arc<dyn BatchRepository>,
    rule_generator: Arc<dyn RuleGenerator>,
    scanner: Arc<dyn DirectoryScanner>,
    dispatcher: Arc<dyn Dispatcher>,
    config: BatchOrchestratorConfig,
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("dispatcher", &self.dispatcher.provider_name())
            .field("config", &self.config)
            .finish()
    }
}

impl BatchOrchestrator {
    pub fn new(
        repository: Arc<dyn BatchRepository>,
        rule_generator: Arc<dyn RuleGenerator>,
        scanner: Arc<dyn DirectoryScanner>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self::with_config(
            repository,
            rule_generator,
            scanner,
            dispatcher,
            BatchOrchestratorConfig::default(),
        )
    }

    pub fn with_config(
        repository: Arc<dyn BatchRepository>,
        rule_generator: Arc<dyn RuleGenerator>,
        scanner: Arc<dyn DirectoryScanner>,
        dispatcher: Arc<dyn Dispatcher>,
        config: BatchOrchestratorConfig,
    ) -> Self {
        Self {
            repository,
            rule_generator,
            scanner,
            dispatcher,
            config,
        }
    }

    pub fn config(&self) -> &BatchOrchestratorConfig {
        &self.config
    }

    /// Create a batch from a prompt and a directory of materials
    ///
    /// On success every sub-task was accepted by the dispatcher. A returned
    /// [`OrchestrationError::Dispatch`] means the batch exists (its id is in
    /// the error) but stays `Pending` until re-driven.
    #[instrument(skip(self, request), fields(directory = %request.materials_directory.display()))]
    pub async fn create_batch(
        &self,
        request: CreateBatchRequest,
    ) -> OrchestrationResult<BatchCreationResult> {
        Self::validate_request(&request)?;
        info!(task_name = ?request.task_name, "Starting batch creation");

        let rules = self.generate_rules(&request.filtering_prompt).await?;
        let files = self.eligible_files(&request.materials_directory).await?;

        let batch = NewBatchTask::new(
            request.task_name,
            request.filtering_prompt,
            rules,
            request.materials_directory.to_string_lossy().into_owned(),
        );
        let sub_tasks: Vec<NewSubTask> = files
            .iter()
            .map(|path| NewSubTask::new(path.to_string_lossy().into_owned()))
            .collect();

        let saved = self
            .repository
            .save_batch_with_sub_tasks(batch, sub_tasks)
            .await
            .map_err(|e| {
                error!(error = %e, "Batch persistence failed; nothing was dispatched");
                OrchestrationError::Persistence(e)
            })?;

        let batch_uuid = saved.batch_uuid();
        let sub_task_count = saved.sub_task_count();
        log_batch_operation(
            "create_batch",
            Some(batch_uuid),
            &saved.batch.status.to_string(),
            Some(sub_task_count),
            Some("persisted"),
        );

        self.dispatch_and_confirm(&saved).await?;

        let batch_status = self.confirm_processing(batch_uuid).await;
        info!(
            batch_uuid = %batch_uuid,
            sub_task_count,
            batch_status = %batch_status,
            "Batch creation completed"
        );

        Ok(BatchCreationResult {
            batch_uuid,
            sub_task_count,
            batch_status,
        })
    }

    /// Fetch a batch and its sub-tasks
    pub async fn get_batch(&self, batch_uuid: Uuid) -> OrchestrationResult<BatchWithSubTasks> {
        Ok(self.repository.get_batch_with_sub_tasks(batch_uuid).await?)
    }

    fn validate_request(request: &CreateBatchRequest) -> OrchestrationResult<()> {
        if request.filtering_prompt.trim().is_empty() {
            return Err(OrchestrationError::InvalidRequest(
                "filtering prompt must not be empty".to_string(),
            ));
        }

        if request.materials_directory.as_os_str().is_empty() {
            return Err(OrchestrationError::InvalidRequest(
                "materials directory must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    async fn generate_rules(&self, prompt: &str) -> OrchestrationResult<RuleSet> {
        let limit = self.config.rule_generation_timeout;
        let rules = match timeout(limit, self.rule_generator.generate(prompt)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RuleGenerationError::Timeout {
                    seconds: limit.as_secs(),
                }
                .into())
            }
        };

        debug!(rule_count = rules.len(), "Rules generated");
        Ok(rules)
    }

    async fn eligible_files(&self, directory: &Path) -> OrchestrationResult<Vec<PathBuf>> {
        let extension = self.config.eligible_extension.as_str();
        let scan = async {
            if !self.scanner.exists(directory).await {
                return Err(ScanError::NotFound(directory.to_path_buf()));
            }
            self.scanner.list(directory, extension).await
        };

        let listing = timeout(self.config.scan_timeout, scan).await.map_err(|_| {
            OrchestrationError::ScanFailed(ScanError::Io {
                path: directory.to_path_buf(),
                reason: format!("scan timed out after {}s", self.config.scan_timeout.as_secs()),
            })
        })?;

        let files = match listing {
            Ok(files) => files,
            Err(ScanError::NotFound(path)) => return Err(OrchestrationError::DirectoryNotFound(path)),
            Err(other) => return Err(OrchestrationError::ScanFailed(other)),
        };

        if files.is_empty() {
            return Err(OrchestrationError::NoEligibleFiles {
                directory: directory.to_path_buf(),
                extension: extension.to_string(),
            });
        }

        debug!(eligible = files.len(), "Eligible files found");
        Ok(files)
    }

    async fn dispatch_and_confirm(&self, saved: &BatchWithSubTasks) -> OrchestrationResult<()> {
        let summary = dispatch_sub_tasks(
            self.repository.as_ref(),
            self.dispatcher.as_ref(),
            saved.batch_uuid(),
            &saved.sub_tasks,
            self.config.dispatch_concurrency,
        )
        .await;

        match summary.first_error {
            None => Ok(()),
            Some(first_error) => {
                warn!(
                    batch_uuid = %saved.batch_uuid(),
                    failed = summary.failed,
                    total = summary.total,
                    "Batch left pending after partial dispatch"
                );
                Err(OrchestrationError::Dispatch {
                    batch_uuid: saved.batch_uuid(),
                    failed: summary.failed,
                    total: summary.total,
                    first_error,
                })
            }
        }
    }

    /// Move a fully dispatched batch to `Processing`
    ///
    /// The jobs are already out, so a failed write here is logged and
    /// reported through the returned status rather than raised.
    async fn confirm_processing(&self, batch_uuid: Uuid) -> BatchStatus {
        let confirmed = apply_batch_event(
            self.repository.as_ref(),
            batch_uuid,
            BatchStatus::Pending,
            &BatchEvent::DispatchConfirmed,
        )
        .await;

        match confirmed {
            Ok(status) => status,
            // a reconciler pass confirmed it first
            Err(OrchestrationError::InvalidBatchState { actual, .. }) => actual,
            Err(e) => {
                error!(
                    batch_uuid = %batch_uuid,
                    error = %e,
                    "All sub-tasks dispatched but batch status update failed; batch remains pending"
                );
                BatchStatus::Pending
            }
        }
    }
}

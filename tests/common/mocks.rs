//! Test doubles for the orchestrator's collaborators

use async_trait::async_trait;
use parking_lot::Mutex;
use screening_core::messaging::{DispatchError, DispatchReceipt, DispatchResult, Dispatcher};
use screening_core::models::{
    BatchTask, BatchWithSubTasks, Condition, FilterRule, Metric, NewBatchTask, NewSubTask,
    RuleSet, SubTask,
};
use screening_core::orchestration::{
    BatchOrchestrator, BatchOrchestratorConfig, DispatchReconciler, WorkflowController,
};
use screening_core::repository::{
    BatchRepository, InMemoryBatchRepository, RepositoryError, RepositoryResult,
};
use screening_core::services::{
    DirectoryScanner, FsDirectoryScanner, RuleGenerationError, RuleGenerator, ScanError,
};
use screening_core::state_machine::{BatchStatus, SubTaskStatus};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

pub fn sample_rules() -> RuleSet {
    RuleSet::new(vec![
        FilterRule {
            metric: Metric::PoreDiameter,
            condition: Condition::GreaterThan,
            value: 7.0,
        },
        FilterRule {
            metric: Metric::ChannelDimension,
            condition: Condition::Equals,
            value: 3.0,
        },
    ])
}

/// Create a directory holding the given file names
pub fn materials_dir(file_names: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    for name in file_names {
        fs::write(dir.path().join(name), "data_mof\n_cell_length_a 10.0\n").expect("write file");
    }
    dir
}

// ---------------------------------------------------------------------------
// Rule generators
// ---------------------------------------------------------------------------

/// Always returns the same rule set and counts calls
#[derive(Debug)]
pub struct StaticRuleGenerator {
    rules: RuleSet,
    calls: AtomicUsize,
}

impl StaticRuleGenerator {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StaticRuleGenerator {
    fn default() -> Self {
        Self::new(sample_rules())
    }
}

#[async_trait]
impl RuleGenerator for StaticRuleGenerator {
    async fn generate(&self, _prompt: &str) -> Result<RuleSet, RuleGenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rules.clone())
    }
}

/// Always fails with the given error
#[derive(Debug)]
pub struct FailingRuleGenerator(pub RuleGenerationError);

#[async_trait]
impl RuleGenerator for FailingRuleGenerator {
    async fn generate(&self, _prompt: &str) -> Result<RuleSet, RuleGenerationError> {
        Err(self.0.clone())
    }
}

/// Takes longer than any reasonable test timeout
#[derive(Debug)]
pub struct SlowRuleGenerator(pub Duration);

#[async_trait]
impl RuleGenerator for SlowRuleGenerator {
    async fn generate(&self, _prompt: &str) -> Result<RuleSet, RuleGenerationError> {
        tokio::time::sleep(self.0).await;
        Ok(sample_rules())
    }
}

// ---------------------------------------------------------------------------
// Scanners
// ---------------------------------------------------------------------------

/// Directory exists but cannot be read
#[derive(Debug, Default)]
pub struct UnreadableScanner;

#[async_trait]
impl DirectoryScanner for UnreadableScanner {
    async fn exists(&self, _path: &Path) -> bool {
        true
    }

    async fn list(&self, path: &Path, _extension: &str) -> Result<Vec<PathBuf>, ScanError> {
        Err(ScanError::Io {
            path: path.to_path_buf(),
            reason: "permission denied".to_string(),
        })
    }
}

/// Existence check that never answers within a test timeout
#[derive(Debug)]
pub struct StalledExistsScanner(pub Duration);

#[async_trait]
impl DirectoryScanner for StalledExistsScanner {
    async fn exists(&self, _path: &Path) -> bool {
        tokio::time::sleep(self.0).await;
        true
    }

    async fn list(&self, _path: &Path, _extension: &str) -> Result<Vec<PathBuf>, ScanError> {
        Ok(vec![PathBuf::from("/never/listed.cif")])
    }
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

/// In-memory repository whose writes can be made to fail
#[derive(Debug, Default)]
pub struct FailingRepository {
    inner: InMemoryBatchRepository,
    fail_save: AtomicBool,
    fail_status_update: AtomicBool,
}

impl FailingRepository {
    pub fn failing_saves() -> Self {
        let repo = Self::default();
        repo.fail_save.store(true, Ordering::SeqCst);
        repo
    }

    pub fn failing_status_updates() -> Self {
        let repo = Self::default();
        repo.fail_status_update.store(true, Ordering::SeqCst);
        repo
    }

    pub fn inner(&self) -> &InMemoryBatchRepository {
        &self.inner
    }

    fn unavailable(operation: &str) -> RepositoryError {
        RepositoryError::Database {
            operation: operation.to_string(),
            reason: "connection reset by peer".to_string(),
        }
    }
}

#[async_trait]
impl BatchRepository for FailingRepository {
    async fn save_batch_with_sub_tasks(
        &self,
        batch: NewBatchTask,
        sub_tasks: Vec<NewSubTask>,
    ) -> RepositoryResult<BatchWithSubTasks> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(Self::unavailable("save_batch_with_sub_tasks"));
        }
        self.inner.save_batch_with_sub_tasks(batch, sub_tasks).await
    }

    async fn get_batch(&self, batch_uuid: Uuid) -> RepositoryResult<BatchTask> {
        self.inner.get_batch(batch_uuid).await
    }

    async fn get_sub_tasks_for_batch(&self, batch_uuid: Uuid) -> RepositoryResult<Vec<SubTask>> {
        self.inner.get_sub_tasks_for_batch(batch_uuid).await
    }

    async fn transition_batch_status(
        &self,
        batch_uuid: Uuid,
        expected: BatchStatus,
        to: BatchStatus,
    ) -> RepositoryResult<bool> {
        if self.fail_status_update.load(Ordering::SeqCst) {
            return Err(Self::unavailable("transition_batch_status"));
        }
        self.inner.transition_batch_status(batch_uuid, expected, to).await
    }

    async fn transition_sub_task_status(
        &self,
        sub_task_uuid: Uuid,
        expected: &[SubTaskStatus],
        to: SubTaskStatus,
        error_message: Option<String>,
    ) -> RepositoryResult<bool> {
        self.inner
            .transition_sub_task_status(sub_task_uuid, expected, to, error_message)
            .await
    }

    async fn list_batches_by_status(
        &self,
        statuses: &[BatchStatus],
    ) -> RepositoryResult<Vec<BatchTask>> {
        self.inner.list_batches_by_status(statuses).await
    }
}

// ---------------------------------------------------------------------------
// Dispatchers
// ---------------------------------------------------------------------------

/// Records every submission; rejects file names or call numbers on request
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    submitted: Mutex<Vec<(Uuid, String)>>,
    second_filters: Mutex<Vec<Uuid>>,
    rejected_file_names: Mutex<HashSet<String>>,
    reject_call: Option<usize>,
    reject_second_filter: AtomicBool,
    calls: AtomicUsize,
    next_message_id: AtomicI64,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the `n`th submission (1-based), whichever sub-task it is
    pub fn rejecting_call(n: usize) -> Self {
        Self {
            reject_call: Some(n),
            ..Self::default()
        }
    }

    /// Reject submissions whose file name is in `names`
    pub fn rejecting_files(names: &[&str]) -> Self {
        let dispatcher = Self::default();
        dispatcher.set_rejected_files(names);
        dispatcher
    }

    pub fn set_rejected_files(&self, names: &[&str]) {
        *self.rejected_file_names.lock() = names.iter().map(|n| n.to_string()).collect();
    }

    pub fn set_reject_second_filter(&self, reject: bool) {
        self.reject_second_filter.store(reject, Ordering::SeqCst);
    }

    /// Accepted analysis submissions
    pub fn submitted(&self) -> Vec<(Uuid, String)> {
        self.submitted.lock().clone()
    }

    /// How many times a file was accepted
    pub fn accepted_count_for(&self, file_name: &str) -> usize {
        self.submitted
            .lock()
            .iter()
            .filter(|(_, path)| path.ends_with(file_name))
            .count()
    }

    pub fn second_filters(&self) -> Vec<Uuid> {
        self.second_filters.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn receipt(&self, queue_name: &str) -> DispatchReceipt {
        DispatchReceipt::new(self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1, queue_name)
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn submit(&self, sub_task_uuid: Uuid, file_path: &str) -> DispatchResult<DispatchReceipt> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject_call == Some(call) {
            return Err(DispatchError::rejected(format!("call {call} rejected")));
        }

        let file_name = Path::new(file_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.rejected_file_names.lock().contains(&file_name) {
            return Err(DispatchError::transport(format!("broker unavailable for {file_name}")));
        }

        self.submitted
            .lock()
            .push((sub_task_uuid, file_path.to_string()));
        Ok(self.receipt("test_analysis"))
    }

    async fn submit_second_filter(&self, batch_uuid: Uuid) -> DispatchResult<DispatchReceipt> {
        if self.reject_second_filter.load(Ordering::SeqCst) {
            return Err(DispatchError::rejected("second filter queue unavailable"));
        }
        self.second_filters.lock().push(batch_uuid);
        Ok(self.receipt("test_second_filter"))
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Accepts every job, and the first submission for the watched batch also
/// carries it through `Processing` to `Completed`, as a concurrent
/// reconciler and controller would
#[derive(Debug)]
pub struct CompletingDispatcher {
    repository: Arc<InMemoryBatchRepository>,
    watched_batch: Mutex<Option<Uuid>>,
    submissions: AtomicUsize,
}

impl CompletingDispatcher {
    pub fn new(repository: Arc<InMemoryBatchRepository>) -> Self {
        Self {
            repository,
            watched_batch: Mutex::new(None),
            submissions: AtomicUsize::new(0),
        }
    }

    pub fn watch_batch(&self, batch_uuid: Uuid) {
        *self.watched_batch.lock() = Some(batch_uuid);
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dispatcher for CompletingDispatcher {
    async fn submit(&self, _sub_task_uuid: Uuid, _file_path: &str) -> DispatchResult<DispatchReceipt> {
        let call = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        let watched = self.watched_batch.lock().take();
        if let Some(batch_uuid) = watched {
            for (from, to) in [
                (BatchStatus::Pending, BatchStatus::Processing),
                (BatchStatus::Processing, BatchStatus::Completed),
            ] {
                self.repository
                    .transition_batch_status(batch_uuid, from, to)
                    .await
                    .map_err(|e| DispatchError::transport(e.to_string()))?;
            }
        }
        Ok(DispatchReceipt::new(call as i64, "test_analysis"))
    }

    async fn submit_second_filter(&self, _batch_uuid: Uuid) -> DispatchResult<DispatchReceipt> {
        Ok(DispatchReceipt::new(0, "test_second_filter"))
    }

    fn provider_name(&self) -> &'static str {
        "completing"
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Dispatch attempts the harness reconciler allows per sub-task
pub const TEST_MAX_DISPATCH_ATTEMPTS: u32 = 3;

/// In-memory wiring of the whole orchestration layer
pub struct Harness {
    pub repository: Arc<InMemoryBatchRepository>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub rule_generator: Arc<StaticRuleGenerator>,
    pub orchestrator: BatchOrchestrator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_dispatcher(RecordingDispatcher::new())
    }

    pub fn with_dispatcher(dispatcher: RecordingDispatcher) -> Self {
        let repository = Arc::new(InMemoryBatchRepository::new());
        let dispatcher = Arc::new(dispatcher);
        let rule_generator = Arc::new(StaticRuleGenerator::default());
        let orchestrator = BatchOrchestrator::with_config(
            repository.clone(),
            rule_generator.clone(),
            Arc::new(FsDirectoryScanner::new()),
            dispatcher.clone(),
            test_orchestrator_config(),
        );

        Self {
            repository,
            dispatcher,
            rule_generator,
            orchestrator,
        }
    }

    pub fn reconciler(&self, stale_after: Duration) -> DispatchReconciler {
        DispatchReconciler::new(
            self.repository.clone(),
            self.dispatcher.clone(),
            4,
            stale_after,
            TEST_MAX_DISPATCH_ATTEMPTS,
        )
    }

    pub fn controller(&self) -> WorkflowController {
        WorkflowController::new(self.repository.clone(), self.dispatcher.clone())
    }

    /// Overwrite sub-task statuses the way the compute layer would
    pub async fn set_sub_task_statuses(&self, batch_uuid: Uuid, statuses: &[SubTaskStatus]) {
        let sub_tasks = self
            .repository
            .get_sub_tasks_for_batch(batch_uuid)
            .await
            .expect("sub-tasks");
        assert_eq!(sub_tasks.len(), statuses.len(), "one status per sub-task");

        for (sub_task, status) in sub_tasks.iter().zip(statuses) {
            let changed = self
                .repository
                .transition_sub_task_status(sub_task.sub_task_uuid, &[sub_task.status], *status, None)
                .await
                .expect("status write");
            assert!(changed);
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn test_orchestrator_config() -> BatchOrchestratorConfig {
    BatchOrchestratorConfig {
        eligible_extension: "cif".to_string(),
        rule_generation_timeout: Duration::from_secs(5),
        scan_timeout: Duration::from_secs(5),
        dispatch_concurrency: 4,
    }
}

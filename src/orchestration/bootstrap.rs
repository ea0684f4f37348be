//! # System Bootstrap
//!
//! Builds every shared component once from configuration and hands out the
//! orchestrator, reconciler, and controller that use them.

use super::{BatchOrchestrator, BatchOrchestratorConfig, DispatchReconciler, WorkflowController};
use crate::config::{ConfigurationError, QueueProvider, ScreeningConfig};
use crate::database::{create_pool, DatabaseMigrations};
use crate::error::Result;
use crate::messaging::{ChannelDispatcher, Dispatcher, JobMessage, PgmqDispatcher};
use crate::repository::{BatchRepository, PostgresBatchRepository};
use crate::services::{DirectoryScanner, FsDirectoryScanner, LlmRuleGenerator, RuleGenerator};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Explicit set of components, for embedding and tests
pub struct ScreeningComponents {
    pub repository: Arc<dyn BatchRepository>,
    pub rule_generator: Arc<dyn RuleGenerator>,
    pub scanner: Arc<dyn DirectoryScanner>,
    pub dispatcher: Arc<dyn Dispatcher>,
}

/// Fully wired screening system
pub struct ScreeningSystem {
    config: ScreeningConfig,
    pool: Option<PgPool>,
    components: ScreeningComponents,
}

impl ScreeningSystem {
    /// Connect to the database and build every component from configuration
    ///
    /// The in-process `channel` queue is refused here: nothing in a
    /// config-driven process drains it, so accepted jobs would be lost. Use
    /// [`ScreeningSystem::from_config_with_job_receiver`] to consume it.
    pub async fn from_config(config: ScreeningConfig) -> Result<Self> {
        if config.queue.provider == QueueProvider::Channel {
            return Err(ConfigurationError::invalid_value(
                "queue.provider",
                "channel",
                "the in-process queue needs a consumer; use pgmq or \
                 ScreeningSystem::from_config_with_job_receiver",
            )
            .into());
        }

        let (system, _) = Self::build(config).await?;
        Ok(system)
    }

    /// Build from configuration and hand back the in-process queue receiver
    ///
    /// The receiver is `Some` only for the `channel` provider, and the caller
    /// must drain it for as long as the system runs.
    pub async fn from_config_with_job_receiver(
        config: ScreeningConfig,
    ) -> Result<(Self, Option<mpsc::Receiver<JobMessage>>)> {
        Self::build(config).await
    }

    async fn build(config: ScreeningConfig) -> Result<(Self, Option<mpsc::Receiver<JobMessage>>)> {
        config.validate()?;

        let pool = create_pool(&config.database).await?;
        if config.database.run_migrations {
            DatabaseMigrations::run_all(&pool).await?;
        }

        let (dispatcher, job_receiver) = match config.queue.provider {
            QueueProvider::Pgmq => {
                let dispatcher = PgmqDispatcher::with_queues(
                    pool.clone(),
                    config.queue.analysis_queue.clone(),
                    config.queue.second_filter_queue.clone(),
                );
                dispatcher.ensure_queues().await?;
                (Arc::new(dispatcher) as Arc<dyn Dispatcher>, None)
            }
            QueueProvider::Channel => {
                let (dispatcher, receiver) = ChannelDispatcher::new(config.queue.channel_capacity);
                (
                    Arc::new(dispatcher) as Arc<dyn Dispatcher>,
                    Some(receiver),
                )
            }
        };

        let components = ScreeningComponents {
            repository: Arc::new(PostgresBatchRepository::new(pool.clone())),
            rule_generator: Arc::new(LlmRuleGenerator::new(config.llm.clone())?),
            scanner: Arc::new(FsDirectoryScanner::new()),
            dispatcher,
        };

        info!(
            queue_provider = ?config.queue.provider,
            llm_model = %config.llm.model,
            "Screening system bootstrapped"
        );

        let system = Self {
            config,
            pool: Some(pool),
            components,
        };
        Ok((system, job_receiver))
    }

    /// Assemble a system from caller-supplied components
    pub fn with_components(config: ScreeningConfig, components: ScreeningComponents) -> Self {
        Self {
            config,
            pool: None,
            components,
        }
    }

    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub fn repository(&self) -> Arc<dyn BatchRepository> {
        Arc::clone(&self.components.repository)
    }

    pub fn orchestrator(&self) -> BatchOrchestrator {
        BatchOrchestrator::with_config(
            Arc::clone(&self.components.repository),
            Arc::clone(&self.components.rule_generator),
            Arc::clone(&self.components.scanner),
            Arc::clone(&self.components.dispatcher),
            BatchOrchestratorConfig::from(&self.config),
        )
    }

    pub fn reconciler(&self) -> DispatchReconciler {
        DispatchReconciler::new(
            Arc::clone(&self.components.repository),
            Arc::clone(&self.components.dispatcher),
            self.config.orchestration.dispatch_concurrency,
            self.config.orchestration.reconcile_stale_after(),
            self.config.orchestration.max_dispatch_attempts,
        )
    }

    pub fn controller(&self) -> WorkflowController {
        WorkflowController::new(
            Arc::clone(&self.components.repository),
            Arc::clone(&self.components.dispatcher),
        )
    }
}

//! # Screening Configuration System
//!
//! Layered, environment-aware configuration built on the `config` crate.
//!
//! ## Precedence (lowest to highest)
//!
//! 1. Built-in defaults ([`ScreeningConfig::default`])
//! 2. `config/screening.yaml`
//! 3. `config/screening.{environment}.yaml`
//! 4. `SCREENING__SECTION__KEY` environment variables
//!
//! `DATABASE_URL` and `LLM_API_KEY` are honoured when the corresponding key is
//! not configured anywhere else.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use screening_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let pool_size = manager.config().database.max_connections;
//! let timeout = manager.config().orchestration.rule_generation_timeout();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScreeningConfig {
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub llm: LlmConfig,
    pub scanner: ScannerConfig,
    pub orchestration: OrchestrationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Empty means "use `DATABASE_URL`, else the local default for the environment"
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            run_migrations: false,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

/// Where dispatched jobs go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueProvider {
    #[default]
    Pgmq,
    /// In-process queue whose receiver the embedding caller must drain
    Channel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub provider: QueueProvider,
    pub analysis_queue: String,
    pub second_filter_queue: String,
    /// Capacity of the in-process channel when `provider` is `channel`
    pub channel_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            provider: QueueProvider::Pgmq,
            analysis_queue: crate::messaging::ANALYSIS_QUEUE.to_string(),
            second_filter_queue: crate::messaging::SECOND_FILTER_QUEUE.to_string(),
            channel_capacity: 1024,
        }
    }
}

/// OpenAI-compatible chat completions endpoint used for rule generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com/v1".to_string(),
            api_key: None,
            model: "deepseek-chat".to_string(),
            request_timeout_seconds: 60,
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Full URL of the chat completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// File extension that makes a file eligible, without the leading dot
    pub eligible_extension: String,
    pub scan_timeout_seconds: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            eligible_extension: "cif".to_string(),
            scan_timeout_seconds: 30,
        }
    }
}

impl ScannerConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Upper bound on the rule generator call, on top of the HTTP timeout
    pub rule_generation_timeout_seconds: u64,
    /// Maximum sibling sub-task submissions in flight per batch
    pub dispatch_concurrency: usize,
    /// Pending batches younger than this are left to their creator
    pub reconcile_stale_after_seconds: u64,
    pub controller_interval_seconds: u64,
    /// A pending batch is abandoned once an outstanding sub-task has used this many submissions
    pub max_dispatch_attempts: u32,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            rule_generation_timeout_seconds: 90,
            dispatch_concurrency: 16,
            reconcile_stale_after_seconds: 300,
            controller_interval_seconds: 10,
            max_dispatch_attempts: 5,
        }
    }
}

impl OrchestrationConfig {
    pub fn rule_generation_timeout(&self) -> Duration {
        Duration::from_secs(self.rule_generation_timeout_seconds)
    }

    pub fn reconcile_stale_after(&self) -> Duration {
        Duration::from_secs(self.reconcile_stale_after_seconds)
    }

    pub fn controller_interval(&self) -> Duration {
        Duration::from_secs(self.controller_interval_seconds)
    }
}

impl ScreeningConfig {
    /// Validate configuration for consistency and required fields
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "database.url",
                "database configuration",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                "0",
                "pool size must be greater than 0",
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigurationError::invalid_value(
                "database.min_connections",
                self.database.min_connections.to_string(),
                "must not exceed database.max_connections",
            ));
        }

        if self.queue.analysis_queue.is_empty() || self.queue.second_filter_queue.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "queue.analysis_queue / queue.second_filter_queue",
                "queue configuration",
            ));
        }

        if self.queue.analysis_queue == self.queue.second_filter_queue {
            return Err(ConfigurationError::invalid_value(
                "queue.second_filter_queue",
                self.queue.second_filter_queue.clone(),
                "must differ from queue.analysis_queue",
            ));
        }

        if self.queue.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.channel_capacity",
                "0",
                "channel capacity must be greater than 0",
            ));
        }

        if !self.llm.base_url.starts_with("http://") && !self.llm.base_url.starts_with("https://")
        {
            return Err(ConfigurationError::invalid_value(
                "llm.base_url",
                self.llm.base_url.clone(),
                "must be an http(s) URL",
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "llm.model",
                "llm configuration",
            ));
        }

        let extension = self.scanner.eligible_extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(ConfigurationError::invalid_value(
                "scanner.eligible_extension",
                self.scanner.eligible_extension.clone(),
                "must be a bare file extension such as 'cif'",
            ));
        }

        for (field, value) in [
            ("llm.request_timeout_seconds", self.llm.request_timeout_seconds),
            ("scanner.scan_timeout_seconds", self.scanner.scan_timeout_seconds),
            (
                "orchestration.rule_generation_timeout_seconds",
                self.orchestration.rule_generation_timeout_seconds,
            ),
            (
                "orchestration.controller_interval_seconds",
                self.orchestration.controller_interval_seconds,
            ),
        ] {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    "0",
                    "timeouts and intervals must be greater than 0",
                ));
            }
        }

        if self.orchestration.dispatch_concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.dispatch_concurrency",
                "0",
                "at least one dispatch must be allowed in flight",
            ));
        }

        if self.orchestration.max_dispatch_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.max_dispatch_attempts",
                "0",
                "at least one dispatch attempt must be allowed",
            ));
        }

        Ok(())
    }
}

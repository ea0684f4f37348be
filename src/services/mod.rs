//! # External Services
//!
//! Boundaries the orchestrator calls out to before anything is persisted.

pub mod directory_scanner;
pub mod rule_generator;

pub use directory_scanner::{DirectoryScanner, FsDirectoryScanner, ScanError};
pub use rule_generator::{LlmRuleGenerator, RuleGenerationError, RuleGenerator};

//! # Filtering Rules
//!
//! Structured rule set produced from the user's natural-language prompt. The
//! orchestrator only checks that a rule set is well formed; whether the rules
//! express what the user meant is up to the rule generator.
//!
//! ```json
//! {
//!   "rules": [
//!     { "metric": "pore_diameter", "condition": "greater_than", "value": 7.0 },
//!     { "metric": "channel_dimension", "condition": "equals", "value": 3 }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Physical property a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    PoreDiameter,
    SurfaceArea,
    AccessibleVolume,
    ProbeVolume,
    ChannelDimension,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoreDiameter => write!(f, "pore_diameter"),
            Self::SurfaceArea => write!(f, "surface_area"),
            Self::AccessibleVolume => write!(f, "accessible_volume"),
            Self::ProbeVolume => write!(f, "probe_volume"),
            Self::ChannelDimension => write!(f, "channel_dimension"),
        }
    }
}

/// Comparison operator of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    GreaterThan,
    LessThan,
    Equals,
}

/// A single filtering criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    pub metric: Metric,
    pub condition: Condition,
    pub value: f64,
}

/// Reasons a rule set is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleSetError {
    #[error("Rule set is not valid JSON of the expected shape: {0}")]
    Malformed(String),

    #[error("Rule set contains no rules")]
    Empty,

    #[error("Rule {index} has a non-finite or negative value for {metric}")]
    InvalidValue { index: usize, metric: Metric },

    #[error("Rule {index}: channel_dimension must be a whole number between 0 and 3, got {value}")]
    InvalidChannelDimension { index: usize, value: f64 },
}

/// Validated collection of filtering rules
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<FilterRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<FilterRule>) -> Self {
        Self { rules }
    }

    /// Parse and validate the JSON document returned by a text-generation service
    pub fn from_json_str(raw: &str) -> Result<Self, RuleSetError> {
        let rule_set: RuleSet = serde_json::from_str(raw.trim())
            .map_err(|e| RuleSetError::Malformed(e.to_string()))?;
        rule_set.validate()?;
        Ok(rule_set)
    }

    /// Check the rule set is usable by the compute layer
    pub fn validate(&self) -> Result<(), RuleSetError> {
        if self.rules.is_empty() {
            return Err(RuleSetError::Empty);
        }

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.value.is_finite() || rule.value < 0.0 {
                return Err(RuleSetError::InvalidValue {
                    index,
                    metric: rule.metric,
                });
            }

            if rule.metric == Metric::ChannelDimension
                && (rule.value.fract() != 0.0 || rule.value > 3.0)
            {
                return Err(RuleSetError::InvalidChannelDimension {
                    index,
                    value: rule.value,
                });
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

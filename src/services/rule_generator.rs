//! # Rule Generation
//!
//! Turns a natural-language screening request into a [`RuleSet`] by asking an
//! OpenAI-compatible chat completions endpoint for a JSON object.
//!
//! The HTTP client is created once and shared: `reqwest::Client` pools
//! connections internally and is cheap to clone, so one [`LlmRuleGenerator`]
//! behind an `Arc` serves every concurrent batch creation.

use crate::config::LlmConfig;
use crate::models::{RuleSet, RuleSetError};
use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = r#"You are an expert materials science assistant. Convert the user's natural language request for screening MOF (Metal-Organic Framework) materials into a structured JSON object.

The user will provide criteria for properties like pore diameter, surface area and channel dimensionality. Parse these criteria into a list of rules.

The JSON object must have a single key "rules", which is a list. Each rule has three keys:
1. "metric": one of "pore_diameter", "surface_area", "accessible_volume", "probe_volume", "channel_dimension".
2. "condition": one of "greater_than", "less_than", "equals".
3. "value": a number.

Example request: "I need materials with a pore diameter larger than 7 angstroms and a channel dimension that is 3D."
Your output MUST be ONLY the following JSON object and nothing else:
{"rules": [{"metric": "pore_diameter", "condition": "greater_than", "value": 7.0}, {"metric": "channel_dimension", "condition": "equals", "value": 3}]}"#;

/// Reasons a rule set could not be produced
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleGenerationError {
    #[error("Rule generator is misconfigured: {0}")]
    Configuration(String),

    #[error("Rule generation request failed: {0}")]
    Request(String),

    #[error("Rule generation service returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Rule generation response has no message content")]
    MissingContent,

    #[error("Generated rules are unusable: {0}")]
    InvalidRules(#[from] RuleSetError),

    #[error("Rule generation timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Produces a filtering rule set from a user prompt
#[async_trait]
pub trait RuleGenerator: Send + Sync + 'static {
    async fn generate(&self, prompt: &str) -> Result<RuleSet, RuleGenerationError>;
}

/// Rule generator backed by a chat completions API
#[derive(Debug, Clone)]
pub struct LlmRuleGenerator {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmRuleGenerator {
    /// Build a generator with its own pooled HTTP client
    pub fn new(config: LlmConfig) -> Result<Self, RuleGenerationError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RuleGenerationError::Configuration(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    /// Build a generator on an existing HTTP client
    pub fn with_client(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "response_format": { "type": "json_object" }
        })
    }

    /// Pull `choices[0].message.content` out of a completion response
    fn extract_content(response: &Value) -> Result<&str, RuleGenerationError> {
        response
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .filter(|content| !content.trim().is_empty())
            .ok_or(RuleGenerationError::MissingContent)
    }
}

#[async_trait]
impl RuleGenerator for LlmRuleGenerator {
    async fn generate(&self, prompt: &str) -> Result<RuleSet, RuleGenerationError> {
        let url = self.config.completions_url();
        debug!(model = %self.config.model, url = %url, "Requesting rule generation");

        let mut request = self.client.post(&url).json(&self.request_body(prompt));
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RuleGenerationError::Timeout {
                    seconds: self.config.request_timeout_seconds,
                }
            } else {
                RuleGenerationError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Rule generation service returned an error");
            return Err(RuleGenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| RuleGenerationError::Request(format!("invalid response body: {e}")))?;

        let content = Self::extract_content(&payload)?;
        let rule_set = RuleSet::from_json_str(content)?;

        info!(
            model = %self.config.model,
            rule_count = rule_set.len(),
            "Rules generated from prompt"
        );
        Ok(rule_set)
    }
}

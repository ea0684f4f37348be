//! # Job Messages
//!
//! Payloads placed on the work queues. Serialized as tagged JSON so a worker
//! can route on `job_type` without knowing the queue it read from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
pub enum JobMessage {
    /// Run the per-file analysis pipeline for one sub-task
    AnalyzeSubTask {
        sub_task_uuid: Uuid,
        file_path: String,
        enqueued_at: DateTime<Utc>,
    },
    /// Run the batch-level second filter once every survivor reached it
    SecondFilter {
        batch_uuid: Uuid,
        enqueued_at: DateTime<Utc>,
    },
}

impl JobMessage {
    pub fn analyze(sub_task_uuid: Uuid, file_path: impl Into<String>) -> Self {
        Self::AnalyzeSubTask {
            sub_task_uuid,
            file_path: file_path.into(),
            enqueued_at: Utc::now(),
        }
    }

    pub fn second_filter(batch_uuid: Uuid) -> Self {
        Self::SecondFilter {
            batch_uuid,
            enqueued_at: Utc::now(),
        }
    }

    /// Short label for logs
    pub fn job_type(&self) -> &'static str {
        match self {
            Self::AnalyzeSubTask { .. } => "analyze_sub_task",
            Self::SecondFilter { .. } => "second_filter",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

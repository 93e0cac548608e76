use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::{Payload, TaskId};

/// What a single attempt on a single worker produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Success(Payload),
    Failure(String),
    TimedOut,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Success(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Result of executing one assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub worker_id: String,
    /// 1-based attempt this result belongs to
    pub attempt: u32,
    pub outcome: Outcome,
    pub produced_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl TaskResult {
    /// Human readable error for failed outcomes.
    pub fn error_message(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(msg) => Some(msg.clone()),
            Outcome::TimedOut => Some(format!("worker '{}' timed out", self.worker_id)),
        }
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::executor::types::{Payload, TaskId};
use crate::resolve::{Conflict, ResolutionStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    PermanentlyFailed,
    Skipped,
}

/// Why a task never ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// A dependency failed permanently or was skipped itself.
    UpstreamFailure { dependency: TaskId },
    /// The run was cancelled before the task resolved.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<Conflict>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_tasks: usize,
    pub succeeded: usize,
    pub permanently_failed: usize,
    pub skipped: usize,
    pub total_attempts: u64,
    pub total_retries: u64,
    pub conflicts: usize,
    /// Succeeded tasks per resolution strategy.
    #[serde(default)]
    pub resolutions: BTreeMap<ResolutionStrategy, usize>,
    /// Mean worker time over every finished assignment.
    #[serde(default)]
    pub average_task_ms: u64,
    pub peak_in_flight: usize,
    /// First dispatch to last completion.
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmReport {
    pub run_id: String,
    pub entries: Vec<TaskReport>,
    pub summary: ReportSummary,
    pub cancelled: bool,
}

impl SwarmReport {
    pub fn entry(&self, task_id: &str) -> Option<&TaskReport> {
        self.entries.iter().find(|e| e.task_id == task_id)
    }

    pub fn all_succeeded(&self) -> bool {
        !self.cancelled && self.summary.succeeded == self.summary.total_tasks
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &Conflict> + '_ {
        self.entries.iter().filter_map(|e| e.conflict.as_ref())
    }
}

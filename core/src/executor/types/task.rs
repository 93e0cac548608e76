use std::time::Duration;

use serde::{Deserialize, Serialize};

pub type TaskId = String;

/// Opaque task input / worker output. The engine never looks inside it,
/// except for equality checks and caller-supplied classifiers.
pub type Payload = serde_json::Value;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Dispatch priority. Ordering is ascending, so `Critical` is the greatest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// One unit of work in a task graph. Immutable once the graph is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    /// Which kind of worker can run this task.
    pub capability: String,
    pub payload: Payload,
    pub dependencies: Vec<TaskId>,
    pub priority: Priority,
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub timeout: Duration,
    /// Number of distinct workers one attempt is dispatched to.
    /// `None` lets the engine pick (see `ExecutionConfig::critical_redundancy`).
    pub redundancy: Option<u32>,
}

impl Task {
    pub fn new(id: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capability: capability.into(),
            payload: Payload::Null,
            dependencies: Vec::new(),
            priority: Priority::default(),
            max_retries: 0,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            redundancy: None,
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_redundancy(mut self, redundancy: u32) -> Self {
        self.redundancy = Some(redundancy.max(1));
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_critical_first_when_reversed() {
        let mut prios = vec![Priority::Low, Priority::Critical, Priority::Medium, Priority::High];
        prios.sort_by(|a, b| b.cmp(a));
        assert_eq!(
            prios,
            vec![Priority::Critical, Priority::High, Priority::Medium, Priority::Low]
        );
    }

    #[test]
    fn attempts_default_and_retry() {
        let task = Task::new("a", "echo");
        assert_eq!(task.max_attempts(), 1);
        assert_eq!(task.with_max_retries(2).max_attempts(), 3);
    }

    #[test]
    fn redundancy_is_at_least_one() {
        let task = Task::new("a", "echo").with_redundancy(0);
        assert_eq!(task.redundancy, Some(1));
    }
}

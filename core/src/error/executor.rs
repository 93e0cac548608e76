use thiserror::Error;

use super::graph::GraphError;

/// A single attempt failed. Recoverable through the retry policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskExecutionError {
    #[error("worker '{worker_id}' failed: {message}")]
    Worker { worker_id: String, message: String },

    #[error("worker '{worker_id}' timed out after {timeout_ms}ms")]
    TimedOut { worker_id: String, timeout_ms: u64 },

    #[error("worker '{worker_id}' panicked")]
    Panicked { worker_id: String },
}

/// No eligible worker could take a ready task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no eligible worker for capability '{capability}' after waiting {waited_ms}ms")]
pub struct WorkerUnavailableError {
    pub capability: String,
    pub waited_ms: u64,
}

/// A dependency ended without success; the dependent is skipped, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("task '{task_id}' skipped: dependency '{dependency}' did not succeed")]
pub struct UpstreamFailureError {
    pub task_id: String,
    pub dependency: String,
}

/// Conditions that abort a whole swarm run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("invalid task graph: {0}")]
    InvalidGraph(#[from] GraphError),

    #[error("no registered worker serves any of the capabilities: {}", capabilities.join(", "))]
    NoViableWorkers { capabilities: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_error_wraps_graph_error() {
        let fatal: FatalError = GraphError::DuplicateId("a".into()).into();
        assert_eq!(fatal.to_string(), "invalid task graph: Duplicate task ID: a");
    }

    #[test]
    fn no_viable_workers_lists_capabilities() {
        let fatal = FatalError::NoViableWorkers {
            capabilities: vec!["lint".into(), "scan".into()],
        };
        assert!(fatal.to_string().ends_with("lint, scan"));
    }
}

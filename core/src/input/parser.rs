use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::executor::types::{Payload, Priority, Task, DEFAULT_TIMEOUT_MS};
use crate::executor::TaskGraph;
use crate::registry::WorkerSpec;

/// One task as written in a submission document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDocument {
    pub id: String,
    pub capability: String,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default, alias = "dependencies")]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub redundancy: Option<u32>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl TaskDocument {
    fn into_task(self) -> Result<Task, InputError> {
        if self.timeout_ms == 0 {
            return Err(InputError::Invalid(format!(
                "task '{}': timeout_ms must be > 0",
                self.id
            )));
        }
        if self.redundancy == Some(0) {
            return Err(InputError::Invalid(format!(
                "task '{}': redundancy must be >= 1",
                self.id
            )));
        }
        Ok(Task {
            id: self.id,
            capability: self.capability,
            payload: self.payload,
            dependencies: self.depends_on,
            priority: self.priority,
            max_retries: self.max_retries,
            timeout: Duration::from_millis(self.timeout_ms),
            redundancy: self.redundancy,
        })
    }
}

pub type WorkerDocument = WorkerSpec;

#[derive(Deserialize)]
#[serde(untagged)]
enum TaskList {
    Bare(Vec<TaskDocument>),
    Wrapped { tasks: Vec<TaskDocument> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WorkerList {
    Bare(Vec<WorkerDocument>),
    Wrapped { workers: Vec<WorkerDocument> },
}

/// Reads submission documents: either a bare JSON array or an object
/// wrapping it (`{"tasks": [...]}`, `{"workers": [...]}`).
pub struct InputParser;

impl InputParser {
    pub fn parse_tasks(input: &str) -> Result<Vec<Task>, InputError> {
        let docs = match serde_json::from_str::<TaskList>(input) {
            Ok(TaskList::Bare(docs)) | Ok(TaskList::Wrapped { tasks: docs }) => docs,
            // untagged errors say nothing useful; retry strictly for a precise message
            Err(_) => serde_json::from_str::<Vec<TaskDocument>>(input)?,
        };
        docs.into_iter().map(TaskDocument::into_task).collect()
    }

    /// Parse and validate into a graph.
    pub fn parse_graph(input: &str) -> Result<TaskGraph, InputError> {
        Ok(TaskGraph::build(Self::parse_tasks(input)?)?)
    }

    pub fn parse_workers(input: &str) -> Result<Vec<WorkerSpec>, InputError> {
        let workers = match serde_json::from_str::<WorkerList>(input) {
            Ok(WorkerList::Bare(w)) | Ok(WorkerList::Wrapped { workers: w }) => w,
            Err(_) => serde_json::from_str::<Vec<WorkerDocument>>(input)?,
        };
        for worker in &workers {
            if worker.worker_id.trim().is_empty() {
                return Err(InputError::Invalid("worker with empty worker_id".into()));
            }
            if !worker.trust_weight.is_finite() || worker.trust_weight < 0.0 {
                return Err(InputError::Invalid(format!(
                    "worker '{}': trust_weight must be a finite number >= 0",
                    worker.worker_id
                )));
            }
        }
        Ok(workers)
    }

    pub fn read_graph(path: &Path) -> Result<TaskGraph, InputError> {
        Self::parse_graph(&std::fs::read_to_string(path)?)
    }

    pub fn read_workers(path: &Path) -> Result<Vec<WorkerSpec>, InputError> {
        Self::parse_workers(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_bare_array_with_defaults() {
        let tasks = InputParser::parse_tasks(
            r#"[{"id": "a", "capability": "scan"},
                {"id": "b", "capability": "lint", "depends_on": ["a"],
                 "priority": "critical", "timeout_ms": 500, "max_retries": 2,
                 "redundancy": 3, "payload": {"path": "src"}}]"#,
        )
        .unwrap();

        assert_eq!(tasks[0].priority, Priority::Medium);
        assert_eq!(tasks[0].timeout, Duration::from_millis(30_000));
        assert_eq!(tasks[0].max_retries, 0);
        assert_eq!(tasks[0].payload, Payload::Null);

        let b = &tasks[1];
        assert_eq!(b.dependencies, vec!["a"]);
        assert_eq!(b.priority, Priority::Critical);
        assert_eq!(b.timeout, Duration::from_millis(500));
        assert_eq!(b.redundancy, Some(3));
        assert_eq!(b.payload, json!({"path": "src"}));
    }

    #[test]
    fn parses_wrapped_documents() {
        let tasks =
            InputParser::parse_tasks(r#"{"tasks": [{"id": "a", "capability": "x"}]}"#).unwrap();
        assert_eq!(tasks.len(), 1);

        let workers = InputParser::parse_workers(
            r#"{"workers": [{"worker_id": "w1", "capabilities": ["x", "y"]},
                            {"worker_id": "w2", "capabilities": ["x"], "trust_weight": 2.5}]}"#,
        )
        .unwrap();
        assert_eq!(workers[0].trust_weight, 1.0);
        assert!(workers[0].serves("y"));
        assert_eq!(workers[1].trust_weight, 2.5);
    }

    #[test]
    fn rejects_cyclic_graph() {
        let err = InputParser::parse_graph(
            r#"[{"id": "a", "capability": "x", "depends_on": ["b"]},
                {"id": "b", "capability": "x", "depends_on": ["a"]}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, InputError::Graph(GraphError::Cycle { .. })));
    }

    #[test]
    fn rejects_bad_values() {
        let err =
            InputParser::parse_tasks(r#"[{"id": "a", "capability": "x", "timeout_ms": 0}]"#)
                .unwrap_err();
        assert!(err.to_string().contains("timeout_ms"));

        let err = InputParser::parse_workers(
            r#"[{"worker_id": "w", "capabilities": [], "trust_weight": -1}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, InputError::Invalid(_)));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = InputParser::parse_tasks(r#"[{"id": "a"}]"#).unwrap_err();
        assert!(matches!(err, InputError::Json(_)));
    }
}

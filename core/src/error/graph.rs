use thiserror::Error;

/// Errors raised while building a task graph. All of them reject the
/// submission before anything runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Task at position {0} has an empty id")]
    EmptyId(usize),

    #[error("Duplicate task ID: {0}")]
    DuplicateId(String),

    #[error("Dependency not found: task '{task_id}' depends on '{missing_dep}'")]
    UnknownDependency { task_id: String, missing_dep: String },

    #[error("Circular dependency detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
}

impl GraphError {
    /// Task ids involved in the error, for callers that want to point at them.
    pub fn task_ids(&self) -> Vec<&str> {
        match self {
            Self::EmptyId(_) => Vec::new(),
            Self::DuplicateId(id) => vec![id.as_str()],
            Self::UnknownDependency {
                task_id,
                missing_dep,
            } => vec![task_id.as_str(), missing_dep.as_str()],
            Self::Cycle { path } => path.iter().map(String::as_str).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_path() {
        let err = GraphError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
        assert_eq!(err.task_ids(), vec!["a", "b", "a"]);
    }

    #[test]
    fn unknown_dependency_names_both_ids() {
        let err = GraphError::UnknownDependency {
            task_id: "build".into(),
            missing_dep: "fetch".into(),
        };
        assert!(err.to_string().contains("'build' depends on 'fetch'"));
    }
}

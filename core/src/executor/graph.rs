use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::GraphError;
use crate::executor::types::{Task, TaskId};

/// Task dependency graph (DAG). Read-only once built.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Task nodes: task_id -> Task
    nodes: HashMap<TaskId, Task>,

    /// Dependency edges: task_id -> list of dependencies
    edges: HashMap<TaskId, Vec<TaskId>>,

    /// Reverse edges: task_id -> list of tasks that depend on it
    reverse_edges: HashMap<TaskId, Vec<TaskId>>,

    /// Original insertion order (for stable sorting)
    insertion_order: Vec<TaskId>,
}

impl TaskGraph {
    /// Construct and validate a task graph.
    ///
    /// Rejects empty and duplicate ids, dependencies on unknown tasks and
    /// cycles (including a task depending on itself).
    pub fn build(tasks: Vec<Task>) -> Result<Self, GraphError> {
        let mut nodes = HashMap::with_capacity(tasks.len());
        let mut edges = HashMap::with_capacity(tasks.len());
        let mut reverse_edges: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        let mut insertion_order = Vec::with_capacity(tasks.len());

        for (pos, mut task) in tasks.into_iter().enumerate() {
            if task.id.trim().is_empty() {
                return Err(GraphError::EmptyId(pos));
            }
            if nodes.contains_key(&task.id) {
                return Err(GraphError::DuplicateId(task.id));
            }

            let mut seen = HashSet::new();
            task.dependencies.retain(|dep| seen.insert(dep.clone()));

            let task_id = task.id.clone();
            edges.insert(task_id.clone(), task.dependencies.clone());
            insertion_order.push(task_id.clone());
            nodes.insert(task_id, task);
        }

        for task_id in &insertion_order {
            for dep in &edges[task_id] {
                if !nodes.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        task_id: task_id.clone(),
                        missing_dep: dep.clone(),
                    });
                }
                reverse_edges
                    .entry(dep.clone())
                    .or_default()
                    .push(task_id.clone());
            }
        }

        let graph = Self {
            nodes,
            edges,
            reverse_edges,
            insertion_order,
        };

        if let Some(path) = graph.detect_cycle() {
            return Err(GraphError::Cycle { path });
        }

        Ok(graph)
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.nodes.get(task_id)
    }

    pub fn len(&self) -> usize {
        self.insertion_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion_order.is_empty()
    }

    /// Task ids in submission order.
    pub fn ids(&self) -> impl Iterator<Item = &TaskId> + '_ {
        self.insertion_order.iter()
    }

    /// Tasks in submission order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> + '_ {
        self.insertion_order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn dependencies(&self, task_id: &str) -> &[TaskId] {
        self.edges.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tasks that directly depend on `task_id`.
    pub fn dependents(&self, task_id: &str) -> &[TaskId] {
        self.reverse_edges
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every task reachable through reverse edges, in breadth-first order.
    pub fn transitive_dependents(&self, task_id: &str) -> Vec<TaskId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::from([task_id]);
        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents(current) {
                if seen.insert(dependent.as_str()) {
                    out.push(dependent.clone());
                    queue.push_back(dependent);
                }
            }
        }
        out
    }

    /// Distinct capability tags used by the graph.
    pub fn capabilities(&self) -> BTreeSet<&str> {
        self.nodes.values().map(|t| t.capability.as_str()).collect()
    }

    /// Tasks not in `completed` whose dependencies all are.
    pub fn ready_set(&self, completed: &HashSet<TaskId>) -> BTreeSet<TaskId> {
        self.insertion_order
            .iter()
            .filter(|id| !completed.contains(*id))
            .filter(|id| self.dependencies(id).iter().all(|d| completed.contains(d)))
            .cloned()
            .collect()
    }

    /// Execution stages via Kahn's algorithm. Tasks within a stage could run
    /// in parallel and keep submission order.
    pub fn topological_layers(&self) -> TopologicalLayers<'_> {
        let in_degree = self
            .insertion_order
            .iter()
            .map(|id| (id.as_str(), self.dependencies(id).len()))
            .collect::<HashMap<_, _>>();
        let current = self
            .insertion_order
            .iter()
            .filter(|id| in_degree[id.as_str()] == 0)
            .map(String::as_str)
            .collect();
        TopologicalLayers {
            graph: self,
            in_degree,
            current,
        }
    }

    /// Flattened topological order.
    pub fn topological_order(&self) -> Vec<TaskId> {
        self.topological_layers().flatten().collect()
    }

    /// Number of stages on the longest dependency chain.
    pub fn critical_path_len(&self) -> usize {
        self.topological_layers().count()
    }

    fn position(&self, task_id: &str) -> usize {
        self.insertion_order
            .iter()
            .position(|k| k == task_id)
            .unwrap_or(usize::MAX)
    }

    /// Detect circular dependencies using DFS
    ///
    /// # Time Complexity
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    fn detect_cycle(&self) -> Option<Vec<TaskId>> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for task_id in &self.insertion_order {
            if !visited.contains(task_id) && self.dfs_cycle(task_id, &mut visited, &mut stack) {
                return Some(stack);
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<TaskId>,
        stack: &mut Vec<TaskId>,
    ) -> bool {
        visited.insert(node.to_string());
        stack.push(node.to_string());

        for dep in self.dependencies(node) {
            // Dependency already on the current path: cycle
            if let Some(pos) = stack.iter().position(|x| x == dep) {
                stack.push(dep.clone());
                *stack = stack[pos..].to_vec();
                return true;
            }

            if !visited.contains(dep) && self.dfs_cycle(dep, visited, stack) {
                return true;
            }
        }

        stack.pop();
        false
    }
}

/// Lazy stage iterator returned by [`TaskGraph::topological_layers`].
pub struct TopologicalLayers<'g> {
    graph: &'g TaskGraph,
    in_degree: HashMap<&'g str, usize>,
    current: Vec<&'g str>,
}

impl<'g> Iterator for TopologicalLayers<'g> {
    type Item = Vec<TaskId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_empty() {
            return None;
        }
        let graph = self.graph;
        let stage = std::mem::take(&mut self.current);

        let mut next_stage = Vec::new();
        for task_id in &stage {
            for dependent in graph.dependents(task_id) {
                if let Some(degree) = self.in_degree.get_mut(dependent.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        next_stage.push(dependent.as_str());
                    }
                }
            }
        }
        next_stage.sort_by_key(|id| graph.position(id));
        self.current = next_stage;

        Some(stage.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task::new(id, "cap").depends_on(deps.iter().copied())
    }

    #[test]
    fn builds_layers_in_submission_order() {
        let graph = TaskGraph::build(vec![
            task("c", &["a", "b"]),
            task("b", &[]),
            task("a", &[]),
            task("d", &["c"]),
        ])
        .unwrap();

        let layers: Vec<_> = graph.topological_layers().collect();
        assert_eq!(
            layers,
            vec![vec!["b".to_string(), "a".to_string()], vec!["c".into()], vec!["d".into()]]
        );
        assert_eq!(graph.critical_path_len(), 3);
        assert_eq!(graph.topological_order(), vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn rejects_three_node_cycle() {
        let err = TaskGraph::build(vec![
            task("a", &["c"]),
            task("b", &["a"]),
            task("c", &["b"]),
        ])
        .unwrap_err();
        match err {
            GraphError::Cycle { path } => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = TaskGraph::build(vec![task("a", &["a"])]).unwrap_err();
        assert_eq!(
            err,
            GraphError::Cycle {
                path: vec!["a".into(), "a".into()]
            }
        );
    }

    #[test]
    fn rejects_duplicates_unknowns_and_empty_ids() {
        assert_eq!(
            TaskGraph::build(vec![task("a", &[]), task("a", &[])]).unwrap_err(),
            GraphError::DuplicateId("a".into())
        );
        assert_eq!(
            TaskGraph::build(vec![task("a", &["ghost"])]).unwrap_err(),
            GraphError::UnknownDependency {
                task_id: "a".into(),
                missing_dep: "ghost".into()
            }
        );
        assert_eq!(
            TaskGraph::build(vec![task("a", &[]), task(" ", &[])]).unwrap_err(),
            GraphError::EmptyId(1)
        );
    }

    #[test]
    fn ready_set_requires_all_dependencies() {
        let graph = TaskGraph::build(vec![
            task("a", &[]),
            task("b", &[]),
            task("c", &["a", "b"]),
        ])
        .unwrap();

        let mut done = HashSet::new();
        assert_eq!(graph.ready_set(&done), BTreeSet::from(["a".to_string(), "b".to_string()]));
        done.insert("a".to_string());
        assert_eq!(graph.ready_set(&done), BTreeSet::from(["b".to_string()]));
        done.insert("b".to_string());
        assert_eq!(graph.ready_set(&done), BTreeSet::from(["c".to_string()]));
    }

    #[test]
    fn duplicate_dependencies_are_collapsed() {
        let graph = TaskGraph::build(vec![task("a", &[]), task("b", &["a", "a"])]).unwrap();
        assert_eq!(graph.dependencies("b"), ["a".to_string()]);
        assert_eq!(graph.dependents("a"), ["b".to_string()]);
    }

    #[test]
    fn transitive_dependents_walks_reverse_edges() {
        let graph = TaskGraph::build(vec![
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["b"]),
            task("d", &[]),
        ])
        .unwrap();
        assert_eq!(graph.transitive_dependents("a"), vec!["b", "c"]);
        assert!(graph.transitive_dependents("d").is_empty());
    }

    #[test]
    fn empty_graph() {
        let graph = TaskGraph::build(Vec::new()).unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.critical_path_len(), 0);
        assert!(graph.capabilities().is_empty());
    }
}

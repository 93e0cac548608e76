//! Per-run state: what every task is doing, what is in flight, what came back.
//!
//! The session is owned by the dispatch loop alone; nothing in here locks.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::Instant;

use crate::executor::types::{Assignment, TaskId, TaskResult};
use crate::executor::TaskGraph;
use crate::report::SkipReason;
use crate::resolve::{CanonicalResult, TrustTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Backoff { until: Instant },
    Succeeded,
    PermanentlyFailed,
    Skipped,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::PermanentlyFailed | Self::Skipped
        )
    }
}

#[derive(Debug, Clone)]
pub struct TaskProgress {
    pub state: TaskState,
    /// Attempts started, including the current one.
    pub attempts: u32,
    pub retries_used: u32,
    /// Assignments of the current attempt still running.
    outstanding: usize,
    /// Results of the current attempt.
    batch: Vec<TaskResult>,
    pub last_failed_worker: Option<String>,
    /// Since when the task has been ready without finding a worker.
    pub pending_since: Option<Instant>,
    pub canonical: Option<CanonicalResult>,
    pub error: Option<String>,
    pub skip_reason: Option<SkipReason>,
}

impl TaskProgress {
    fn new() -> Self {
        Self {
            state: TaskState::Pending,
            attempts: 0,
            retries_used: 0,
            outstanding: 0,
            batch: Vec::new(),
            last_failed_worker: None,
            pending_since: None,
            canonical: None,
            error: None,
            skip_reason: None,
        }
    }
}

/// What a completion did to its task.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    /// Unknown assignment, e.g. from before a cancellation.
    Stale,
    /// Other assignments of the same attempt are still running.
    Waiting,
    /// Every assignment of the attempt was revoked without a result; the
    /// task went back to pending and the attempt does not count.
    Requeued { task_id: TaskId },
    /// The attempt is complete; these are all its results.
    Closed {
        task_id: TaskId,
        results: Vec<TaskResult>,
    },
}

pub struct SwarmSession {
    run_id: String,
    graph: Arc<TaskGraph>,
    order: Vec<TaskId>,
    trust: TrustTable,
    progress: HashMap<TaskId, TaskProgress>,
    in_flight: HashMap<u64, Assignment>,
    results: Vec<TaskResult>,
    next_assignment_id: u64,
    first_dispatch: Option<Instant>,
    last_completion: Option<Instant>,
    peak_in_flight: usize,
    cancelled: bool,
}

impl SwarmSession {
    pub fn new(run_id: impl Into<String>, graph: Arc<TaskGraph>, trust: TrustTable) -> Self {
        let order = graph.topological_order();
        let progress = graph
            .ids()
            .map(|id| (id.clone(), TaskProgress::new()))
            .collect();
        Self {
            run_id: run_id.into(),
            graph,
            order,
            trust,
            progress,
            in_flight: HashMap::new(),
            results: Vec::new(),
            next_assignment_id: 0,
            first_dispatch: None,
            last_completion: None,
            peak_in_flight: 0,
            cancelled: false,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn trust(&self) -> &TrustTable {
        &self.trust
    }

    /// Workers registered mid-run join the trust snapshot.
    pub fn refresh_trust(&mut self, latest: &TrustTable) {
        self.trust.merge(latest);
    }

    pub fn progress(&self, task_id: &str) -> Option<&TaskProgress> {
        self.progress.get(task_id)
    }

    pub fn state(&self, task_id: &str) -> Option<TaskState> {
        self.progress.get(task_id).map(|p| p.state)
    }

    /// Every result produced during the run, in arrival order.
    pub fn results(&self) -> &[TaskResult] {
        &self.results
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_finished(&self) -> bool {
        self.progress.values().all(|p| p.state.is_terminal())
    }

    pub fn duration_ms(&self) -> u64 {
        match (self.first_dispatch, self.last_completion) {
            (Some(first), Some(last)) => {
                last.saturating_duration_since(first).as_millis() as u64
            }
            _ => 0,
        }
    }

    /// Pending tasks whose dependencies all succeeded, highest priority
    /// first, then by id.
    pub fn ready_tasks(&self) -> Vec<TaskId> {
        let mut ready: Vec<_> = self
            .graph
            .tasks()
            .filter(|task| self.state(&task.id) == Some(TaskState::Pending))
            .filter(|task| {
                task.dependencies
                    .iter()
                    .all(|dep| self.state(dep) == Some(TaskState::Succeeded))
            })
            .collect();
        ready.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        ready.into_iter().map(|t| t.id.clone()).collect()
    }

    /// Skip every pending task with a failed or skipped dependency.
    /// Returns `(task, dependency)` pairs for the newly skipped ones.
    pub fn propagate_upstream_failures(&mut self) -> Vec<(TaskId, TaskId)> {
        let mut skipped = Vec::new();
        for task_id in &self.order {
            if self.progress.get(task_id).map(|p| p.state) != Some(TaskState::Pending) {
                continue;
            }
            let failed_dep = self.graph.dependencies(task_id).iter().find(|dep| {
                matches!(
                    self.progress.get(dep.as_str()).map(|p| p.state),
                    Some(TaskState::PermanentlyFailed | TaskState::Skipped)
                )
            });
            if let Some(dep) = failed_dep.cloned() {
                if let Some(p) = self.progress.get_mut(task_id) {
                    p.state = TaskState::Skipped;
                    p.pending_since = None;
                    p.skip_reason = Some(SkipReason::UpstreamFailure {
                        dependency: dep.clone(),
                    });
                }
                skipped.push((task_id.clone(), dep));
            }
        }
        skipped
    }

    /// Tasks whose backoff has expired go back to pending.
    pub fn release_backoffs(&mut self, now: Instant) -> Vec<TaskId> {
        let mut released = Vec::new();
        for (task_id, p) in self.progress.iter_mut() {
            if let TaskState::Backoff { until } = p.state {
                if until <= now {
                    p.state = TaskState::Pending;
                    released.push(task_id.clone());
                }
            }
        }
        released.sort();
        released
    }

    pub fn next_backoff_deadline(&self) -> Option<Instant> {
        self.progress
            .values()
            .filter_map(|p| match p.state {
                TaskState::Backoff { until } => Some(until),
                _ => None,
            })
            .min()
    }

    /// Note that a ready task found no worker. Returns since when it has
    /// been waiting.
    pub fn mark_waiting(&mut self, task_id: &str, now: Instant) -> Option<Instant> {
        let p = self.progress.get_mut(task_id)?;
        Some(*p.pending_since.get_or_insert(now))
    }

    /// The task found an eligible worker again.
    pub fn clear_waiting(&mut self, task_id: &str) {
        if let Some(p) = self.progress.get_mut(task_id) {
            p.pending_since = None;
        }
    }

    /// Start a new attempt; returns its 1-based number.
    pub fn begin_attempt(&mut self, task_id: &str) -> Option<u32> {
        let p = self.progress.get_mut(task_id)?;
        p.state = TaskState::Running;
        p.attempts += 1;
        p.outstanding = 0;
        p.batch.clear();
        p.pending_since = None;
        Some(p.attempts)
    }

    /// Undo [`begin_attempt`](Self::begin_attempt) when nothing could be
    /// dispatched after all.
    pub fn abort_attempt(&mut self, task_id: &str) {
        if let Some(p) = self.progress.get_mut(task_id) {
            if p.state == TaskState::Running && p.outstanding == 0 {
                p.state = TaskState::Pending;
                p.attempts = p.attempts.saturating_sub(1);
            }
        }
    }

    pub fn record_dispatch(
        &mut self,
        task_id: &str,
        worker_id: &str,
        attempt: u32,
        now: Instant,
    ) -> Assignment {
        self.next_assignment_id += 1;
        let assignment = Assignment {
            id: self.next_assignment_id,
            task_id: task_id.to_string(),
            worker_id: worker_id.to_string(),
            attempt,
            started_at: now,
        };
        if let Some(p) = self.progress.get_mut(task_id) {
            p.outstanding += 1;
        }
        self.in_flight.insert(assignment.id, assignment.clone());
        self.peak_in_flight = self.peak_in_flight.max(self.in_flight.len());
        self.first_dispatch.get_or_insert(now);
        assignment
    }

    /// Account for a finished (`Some(result)`) or revoked (`None`) assignment.
    pub fn settle(
        &mut self,
        assignment_id: u64,
        result: Option<TaskResult>,
        now: Instant,
    ) -> Settled {
        let Some(assignment) = self.in_flight.remove(&assignment_id) else {
            return Settled::Stale;
        };
        let Some(p) = self.progress.get_mut(&assignment.task_id) else {
            return Settled::Stale;
        };
        p.outstanding = p.outstanding.saturating_sub(1);
        if let Some(result) = result {
            self.last_completion = Some(now);
            p.batch.push(result.clone());
            self.results.push(result);
        }
        if p.outstanding > 0 {
            return Settled::Waiting;
        }
        if p.batch.is_empty() {
            p.state = TaskState::Pending;
            p.attempts = p.attempts.saturating_sub(1);
            return Settled::Requeued {
                task_id: assignment.task_id,
            };
        }
        Settled::Closed {
            task_id: assignment.task_id,
            results: std::mem::take(&mut p.batch),
        }
    }

    pub fn mark_succeeded(&mut self, task_id: &str, canonical: CanonicalResult) {
        if let Some(p) = self.progress.get_mut(task_id) {
            p.state = TaskState::Succeeded;
            p.error = None;
            p.canonical = Some(canonical);
        }
    }

    pub fn mark_backoff(
        &mut self,
        task_id: &str,
        until: Instant,
        failed_worker: Option<String>,
        error: String,
    ) {
        if let Some(p) = self.progress.get_mut(task_id) {
            p.state = TaskState::Backoff { until };
            p.retries_used += 1;
            p.last_failed_worker = failed_worker;
            p.error = Some(error);
        }
    }

    pub fn mark_failed(&mut self, task_id: &str, error: String) {
        if let Some(p) = self.progress.get_mut(task_id) {
            p.state = TaskState::PermanentlyFailed;
            p.pending_since = None;
            p.error = Some(error);
        }
    }

    /// Halt the run: every unresolved task is skipped and in-flight
    /// assignments are forgotten, so late results are discarded.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.in_flight.clear();
        for p in self.progress.values_mut() {
            if !p.state.is_terminal() {
                p.state = TaskState::Skipped;
                p.outstanding = 0;
                p.skip_reason = Some(SkipReason::Cancelled);
            }
        }
    }
}

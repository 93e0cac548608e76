use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{ExecutionConfig, ScalingConfig};
use crate::error::WorkerUnavailableError;
use crate::events::{EventBus, SwarmEvent};
use crate::executor::monitor::{Completion, ExecutionMonitor, RetryDecision};
use crate::executor::scaling::{ScalingDetector, ScalingSignal};
use crate::executor::types::{Priority, Task, TaskId, TaskResult};
use crate::registry::WorkerRegistry;
use crate::report::TaskStatus;
use crate::resolve::ConflictResolver;
use crate::session::{Settled, SwarmSession};

type InFlight = FuturesUnordered<BoxFuture<'static, Completion>>;

/// Single dispatch loop of a run. Owns the session while it runs; worker
/// calls execute concurrently inside the [`ExecutionMonitor`].
pub struct Scheduler {
    execution: ExecutionConfig,
    scaling: ScalingConfig,
    registry: WorkerRegistry,
    monitor: ExecutionMonitor,
    resolver: ConflictResolver,
    events: EventBus,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        execution: ExecutionConfig,
        scaling: ScalingConfig,
        registry: WorkerRegistry,
        monitor: ExecutionMonitor,
        resolver: ConflictResolver,
        cancel: CancellationToken,
    ) -> Self {
        let events = registry.event_bus().clone();
        Self {
            execution,
            scaling,
            registry,
            monitor,
            resolver,
            events,
            cancel,
        }
    }

    /// Drive `session` until every task is terminal or the run is cancelled.
    pub async fn dispatch_loop(&self, session: &mut SwarmSession) {
        let mut inflight: InFlight = FuturesUnordered::new();
        let mut detector = ScalingDetector::new(&self.scaling);
        let poll = self.execution.poll_interval();
        tracing::debug!(
            run_id = %session.run_id(),
            slots = self.monitor.capacity(),
            retry = %self.monitor.retry_strategy(),
            "dispatch loop started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let now = Instant::now();
            self.propagate_failures(session);
            session.release_backoffs(now);
            let unassigned = self.dispatch_ready(session, &mut inflight, now);
            self.propagate_failures(session);
            self.observe_scaling(&mut detector, session, unassigned, now);

            if session.is_finished() {
                break;
            }

            let mut wake = deadline_after(now, poll);
            if let Some(deadline) = session.next_backoff_deadline() {
                wake = wake.min(deadline);
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(completion) = inflight.next(), if !inflight.is_empty() => {
                    self.on_completion(session, completion);
                }
                _ = tokio::time::sleep_until(wake) => {}
            }
        }

        if self.cancel.is_cancelled() {
            tracing::info!(
                run_id = %session.run_id(),
                in_flight = session.in_flight(),
                "run cancelled, abandoning in-flight assignments"
            );
            session.cancel();
            // Each future observes the cancellation and returns at once.
            while inflight.next().await.is_some() {}
        }
    }

    fn redundancy_for(&self, task: &Task) -> usize {
        let n = match task.redundancy {
            Some(n) => n,
            None if task.priority == Priority::Critical => self.execution.critical_redundancy,
            None => 1,
        };
        n.max(1) as usize
    }

    /// Dispatch as many ready tasks as workers and slots allow.
    /// Returns how many ready tasks are left without an assignment.
    fn dispatch_ready(
        &self,
        session: &mut SwarmSession,
        inflight: &mut InFlight,
        now: Instant,
    ) -> usize {
        let ready = session.ready_tasks();
        if ready.is_empty() {
            return 0;
        }
        session.refresh_trust(&self.registry.trust_table());

        let mut unassigned = 0;
        for task_id in ready {
            let Some(task) = session.graph().get(&task_id).cloned() else {
                continue;
            };

            let mut candidates = self.registry.select_for(&task.capability);
            if candidates.is_empty() {
                // Open or busy-degraded workers come back; only an uncovered
                // capability counts towards the unavailable timeout.
                if self.registry.covers(&task.capability) {
                    session.clear_waiting(&task_id);
                    unassigned += 1;
                } else if !self.check_unavailable(session, &task, now) {
                    unassigned += 1;
                }
                continue;
            }
            session.clear_waiting(&task_id);

            if self.monitor.available_slots() == 0 {
                unassigned += 1;
                continue;
            }

            if self.execution.retry_on_different_worker && candidates.len() > 1 {
                if let Some(failed) = session
                    .progress(&task_id)
                    .and_then(|p| p.last_failed_worker.clone())
                {
                    // stable: the failed worker moves behind every alternative
                    candidates.sort_by_key(|w| w.worker_id() == failed);
                }
            }
            candidates.truncate(self.redundancy_for(&task));

            let Some(attempt) = session.begin_attempt(&task_id) else {
                continue;
            };
            let mut dispatched = 0;
            for worker in &candidates {
                let Some(permit) = self.monitor.try_reserve() else {
                    break;
                };
                let Some(lease) = self.registry.begin_assignment(worker.worker_id()) else {
                    continue;
                };
                let assignment = session.record_dispatch(&task_id, worker.worker_id(), attempt, now);
                tracing::debug!(
                    task_id = %task_id,
                    worker_id = %worker.worker_id(),
                    attempt,
                    "task dispatched"
                );
                self.events.emit(SwarmEvent::TaskDispatched {
                    run_id: session.run_id().to_string(),
                    task_id: task_id.clone(),
                    worker_id: worker.worker_id().to_string(),
                    attempt,
                    timestamp: Utc::now(),
                });
                inflight.push(self.monitor.run_assignment(
                    assignment,
                    lease,
                    task.payload.clone(),
                    task.timeout,
                    permit,
                ));
                dispatched += 1;
            }
            if dispatched == 0 {
                session.abort_attempt(&task_id);
                unassigned += 1;
            }
        }
        unassigned
    }

    /// Fail a task whose capability no registered worker has served for
    /// longer than the unavailable timeout. Returns true if it was failed.
    fn check_unavailable(&self, session: &mut SwarmSession, task: &Task, now: Instant) -> bool {
        let Some(since) = session.mark_waiting(&task.id, now) else {
            return false;
        };
        let waited = now.saturating_duration_since(since);
        if waited < self.execution.unavailable_timeout() {
            return false;
        }

        let err = WorkerUnavailableError {
            capability: task.capability.clone(),
            waited_ms: waited.as_millis() as u64,
        };
        tracing::warn!(task_id = %task.id, error = %err, "task failed, no worker available");
        session.mark_failed(&task.id, err.to_string());
        self.emit_resolved(session, &task.id, TaskStatus::PermanentlyFailed);
        true
    }

    fn propagate_failures(&self, session: &mut SwarmSession) {
        for (task_id, dependency) in session.propagate_upstream_failures() {
            tracing::debug!(task_id = %task_id, dependency = %dependency, "task skipped, upstream failure");
            self.emit_resolved(session, &task_id, TaskStatus::Skipped);
        }
    }

    fn observe_scaling(
        &self,
        detector: &mut ScalingDetector,
        session: &SwarmSession,
        ready_tasks: usize,
        now: Instant,
    ) {
        let healthy_workers = self.registry.healthy_count();
        let Some(signal) = detector.observe(ready_tasks, healthy_workers, now) else {
            return;
        };
        let run_id = session.run_id().to_string();
        let timestamp = Utc::now();
        let event = match signal {
            ScalingSignal::ScaleUp { ratio } => {
                tracing::info!(ratio, ready_tasks, healthy_workers, "scale up requested");
                SwarmEvent::ScaleUpRequested {
                    run_id,
                    ratio,
                    ready_tasks,
                    healthy_workers,
                    timestamp,
                }
            }
            ScalingSignal::ScaleDown { ratio } => {
                tracing::info!(ratio, ready_tasks, healthy_workers, "scale down requested");
                SwarmEvent::ScaleDownRequested {
                    run_id,
                    ratio,
                    ready_tasks,
                    healthy_workers,
                    timestamp,
                }
            }
        };
        self.events.emit(event);
    }

    fn on_completion(&self, session: &mut SwarmSession, completion: Completion) {
        let now = Instant::now();
        let settled = match completion {
            Completion::Finished { assignment, result } => {
                tracing::debug!(
                    task_id = %assignment.task_id,
                    worker_id = %assignment.worker_id,
                    attempt = assignment.attempt,
                    success = result.outcome.is_success(),
                    "assignment finished"
                );
                session.settle(assignment.id, Some(result), now)
            }
            Completion::Revoked { assignment } | Completion::Abandoned { assignment } => {
                session.settle(assignment.id, None, now)
            }
        };

        match settled {
            Settled::Closed { task_id, results } => self.close_attempt(session, &task_id, results),
            Settled::Requeued { task_id } => {
                tracing::info!(task_id = %task_id, "task re-queued after its worker left");
            }
            Settled::Waiting | Settled::Stale => {}
        }
    }

    /// All assignments of an attempt are back: resolve, retry or give up.
    fn close_attempt(&self, session: &mut SwarmSession, task_id: &TaskId, results: Vec<TaskResult>) {
        if let Some(canonical) = self.resolver.resolve(task_id, &results, session.trust()) {
            if let Some(conflict) = &canonical.conflict {
                tracing::info!(
                    task_id = %task_id,
                    strategy = ?conflict.strategy,
                    accepted = %conflict.accepted.worker_id,
                    discarded = conflict.discarded.len(),
                    "conflicting results resolved"
                );
            }
            session.mark_succeeded(task_id, canonical);
            self.emit_resolved(session, task_id, TaskStatus::Success);
            return;
        }

        let Some(task) = session.graph().get(task_id).cloned() else {
            return;
        };
        let error = results
            .iter()
            .filter_map(TaskResult::error_message)
            .collect::<Vec<_>>()
            .join("; ");
        let failed_worker = results.last().map(|r| r.worker_id.clone());
        let (attempts, retries_used) = session
            .progress(task_id)
            .map(|p| (p.attempts, p.retries_used))
            .unwrap_or_default();

        match self.monitor.retry_decision(&task, retries_used, &error) {
            RetryDecision::Retry { delay } => {
                tracing::warn!(
                    task_id = %task_id,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "attempt failed, retrying"
                );
                session.mark_backoff(
                    task_id,
                    deadline_after(Instant::now(), delay),
                    failed_worker,
                    error.clone(),
                );
                self.events.emit(SwarmEvent::TaskRetryScheduled {
                    run_id: session.run_id().to_string(),
                    task_id: task_id.clone(),
                    attempt: attempts + 1,
                    delay_ms: delay.as_millis() as u64,
                    error,
                    timestamp: Utc::now(),
                });
            }
            RetryDecision::Exhausted => {
                tracing::warn!(
                    task_id = %task_id,
                    attempts,
                    error = %error,
                    "task failed permanently"
                );
                session.mark_failed(task_id, error);
                self.emit_resolved(session, task_id, TaskStatus::PermanentlyFailed);
            }
        }
    }

    fn emit_resolved(&self, session: &SwarmSession, task_id: &str, status: TaskStatus) {
        let attempts = session.progress(task_id).map(|p| p.attempts).unwrap_or(0);
        self.events.emit(SwarmEvent::TaskResolved {
            run_id: session.run_id().to_string(),
            task_id: task_id.to_string(),
            status,
            attempts,
            timestamp: Utc::now(),
        });
    }
}

/// Longest the loop ever sleeps or backs off in one go.
const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

fn deadline_after(now: Instant, wait: Duration) -> Instant {
    now.checked_add(wait.min(MAX_WAIT)).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_is_capped() {
        let now = Instant::now();
        assert_eq!(deadline_after(now, Duration::from_millis(5)), now + Duration::from_millis(5));
        assert_eq!(deadline_after(now, Duration::MAX), now + MAX_WAIT);
    }
}

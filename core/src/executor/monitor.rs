use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::TaskExecutionError;
use crate::executor::traits::RetryStrategyPlugin;
use crate::executor::types::{Assignment, Outcome, Payload, Task, TaskResult};
use crate::registry::{WorkerLease, WorkerRegistry};

/// How an assignment ended.
#[derive(Debug)]
pub enum Completion {
    /// The worker answered, failed or timed out.
    Finished {
        assignment: Assignment,
        result: TaskResult,
    },
    /// The worker was deregistered while the assignment ran.
    Revoked { assignment: Assignment },
    /// The run was cancelled while the assignment ran.
    Abandoned { assignment: Assignment },
}

impl Completion {
    pub fn assignment(&self) -> &Assignment {
        match self {
            Self::Finished { assignment, .. }
            | Self::Revoked { assignment }
            | Self::Abandoned { assignment } => assignment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    Exhausted,
}

/// Releases the worker load taken for an assignment, however it ends.
struct LoadGuard {
    registry: WorkerRegistry,
    lease: WorkerLease,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.registry.finish_assignment(&self.lease);
    }
}

/// Runs assignments against workers within a fixed number of execution slots.
#[derive(Clone)]
pub struct ExecutionMonitor {
    registry: WorkerRegistry,
    slots: Arc<Semaphore>,
    capacity: usize,
    retry: Arc<dyn RetryStrategyPlugin>,
    cancel: CancellationToken,
}

impl ExecutionMonitor {
    pub fn new(
        registry: WorkerRegistry,
        capacity: usize,
        retry: Arc<dyn RetryStrategyPlugin>,
        cancel: CancellationToken,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            registry,
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            retry,
            cancel,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn retry_strategy(&self) -> &str {
        self.retry.name()
    }

    /// Take an execution slot if one is free. Never waits.
    pub fn try_reserve(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.slots).try_acquire_owned().ok()
    }

    /// Execute one assignment.
    ///
    /// The worker call runs on its own task and is raced against the task
    /// timeout, run cancellation and worker revocation. A timed-out call is
    /// left running detached; its eventual result is dropped. The slot and
    /// the worker load are released when the returned future completes or
    /// is dropped.
    pub fn run_assignment(
        &self,
        assignment: Assignment,
        lease: WorkerLease,
        payload: Payload,
        timeout: Duration,
        permit: OwnedSemaphorePermit,
    ) -> BoxFuture<'static, Completion> {
        let registry = self.registry.clone();
        let cancel = self.cancel.clone();

        async move {
            let _permit = permit;
            let revoked = lease.revoked.clone();
            let executor = Arc::clone(&lease.executor);
            let _load = LoadGuard {
                registry: registry.clone(),
                lease,
            };

            let started = Instant::now();
            let mut handle = tokio::spawn(async move { executor.execute(payload).await });

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    handle.abort();
                    return Completion::Abandoned { assignment };
                }
                _ = revoked.cancelled() => {
                    handle.abort();
                    tracing::debug!(
                        task_id = %assignment.task_id,
                        worker_id = %assignment.worker_id,
                        "assignment revoked"
                    );
                    return Completion::Revoked { assignment };
                }
                res = tokio::time::timeout(timeout, &mut handle) => match res {
                    Err(_) => Outcome::TimedOut,
                    Ok(Ok(Ok(output))) => Outcome::Success(output),
                    Ok(Ok(Err(e))) => Outcome::Failure(
                        TaskExecutionError::Worker {
                            worker_id: assignment.worker_id.clone(),
                            message: format!("{e:#}"),
                        }
                        .to_string(),
                    ),
                    Ok(Err(_join_err)) => Outcome::Failure(
                        TaskExecutionError::Panicked {
                            worker_id: assignment.worker_id.clone(),
                        }
                        .to_string(),
                    ),
                },
            };

            let duration_ms = started.elapsed().as_millis() as u64;
            if matches!(outcome, Outcome::TimedOut) {
                tracing::warn!(
                    task_id = %assignment.task_id,
                    worker_id = %assignment.worker_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "assignment timed out"
                );
            }
            registry.report_outcome(&assignment.worker_id, outcome.is_success());

            let result = TaskResult {
                task_id: assignment.task_id.clone(),
                worker_id: assignment.worker_id.clone(),
                attempt: assignment.attempt,
                outcome,
                produced_at: Utc::now(),
                duration_ms,
            };
            Completion::Finished { assignment, result }
        }
        .boxed()
    }

    /// Whether a failed attempt gets another go, and after how long.
    pub fn retry_decision(&self, task: &Task, retries_used: u32, error: &str) -> RetryDecision {
        if self.retry.should_retry(retries_used, task.max_retries, error) {
            RetryDecision::Retry {
                delay: self.retry.next_delay(retries_used, error),
            }
        } else {
            RetryDecision::Exhausted
        }
    }
}

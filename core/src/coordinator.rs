//! Public entry point: run a task graph against a worker registry.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::SwarmConfig;
use crate::error::FatalError;
use crate::events::SwarmEvent;
use crate::executor::traits::{
    ConcurrencyContext, ConcurrencyStrategyPlugin, ExponentialBackoff, PayloadClassifier,
    RetryStrategyPlugin,
};
use crate::executor::types::Task;
use crate::executor::{ExecutionMonitor, Scheduler, TaskGraph};
use crate::registry::WorkerRegistry;
use crate::report::{ResultAggregator, SwarmReport};
use crate::resolve::ConflictResolver;
use crate::session::SwarmSession;

pub struct SwarmCoordinatorBuilder {
    config: SwarmConfig,
    retry: Option<Arc<dyn RetryStrategyPlugin>>,
    concurrency: Option<Arc<dyn ConcurrencyStrategyPlugin>>,
    classifier: Option<Arc<dyn PayloadClassifier>>,
}

impl SwarmCoordinatorBuilder {
    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategyPlugin>) -> Self {
        self.retry = Some(strategy);
        self
    }

    pub fn concurrency_strategy(mut self, strategy: Arc<dyn ConcurrencyStrategyPlugin>) -> Self {
        self.concurrency = Some(strategy);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn PayloadClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn build(self) -> SwarmCoordinator {
        let retry = self
            .retry
            .unwrap_or_else(|| {
                Arc::new(ExponentialBackoff::new(self.config.retry.clone()))
                    as Arc<dyn RetryStrategyPlugin>
            });
        let resolver = match self.classifier {
            Some(classifier) => ConflictResolver::with_classifier(classifier),
            None => ConflictResolver::new(),
        };
        SwarmCoordinator {
            config: self.config,
            retry,
            concurrency: self.concurrency,
            resolver,
        }
    }
}

pub struct SwarmCoordinator {
    config: SwarmConfig,
    retry: Arc<dyn RetryStrategyPlugin>,
    concurrency: Option<Arc<dyn ConcurrencyStrategyPlugin>>,
    resolver: ConflictResolver,
}

impl SwarmCoordinator {
    pub fn new(config: SwarmConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: SwarmConfig) -> SwarmCoordinatorBuilder {
        SwarmCoordinatorBuilder {
            config,
            retry: None,
            concurrency: None,
            classifier: None,
        }
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub async fn run(
        &self,
        graph: TaskGraph,
        registry: &WorkerRegistry,
    ) -> Result<SwarmReport, FatalError> {
        self.run_with_cancel(graph, registry, CancellationToken::new())
            .await
    }

    /// Build the graph from `tasks`, then [`run`](Self::run) it.
    pub async fn run_tasks(
        &self,
        tasks: Vec<Task>,
        registry: &WorkerRegistry,
    ) -> Result<SwarmReport, FatalError> {
        let graph = TaskGraph::build(tasks)?;
        self.run(graph, registry).await
    }

    /// Run until every task resolved or `cancel` fires. A cancelled run
    /// still returns a report, flagged `cancelled`.
    pub async fn run_with_cancel(
        &self,
        graph: TaskGraph,
        registry: &WorkerRegistry,
        cancel: CancellationToken,
    ) -> Result<SwarmReport, FatalError> {
        self.check_viable(&graph, registry)?;

        let run_id = uuid::Uuid::new_v4().to_string();
        let graph = Arc::new(graph);
        let slots = self.slot_count(registry, graph.len());
        let events = registry.event_bus().clone();

        tracing::info!(
            run_id = %run_id,
            tasks = graph.len(),
            workers = registry.len(),
            slots,
            retry = %self.retry.name(),
            classifier = ?self.resolver.classifier_name(),
            "swarm run started"
        );
        events.emit(SwarmEvent::RunStarted {
            run_id: run_id.clone(),
            total_tasks: graph.len(),
            slots,
            timestamp: Utc::now(),
        });

        let started = Instant::now();
        let mut session = SwarmSession::new(run_id.clone(), Arc::clone(&graph), registry.trust_table());
        let monitor = ExecutionMonitor::new(
            registry.clone(),
            slots,
            Arc::clone(&self.retry),
            cancel.clone(),
        );
        let scheduler = Scheduler::new(
            self.config.execution.clone(),
            self.config.scaling.clone(),
            registry.clone(),
            monitor,
            self.resolver.clone(),
            cancel,
        );
        scheduler.dispatch_loop(&mut session).await;

        let report = ResultAggregator::aggregate(&session);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            run_id = %run_id,
            succeeded = report.summary.succeeded,
            failed = report.summary.permanently_failed,
            skipped = report.summary.skipped,
            retries = report.summary.total_retries,
            conflicts = report.summary.conflicts,
            cancelled = report.cancelled,
            elapsed_ms,
            "swarm run finished"
        );
        events.emit(SwarmEvent::RunFinished {
            run_id,
            duration_ms: elapsed_ms,
            cancelled: report.cancelled,
            timestamp: Utc::now(),
        });
        Ok(report)
    }

    fn check_viable(&self, graph: &TaskGraph, registry: &WorkerRegistry) -> Result<(), FatalError> {
        if graph.is_empty() {
            return Ok(());
        }
        let capabilities = graph.capabilities();
        let uncovered: Vec<&str> = capabilities
            .iter()
            .copied()
            .filter(|c| !registry.covers(c))
            .collect();
        if uncovered.len() == capabilities.len() {
            return Err(FatalError::NoViableWorkers {
                capabilities: capabilities.into_iter().map(str::to_string).collect(),
            });
        }
        if !uncovered.is_empty() {
            tracing::warn!(
                capabilities = ?uncovered,
                "no registered worker for some capabilities, their tasks will wait"
            );
        }
        Ok(())
    }

    /// Execution slots for a run: an explicit cap wins, then the concurrency
    /// strategy, then healthy workers times the per-worker factor.
    fn slot_count(&self, registry: &WorkerRegistry, total_tasks: usize) -> usize {
        if let Some(max) = self.config.execution.max_concurrency {
            return max.max(1);
        }
        let ctx = ConcurrencyContext {
            healthy_workers: registry.healthy_count(),
            registered_workers: registry.len(),
            per_worker_concurrency: self.config.execution.per_worker_concurrency,
            total_tasks,
        };
        match &self.concurrency {
            Some(strategy) => strategy.calculate_concurrency(&ctx).max(1),
            None => ctx.default_slots(),
        }
    }
}

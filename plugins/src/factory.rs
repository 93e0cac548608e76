use std::sync::Arc;

use anyhow::Result;

use swarm_core::config::{ConcurrencyConfig, RetryConfig, SwarmConfig};
use swarm_core::executor::traits::{
    ConcurrencyStrategyPlugin, PayloadClassifier, RetryStrategyPlugin, WorkerExecutor,
};
use swarm_core::{SwarmCoordinator, WorkerRegistry, WorkerSpec};

use crate::classifiers::JsonPointerClassifier;
use crate::executor::strategies::{
    BoundedConcurrencyPlugin, ExponentialBackoff, FixedConcurrencyPlugin, FixedDelayRetryPlugin,
    LinearRetryPlugin,
};
use crate::workers::EchoWorker;

pub fn build_retry_strategy(cfg: &RetryConfig) -> Result<Arc<dyn RetryStrategyPlugin>> {
    match cfg.strategy.as_str() {
        "exponential-backoff" | "exponential" => Ok(Arc::new(ExponentialBackoff::new(cfg.clone()))),
        "linear" => Ok(Arc::new(LinearRetryPlugin::new(cfg.clone()))),
        "fixed" => Ok(Arc::new(FixedDelayRetryPlugin::new(cfg.clone()))),
        other => anyhow::bail!("unknown retry strategy: {other}"),
    }
}

/// `None` keeps the engine's own sizing (healthy workers x per-worker factor).
pub fn build_concurrency_strategy(
    cfg: &ConcurrencyConfig,
) -> Result<Option<Arc<dyn ConcurrencyStrategyPlugin>>> {
    match cfg.strategy.as_str() {
        "per-worker" => Ok(None),
        "fixed" => {
            if cfg.fixed == 0 {
                anyhow::bail!("concurrency.fixed must be >= 1 with the fixed strategy");
            }
            Ok(Some(Arc::new(FixedConcurrencyPlugin::new(cfg.fixed))))
        }
        "bounded" => Ok(Some(Arc::new(BoundedConcurrencyPlugin::new(cfg.clone())))),
        other => anyhow::bail!("unknown concurrency strategy: {other}"),
    }
}

pub fn build_classifier(pointer: &str) -> Result<Arc<dyn PayloadClassifier>> {
    Ok(Arc::new(JsonPointerClassifier::new(pointer)?))
}

/// Coordinator with the strategies named in `cfg`.
pub fn build_coordinator(cfg: &SwarmConfig, vote_by: Option<&str>) -> Result<SwarmCoordinator> {
    let mut builder = SwarmCoordinator::builder(cfg.clone())
        .retry_strategy(build_retry_strategy(&cfg.retry)?);
    if let Some(strategy) = build_concurrency_strategy(&cfg.concurrency)? {
        builder = builder.concurrency_strategy(strategy);
    }
    if let Some(pointer) = vote_by {
        builder = builder.classifier(build_classifier(pointer)?);
    }
    Ok(builder.build())
}

/// Registry of reference [`EchoWorker`]s, one per spec.
pub fn build_echo_registry(cfg: &SwarmConfig, specs: Vec<WorkerSpec>) -> WorkerRegistry {
    let registry = WorkerRegistry::from_config(cfg);
    for spec in specs {
        let worker: Arc<dyn WorkerExecutor> = Arc::new(EchoWorker::new(spec.worker_id.clone()));
        registry.register(spec, worker);
    }
    registry
}

use std::time::Duration;

use crate::config::RetryConfig;

/// Retry strategy plugin
pub trait RetryStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Delay before retry number `retry` (0 for the first retry).
    fn next_delay(&self, retry: u32, error: &str) -> Duration;

    fn should_retry(&self, retries_used: u32, max_retries: u32, error: &str) -> bool {
        retries_used < max_retries && !self.is_fatal_error(error)
    }

    fn is_fatal_error(&self, _error: &str) -> bool {
        false
    }
}

/// Concurrency strategy plugin: sizes the execution slot pool of a run.
pub trait ConcurrencyStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize;
}

#[derive(Debug, Clone)]
pub struct ConcurrencyContext {
    pub healthy_workers: usize,
    pub registered_workers: usize,
    pub per_worker_concurrency: usize,
    pub total_tasks: usize,
}

impl ConcurrencyContext {
    /// Healthy workers times the per-worker factor, never below one slot.
    pub fn default_slots(&self) -> usize {
        self.healthy_workers
            .saturating_mul(self.per_worker_concurrency)
            .max(1)
    }
}

/// `base_delay * 2^retry`, capped at `max_delay`.
pub struct ExponentialBackoff {
    config: RetryConfig,
}

impl ExponentialBackoff {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl RetryStrategyPlugin for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, retry: u32, _error: &str) -> Duration {
        let exp = 1u64 << retry.min(30);
        let delay = self.config.base_delay_ms.saturating_mul(exp);
        Duration::from_millis(delay.min(self.config.max_delay_ms))
    }
}

use swarm_core::config::ConcurrencyConfig;
use swarm_core::executor::traits::{ConcurrencyContext, ConcurrencyStrategyPlugin};

/// Per-worker sizing clamped to `[min_concurrency, max_concurrency]` and
/// never above the number of tasks.
pub struct BoundedConcurrencyPlugin {
    config: ConcurrencyConfig,
}

pub struct FixedConcurrencyPlugin {
    fixed: usize,
}

impl BoundedConcurrencyPlugin {
    pub fn new(config: ConcurrencyConfig) -> Self {
        Self { config }
    }
}

impl FixedConcurrencyPlugin {
    pub fn new(fixed: usize) -> Self {
        Self { fixed }
    }
}

impl ConcurrencyStrategyPlugin for BoundedConcurrencyPlugin {
    fn name(&self) -> &str {
        "bounded"
    }

    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize {
        let min = self.config.min_concurrency.max(1);
        let max = self.config.max_concurrency.max(min);
        let desired = context.default_slots().clamp(min, max);
        desired.min(context.total_tasks.max(1))
    }
}

impl ConcurrencyStrategyPlugin for FixedConcurrencyPlugin {
    fn name(&self) -> &str {
        "fixed"
    }

    fn calculate_concurrency(&self, _context: &ConcurrencyContext) -> usize {
        self.fixed.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(healthy: usize, tasks: usize) -> ConcurrencyContext {
        ConcurrencyContext {
            healthy_workers: healthy,
            registered_workers: healthy,
            per_worker_concurrency: 2,
            total_tasks: tasks,
        }
    }

    #[test]
    fn test_bounded_concurrency() {
        let cfg = ConcurrencyConfig {
            strategy: "bounded".to_string(),
            fixed: 0,
            min_concurrency: 2,
            max_concurrency: 8,
        };
        let plugin = BoundedConcurrencyPlugin::new(cfg);

        assert_eq!(plugin.calculate_concurrency(&context(10, 100)), 8);
        assert_eq!(plugin.calculate_concurrency(&context(0, 100)), 2);
        assert_eq!(plugin.calculate_concurrency(&context(3, 100)), 6);
        assert_eq!(plugin.calculate_concurrency(&context(3, 4)), 4);
    }

    #[test]
    fn test_fixed_concurrency() {
        let plugin = FixedConcurrencyPlugin::new(3);
        assert_eq!(plugin.calculate_concurrency(&context(0, 1)), 3);
        assert_eq!(FixedConcurrencyPlugin::new(0).calculate_concurrency(&context(5, 5)), 1);
    }
}

use std::time::Duration;

use swarm_core::config::RetryConfig;
use swarm_core::executor::traits::RetryStrategyPlugin;

pub use swarm_core::executor::traits::ExponentialBackoff;

/// `base_delay * (retry + 1)`, capped at `max_delay`.
pub struct LinearRetryPlugin {
    config: RetryConfig,
}

/// Same delay before every retry.
pub struct FixedDelayRetryPlugin {
    delay: Duration,
}

impl LinearRetryPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl FixedDelayRetryPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryStrategyPlugin for LinearRetryPlugin {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, retry: u32, _error: &str) -> Duration {
        let multiplier = retry.saturating_add(1) as u64;
        let delay = self.config.base_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(delay.min(self.config.max_delay_ms))
    }
}

impl RetryStrategyPlugin for FixedDelayRetryPlugin {
    fn name(&self) -> &str {
        "fixed"
    }

    fn next_delay(&self, _retry: u32, _error: &str) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(strategy: &str) -> RetryConfig {
        RetryConfig {
            strategy: strategy.to_string(),
            base_delay_ms: 100,
            max_delay_ms: 250,
        }
    }

    #[test]
    fn test_linear_retry() {
        let plugin = LinearRetryPlugin::new(cfg("linear"));
        assert_eq!(plugin.next_delay(0, "err").as_millis(), 100);
        assert_eq!(plugin.next_delay(1, "err").as_millis(), 200);
        assert_eq!(plugin.next_delay(2, "err").as_millis(), 250);
    }

    #[test]
    fn test_fixed_delay() {
        let plugin = FixedDelayRetryPlugin::new(cfg("fixed"));
        assert_eq!(plugin.next_delay(0, "err"), plugin.next_delay(9, "err"));
        assert!(plugin.should_retry(0, 1, "err"));
        assert!(!plugin.should_retry(1, 1, "err"));
    }
}

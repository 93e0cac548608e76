use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const MAX_POLL_INTERVAL_MS: u64 = 60_000;
const MAX_RETRY_DELAY_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwarmConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    #[serde(default)]
    pub circuit: CircuitConfig,

    #[serde(default)]
    pub scaling: ScalingConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

impl SwarmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.per_worker_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "execution.per_worker_concurrency must be >= 1".into(),
            ));
        }
        if self.execution.max_concurrency == Some(0) {
            return Err(ConfigError::Invalid(
                "execution.max_concurrency must be >= 1".into(),
            ));
        }
        if self.execution.critical_redundancy == 0 {
            return Err(ConfigError::Invalid(
                "execution.critical_redundancy must be >= 1".into(),
            ));
        }
        if self.execution.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "execution.poll_interval_ms must be <= {MAX_POLL_INTERVAL_MS}"
            )));
        }
        if self.retry.max_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "retry.max_delay_ms must be <= {MAX_RETRY_DELAY_MS}"
            )));
        }
        if self.circuit.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit.failure_threshold must be >= 1".into(),
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.max_delay_ms must be >= retry.base_delay_ms".into(),
            ));
        }
        if !(self.scaling.low_watermark >= 0.0
            && self.scaling.low_watermark <= self.scaling.high_watermark)
        {
            return Err(ConfigError::Invalid(format!(
                "scaling watermarks out of order (low={}, high={})",
                self.scaling.low_watermark, self.scaling.high_watermark
            )));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "events.channel_capacity must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "swarm_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Hard cap on concurrent assignments; overrides the per-worker sizing.
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    #[serde(default = "default_per_worker_concurrency")]
    pub per_worker_concurrency: usize,

    /// How often the dispatch loop re-evaluates when nothing completes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long a ready task may wait without any eligible worker before it
    /// is failed permanently.
    #[serde(default = "default_unavailable_timeout_ms")]
    pub unavailable_timeout_ms: u64,

    /// Redundancy applied to `Critical` tasks that do not set their own.
    #[serde(default = "default_critical_redundancy")]
    pub critical_redundancy: u32,

    /// Prefer a different worker than the one that failed last on retry.
    #[serde(default = "default_retry_on_different_worker")]
    pub retry_on_different_worker: bool,
}

fn default_per_worker_concurrency() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    25
}

fn default_unavailable_timeout_ms() -> u64 {
    30_000
}

fn default_critical_redundancy() -> u32 {
    1
}

fn default_retry_on_different_worker() -> bool {
    true
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            per_worker_concurrency: default_per_worker_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            unavailable_timeout_ms: default_unavailable_timeout_ms(),
            critical_redundancy: default_critical_redundancy(),
            retry_on_different_worker: default_retry_on_different_worker(),
        }
    }
}

impl ExecutionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn unavailable_timeout(&self) -> Duration {
        Duration::from_millis(self.unavailable_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_strategy")]
    pub strategy: String,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: default_retry_strategy(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_retry_strategy() -> String {
    "exponential-backoff".to_string()
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// "per-worker" (default sizing), "fixed" or "bounded".
    #[serde(default = "default_concurrency_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub fixed: usize,
    #[serde(default = "default_min_concurrency")]
    pub min_concurrency: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            strategy: default_concurrency_strategy(),
            fixed: 0,
            min_concurrency: default_min_concurrency(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_concurrency_strategy() -> String {
    "per-worker".to_string()
}

fn default_min_concurrency() -> usize {
    1
}

fn default_max_concurrency() -> usize {
    32
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Consecutive failures that open a worker's circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl CircuitConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingConfig {
    #[serde(default = "default_scaling_enabled")]
    pub enabled: bool,
    /// Ready-but-unassigned tasks per healthy worker above which a scale-up is requested.
    #[serde(default = "default_high_watermark")]
    pub high_watermark: f64,
    #[serde(default = "default_low_watermark")]
    pub low_watermark: f64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            enabled: default_scaling_enabled(),
            high_watermark: default_high_watermark(),
            low_watermark: default_low_watermark(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl ScalingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_scaling_enabled() -> bool {
    true
}

fn default_high_watermark() -> f64 {
    2.0
}

fn default_low_watermark() -> f64 {
    0.25
}

fn default_debounce_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    1024
}

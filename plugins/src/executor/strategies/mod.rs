pub mod concurrency;
pub mod retry;

pub use concurrency::{BoundedConcurrencyPlugin, FixedConcurrencyPlugin};
pub use retry::{ExponentialBackoff, FixedDelayRetryPlugin, LinearRetryPlugin};

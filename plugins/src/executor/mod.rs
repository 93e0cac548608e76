pub mod strategies;

pub use strategies::{
    BoundedConcurrencyPlugin, ExponentialBackoff, FixedConcurrencyPlugin, FixedDelayRetryPlugin,
    LinearRetryPlugin,
};

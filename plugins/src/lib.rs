//! Pluggable pieces for swarm-core: retry and concurrency strategies,
//! payload classifiers for result voting, reference workers, and factory
//! functions that assemble them from configuration.

pub mod classifiers;
pub mod executor;
pub mod factory;
pub mod workers;

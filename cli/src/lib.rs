//! swarm-cli library: command implementations exposed for tests.

pub mod commands;
pub mod error;
pub mod progress;

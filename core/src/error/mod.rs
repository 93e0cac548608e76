#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;
pub mod graph;

pub use error::{ConfigError, InputError};
pub use executor::{
    FatalError, TaskExecutionError, UpstreamFailureError, WorkerUnavailableError,
};
pub use graph::GraphError;

//! Swarm orchestration engine.
//!
//! Takes a dependency graph of tasks, hands them to a pool of
//! capability-tagged workers, keeps an eye on worker health and folds
//! redundant results into a single report.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod executor;
pub mod input;
pub mod registry;
pub mod report;
pub mod resolve;
pub mod session;

pub use config::SwarmConfig;
pub use coordinator::{SwarmCoordinator, SwarmCoordinatorBuilder};
pub use error::{FatalError, GraphError};
pub use events::{EventBus, SwarmEvent};
pub use executor::traits::{
    ConcurrencyContext, ConcurrencyStrategyPlugin, FnWorker, PayloadClassifier,
    RetryStrategyPlugin, WorkerExecutor,
};
pub use executor::{Payload, Priority, Task, TaskGraph};
pub use input::InputParser;
pub use registry::{Health, WorkerRegistry, WorkerSpec};
pub use report::{SkipReason, SwarmReport, TaskReport, TaskStatus};
pub use resolve::{CanonicalResult, Conflict, ConflictResolver, ResolutionStrategy};
pub use session::SwarmSession;

//! Task graph execution.
//!
//! ```text
//! Vec<Task>
//!   ↓
//! TaskGraph::build() → DuplicateId / UnknownDependency / Cycle
//!   ↓
//! Scheduler::dispatch_loop()
//!   ├─ ready set (dependencies succeeded), priority order
//!   ├─ WorkerRegistry::select_for(capability)
//!   └─ ExecutionMonitor::run_assignment() → Completion
//!   ↓
//! ConflictResolver → CanonicalResult → SwarmSession
//! ```

mod graph;
mod monitor;
mod scaling;
mod scheduler;
pub mod traits;
pub mod types;

pub use graph::{TaskGraph, TopologicalLayers};
pub use monitor::{Completion, ExecutionMonitor, RetryDecision};
pub use scaling::{ScalingDetector, ScalingSignal};
pub use scheduler::Scheduler;
pub use types::{Assignment, Outcome, Payload, Priority, Task, TaskId, TaskResult};

use tokio::time::Instant;

use super::task::TaskId;

/// A task attempt bound to one worker. Lives while the attempt is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub id: u64,
    pub task_id: TaskId,
    pub worker_id: String,
    pub attempt: u32,
    pub started_at: Instant,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::TaskStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwarmEvent {
    RunStarted {
        run_id: String,
        total_tasks: usize,
        slots: usize,
        timestamp: DateTime<Utc>,
    },
    TaskDispatched {
        run_id: String,
        task_id: String,
        worker_id: String,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },
    TaskRetryScheduled {
        run_id: String,
        task_id: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
        timestamp: DateTime<Utc>,
    },
    TaskResolved {
        run_id: String,
        task_id: String,
        status: TaskStatus,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },
    ScaleUpRequested {
        run_id: String,
        ratio: f64,
        ready_tasks: usize,
        healthy_workers: usize,
        timestamp: DateTime<Utc>,
    },
    ScaleDownRequested {
        run_id: String,
        ratio: f64,
        ready_tasks: usize,
        healthy_workers: usize,
        timestamp: DateTime<Utc>,
    },
    CircuitOpened {
        worker_id: String,
        consecutive_failures: u32,
        timestamp: DateTime<Utc>,
    },
    CircuitClosed {
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    RunFinished {
        run_id: String,
        duration_ms: u64,
        cancelled: bool,
        timestamp: DateTime<Utc>,
    },
}

impl SwarmEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::TaskDispatched { .. } => "task_dispatched",
            Self::TaskRetryScheduled { .. } => "task_retry_scheduled",
            Self::TaskResolved { .. } => "task_resolved",
            Self::ScaleUpRequested { .. } => "scale_up_requested",
            Self::ScaleDownRequested { .. } => "scale_down_requested",
            Self::CircuitOpened { .. } => "circuit_opened",
            Self::CircuitClosed { .. } => "circuit_closed",
            Self::RunFinished { .. } => "run_finished",
        }
    }

    /// Task the event is about, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::TaskDispatched { task_id, .. }
            | Self::TaskRetryScheduled { task_id, .. }
            | Self::TaskResolved { task_id, .. } => Some(task_id),
            _ => None,
        }
    }
}

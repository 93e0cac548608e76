use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::breaker::Health;
use crate::executor::traits::WorkerExecutor;

/// Static description of a worker, as found in a registration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub worker_id: String,
    pub capabilities: BTreeSet<String>,
    #[serde(default = "default_trust_weight")]
    pub trust_weight: f64,
}

fn default_trust_weight() -> f64 {
    1.0
}

impl WorkerSpec {
    pub fn new<I, S>(worker_id: impl Into<String>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            worker_id: worker_id.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            trust_weight: default_trust_weight(),
        }
    }

    pub fn with_trust(mut self, trust_weight: f64) -> Self {
        self.trust_weight = trust_weight;
        self
    }

    pub fn serves(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

/// Point-in-time copy of a worker's live state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSnapshot {
    #[serde(flatten)]
    pub spec: WorkerSpec,
    /// Registration sequence; lower registered earlier.
    pub seq: u64,
    pub load: usize,
    pub health: Health,
    pub consecutive_failures: u32,
}

impl WorkerSnapshot {
    pub fn worker_id(&self) -> &str {
        &self.spec.worker_id
    }
}

/// Handle for one assignment on a worker: the executor to call and the
/// token that fires when the worker is deregistered.
#[derive(Clone)]
pub struct WorkerLease {
    pub worker_id: String,
    pub(crate) seq: u64,
    pub executor: Arc<dyn WorkerExecutor>,
    pub revoked: CancellationToken,
}

impl std::fmt::Debug for WorkerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLease")
            .field("worker_id", &self.worker_id)
            .field("seq", &self.seq)
            .field("revoked", &self.revoked.is_cancelled())
            .finish()
    }
}

//! Worker registry: who can run what, and how healthy they are.
//!
//! All state lives behind one mutex with short, non-async critical sections.
//! Readers always get copies ([`WorkerSnapshot`]). Events produced by a state
//! change are emitted after the lock is released.

mod breaker;
mod worker;

pub use breaker::{BreakerState, BreakerTransition, CircuitBreaker, Health};
pub use worker::{WorkerLease, WorkerSnapshot, WorkerSpec};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{CircuitConfig, SwarmConfig};
use crate::events::{EventBus, SwarmEvent};
use crate::executor::traits::WorkerExecutor;
use crate::resolve::TrustTable;

struct WorkerEntry {
    spec: WorkerSpec,
    seq: u64,
    executor: Arc<dyn WorkerExecutor>,
    breaker: BreakerState,
    load: usize,
    revoke: CancellationToken,
}

impl WorkerEntry {
    fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            spec: self.spec.clone(),
            seq: self.seq,
            load: self.load,
            health: self.breaker.health,
            consecutive_failures: self.breaker.consecutive_failures,
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    workers: HashMap<String, WorkerEntry>,
    next_seq: u64,
}

#[derive(Clone)]
pub struct WorkerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    breaker: CircuitBreaker,
    events: EventBus,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new(&CircuitConfig::default())
    }
}

impl WorkerRegistry {
    pub fn new(circuit: &CircuitConfig) -> Self {
        Self::with_events(circuit, EventBus::default())
    }

    pub fn with_events(circuit: &CircuitConfig, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::default())),
            breaker: CircuitBreaker::new(circuit.failure_threshold, circuit.cooldown()),
            events,
        }
    }

    pub fn from_config(config: &SwarmConfig) -> Self {
        Self::with_events(
            &config.circuit,
            EventBus::new(config.events.channel_capacity),
        )
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Add a worker, or replace spec and executor of an existing one while
    /// keeping its health, load and registration order.
    pub fn register(&self, spec: WorkerSpec, executor: Arc<dyn WorkerExecutor>) {
        let mut inner = self.lock();
        let worker_id = spec.worker_id.clone();
        if let Some(entry) = inner.workers.get_mut(&worker_id) {
            entry.spec = spec;
            entry.executor = executor;
            tracing::debug!(worker_id = %worker_id, "worker re-registered");
            return;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        tracing::debug!(worker_id = %worker_id, seq, "worker registered");
        inner.workers.insert(
            worker_id,
            WorkerEntry {
                spec,
                seq,
                executor,
                breaker: BreakerState::default(),
                load: 0,
                revoke: CancellationToken::new(),
            },
        );
    }

    /// Remove a worker. Its in-flight assignments are revoked; returns how
    /// many there were, or `None` if the worker was unknown.
    pub fn deregister(&self, worker_id: &str) -> Option<usize> {
        let entry = self.lock().workers.remove(worker_id)?;
        entry.revoke.cancel();
        if entry.load > 0 {
            tracing::info!(
                worker_id = %worker_id,
                in_flight = entry.load,
                "worker deregistered with in-flight assignments"
            );
        }
        Some(entry.load)
    }

    /// Workers able to take a `capability` task right now, best first:
    /// ascending load, healthy before degraded, then registration order.
    pub fn select_for(&self, capability: &str) -> Vec<WorkerSnapshot> {
        let now = Instant::now();
        let mut half_opened = Vec::new();
        let mut selected: Vec<WorkerSnapshot> = {
            let mut inner = self.lock();
            inner
                .workers
                .values_mut()
                .filter(|entry| entry.spec.serves(capability))
                .filter_map(|entry| {
                    if self.breaker.refresh(&mut entry.breaker, now).is_some() {
                        half_opened.push(entry.spec.worker_id.clone());
                    }
                    match entry.breaker.health {
                        Health::CircuitOpen => None,
                        Health::Degraded if entry.load > 0 => None,
                        _ => Some(entry.snapshot()),
                    }
                })
                .collect()
        };
        for worker_id in half_opened {
            tracing::info!(worker_id = %worker_id, "circuit cooldown elapsed, worker degraded");
        }
        selected.sort_by_key(|w| (w.load, w.health.rank(), w.seq));
        selected
    }

    /// Feed an attempt outcome into the worker's circuit breaker.
    /// Returns the resulting health, or `None` for an unknown worker.
    pub fn report_outcome(&self, worker_id: &str, success: bool) -> Option<Health> {
        let now = Instant::now();
        let (transition, health, failures) = {
            let mut inner = self.lock();
            let entry = inner.workers.get_mut(worker_id)?;
            let transition = if success {
                self.breaker.on_success(&mut entry.breaker)
            } else {
                self.breaker.on_failure(&mut entry.breaker, now)
            };
            (
                transition,
                entry.breaker.health,
                entry.breaker.consecutive_failures,
            )
        };

        match transition {
            Some(BreakerTransition::Opened) => {
                tracing::warn!(
                    worker_id = %worker_id,
                    consecutive_failures = failures,
                    threshold = self.breaker.threshold(),
                    "circuit opened"
                );
                self.events.emit(SwarmEvent::CircuitOpened {
                    worker_id: worker_id.to_string(),
                    consecutive_failures: failures,
                    timestamp: Utc::now(),
                });
            }
            Some(BreakerTransition::Closed) => {
                tracing::info!(worker_id = %worker_id, "circuit closed");
                self.events.emit(SwarmEvent::CircuitClosed {
                    worker_id: worker_id.to_string(),
                    timestamp: Utc::now(),
                });
            }
            Some(BreakerTransition::HalfOpened) | None => {}
        }
        Some(health)
    }

    /// Count one more assignment against the worker and hand out what the
    /// monitor needs to run it.
    pub fn begin_assignment(&self, worker_id: &str) -> Option<WorkerLease> {
        let mut inner = self.lock();
        let entry = inner.workers.get_mut(worker_id)?;
        entry.load += 1;
        Some(WorkerLease {
            worker_id: worker_id.to_string(),
            seq: entry.seq,
            executor: Arc::clone(&entry.executor),
            revoked: entry.revoke.clone(),
        })
    }

    /// Release the load taken by [`begin_assignment`](Self::begin_assignment).
    /// A lease from a since-replaced registration is ignored.
    pub fn finish_assignment(&self, lease: &WorkerLease) {
        let mut inner = self.lock();
        if let Some(entry) = inner.workers.get_mut(&lease.worker_id) {
            if entry.seq == lease.seq {
                entry.load = entry.load.saturating_sub(1);
            }
        }
    }

    /// Whether any registered worker, healthy or not, serves `capability`.
    pub fn covers(&self, capability: &str) -> bool {
        self.lock()
            .workers
            .values()
            .any(|entry| entry.spec.serves(capability))
    }

    /// Workers whose circuit is not open.
    pub fn healthy_count(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let mut healthy = 0;
        for entry in inner.workers.values_mut() {
            self.breaker.refresh(&mut entry.breaker, now);
            if entry.breaker.health != Health::CircuitOpen {
                healthy += 1;
            }
        }
        healthy
    }

    pub fn len(&self) -> usize {
        self.lock().workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All workers in registration order.
    pub fn snapshot(&self) -> Vec<WorkerSnapshot> {
        let mut all: Vec<WorkerSnapshot> =
            self.lock().workers.values().map(WorkerEntry::snapshot).collect();
        all.sort_by_key(|w| w.seq);
        all
    }

    pub fn worker(&self, worker_id: &str) -> Option<WorkerSnapshot> {
        self.lock().workers.get(worker_id).map(WorkerEntry::snapshot)
    }

    pub fn trust_table(&self) -> TrustTable {
        let inner = self.lock();
        let mut table = TrustTable::new();
        for entry in inner.workers.values() {
            table.insert(entry.spec.worker_id.clone(), entry.seq, entry.spec.trust_weight);
        }
        table
    }
}

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use swarm_core::config::SwarmConfig;
use swarm_core::{
    Payload, SwarmReport, Task, WorkerExecutor, WorkerRegistry, WorkerSpec,
};

/// Config with short delays so runs finish quickly under a paused clock.
pub fn fast_config() -> SwarmConfig {
    let mut cfg = SwarmConfig::default();
    cfg.retry.base_delay_ms = 10;
    cfg.retry.max_delay_ms = 100;
    cfg.execution.poll_interval_ms = 5;
    cfg.execution.unavailable_timeout_ms = 500;
    cfg.circuit.cooldown_ms = 60_000;
    cfg.scaling.enabled = false;
    cfg
}

/// A task whose payload names itself, so workers can log what they ran.
pub fn task(id: &str, deps: &[&str]) -> Task {
    Task::new(id, "work")
        .with_payload(json!({ "task": id }))
        .depends_on(deps.iter().copied())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mark {
    Start,
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub worker: String,
    pub task: String,
    pub mark: Mark,
}

/// Shared, ordered record of worker calls across all workers of a test.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, worker: &str, payload: &Payload, mark: Mark) {
        let task = payload
            .get("task")
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string();
        match mark {
            Mark::Start => {
                let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
            }
            Mark::Finish => {
                self.running.fetch_sub(1, Ordering::SeqCst);
            }
        }
        self.calls.lock().unwrap().push(Call {
            worker: worker.to_string(),
            task,
            mark,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Tasks in the order they were started.
    pub fn started(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.mark == Mark::Start)
            .map(|c| c.task)
            .collect()
    }

    pub fn started_on(&self, worker: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.mark == Mark::Start && c.worker == worker)
            .map(|c| c.task)
            .collect()
    }

    pub fn position(&self, task: &str, mark: Mark) -> Option<usize> {
        self.calls()
            .iter()
            .position(|c| c.task == task && c.mark == mark)
    }

    /// Highest number of worker calls observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    Ok(Value),
    Fail(String),
    /// Sleep, then answer like the fallback would.
    Sleep(Duration),
}

#[derive(Debug, Clone)]
pub enum Fallback {
    /// `{"worker": id, "input": payload}`
    Echo,
    Ok(Value),
    Fail(String),
}

/// Worker that plays a fixed script of answers, then a fallback forever.
pub struct ScriptedWorker {
    id: String,
    script: Mutex<VecDeque<Step>>,
    fallback: Fallback,
    delay: Duration,
    log: CallLog,
}

impl ScriptedWorker {
    pub fn new(id: &str, log: &CallLog) -> Self {
        Self {
            id: id.to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: Fallback::Echo,
            delay: Duration::ZERO,
            log: log.clone(),
        }
    }

    pub fn then(self, step: Step) -> Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.then(Step::Fail(message.to_string()))
    }

    pub fn otherwise(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Every call takes this long.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn shared(self) -> Arc<dyn WorkerExecutor> {
        Arc::new(self)
    }

    fn answer(&self, fallback: &Fallback, payload: &Payload) -> anyhow::Result<Payload> {
        match fallback {
            Fallback::Echo => Ok(json!({ "worker": self.id, "input": payload })),
            Fallback::Ok(v) => Ok(v.clone()),
            Fallback::Fail(m) => Err(anyhow::anyhow!("{m}")),
        }
    }
}

#[async_trait]
impl WorkerExecutor for ScriptedWorker {
    async fn execute(&self, payload: Payload) -> anyhow::Result<Payload> {
        let step = self.script.lock().unwrap().pop_front();
        self.log.record(&self.id, &payload, Mark::Start);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let out = match step {
            Some(Step::Ok(v)) => Ok(v),
            Some(Step::Fail(m)) => Err(anyhow::anyhow!("{m}")),
            Some(Step::Sleep(d)) => {
                tokio::time::sleep(d).await;
                self.answer(&self.fallback, &payload)
            }
            None => self.answer(&self.fallback, &payload),
        };
        self.log.record(&self.id, &payload, Mark::Finish);
        out
    }
}

pub fn registry(cfg: &SwarmConfig, workers: Vec<(WorkerSpec, Arc<dyn WorkerExecutor>)>) -> WorkerRegistry {
    let registry = WorkerRegistry::from_config(cfg);
    for (spec, executor) in workers {
        registry.register(spec, executor);
    }
    registry
}

pub fn spec(id: &str) -> WorkerSpec {
    WorkerSpec::new(id, ["work"])
}

/// Every submitted id appears exactly once, in submission order.
pub fn assert_each_task_once(report: &SwarmReport, ids: &[&str]) {
    let got: Vec<&str> = report.entries.iter().map(|e| e.task_id.as_str()).collect();
    assert_eq!(got, ids);
    assert_eq!(report.summary.total_tasks, ids.len());
}

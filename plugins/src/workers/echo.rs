use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use swarm_core::executor::traits::WorkerExecutor;
use swarm_core::Payload;

/// Reference worker: answers with the input it got, so replicas agree.
///
/// A `simulate` object in the payload shapes the answer:
/// `delay_ms` sleeps first, `fail` (a message) makes the call fail.
pub struct EchoWorker {
    worker_id: String,
}

impl EchoWorker {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
        }
    }
}

#[async_trait]
impl WorkerExecutor for EchoWorker {
    async fn execute(&self, payload: Payload) -> anyhow::Result<Payload> {
        let simulate = payload.get("simulate");
        if let Some(ms) = simulate.and_then(|s| s.get("delay_ms")).and_then(|v| v.as_u64()) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if let Some(msg) = simulate.and_then(|s| s.get("fail")).and_then(|v| v.as_str()) {
            tracing::debug!(worker_id = %self.worker_id, "simulated failure");
            anyhow::bail!("{msg}");
        }
        tracing::debug!(worker_id = %self.worker_id, "echoing payload");
        Ok(json!({ "input": payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_input() {
        let out = EchoWorker::new("w1").execute(json!({"x": 1})).await.unwrap();
        assert_eq!(out, json!({"input": {"x": 1}}));
    }

    #[tokio::test]
    async fn simulated_failure() {
        let err = EchoWorker::new("w1")
            .execute(json!({"simulate": {"fail": "disk full"}}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_delay() {
        let started = tokio::time::Instant::now();
        EchoWorker::new("w1")
            .execute(json!({"simulate": {"delay_ms": 250}}))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(250));
    }
}

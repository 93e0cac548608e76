use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::executor::types::Payload;

/// Uniform execution contract every worker kind implements.
///
/// Workers are selected by capability tag, never by type, so a new kind of
/// worker only needs this trait and a registration.
#[async_trait]
pub trait WorkerExecutor: Send + Sync {
    async fn execute(&self, payload: Payload) -> anyhow::Result<Payload>;
}

/// Adapts an async closure into a [`WorkerExecutor`].
pub struct FnWorker<F, Fut> {
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnWorker<F, Fut>
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Payload>> + Send,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _fut: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> WorkerExecutor for FnWorker<F, Fut>
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Payload>> + Send,
{
    async fn execute(&self, payload: Payload) -> anyhow::Result<Payload> {
        (self.f)(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_worker_runs_closure() {
        let worker = FnWorker::new(|payload: Payload| async move {
            Ok::<_, anyhow::Error>(serde_json::json!({ "echo": payload }))
        });
        let out = worker.execute(serde_json::json!(3)).await.unwrap();
        assert_eq!(out, serde_json::json!({ "echo": 3 }));
    }
}

use swarm_core::{InputParser, SwarmConfig};
use swarm_plugins::factory;
use tokio_util::sync::CancellationToken;

use super::cli::RunArgs;
use crate::error::CliError;
use crate::progress;

const EXIT_INCOMPLETE: i32 = 1;
const EXIT_CANCELLED: i32 = 130;

pub async fn run(args: RunArgs, mut cfg: SwarmConfig) -> Result<i32, CliError> {
    if let Some(n) = args.max_concurrency {
        cfg.execution.max_concurrency = Some(n);
    }
    cfg.validate()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let graph = InputParser::read_graph(&args.tasks)?;
    let workers = InputParser::read_workers(&args.workers)?;
    let coordinator = factory::build_coordinator(&cfg, args.vote_by.as_deref())
        .map_err(|e| CliError::Config(format!("{e:#}")))?;
    let registry = factory::build_echo_registry(&cfg, workers);

    let progress = args
        .progress
        .then(|| progress::spawn(registry.subscribe()));

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };

    let result = coordinator.run_with_cancel(graph, &registry, cancel).await;
    ctrl_c.abort();

    // Closing the last sender lets the progress task drain and exit.
    drop(registry);
    if let Some(handle) = progress {
        let _ = handle.await;
    }

    let report = result?;
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .map_err(|e| CliError::Anyhow(e.into()))?;
    println!("{rendered}");

    Ok(if report.cancelled {
        EXIT_CANCELLED
    } else if report.all_succeeded() {
        0
    } else {
        EXIT_INCOMPLETE
    })
}

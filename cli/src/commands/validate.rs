use serde_json::json;
use swarm_core::InputParser;

use super::cli::ValidateArgs;
use crate::error::CliError;

/// Builds the graph and prints its stages; a bad document is an error.
pub fn validate(args: ValidateArgs) -> Result<i32, CliError> {
    let graph = InputParser::read_graph(&args.tasks)?;
    let layers: Vec<Vec<String>> = graph.topological_layers().collect();
    let summary = json!({
        "tasks": graph.len(),
        "capabilities": graph.capabilities(),
        "critical_path_len": layers.len(),
        "layers": layers,
    });
    let rendered =
        serde_json::to_string_pretty(&summary).map_err(|e| CliError::Anyhow(e.into()))?;
    println!("{rendered}");
    Ok(0)
}

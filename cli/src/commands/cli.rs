use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "swarm",
    version,
    about = "Run capability-tagged task graphs across a pool of workers"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file; defaults to ~/.swarm/config.toml, then ./swarm.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a task graph with reference echo workers and print the report.
    Run(RunArgs),
    /// Check a task document and print its execution stages.
    Validate(ValidateArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// JSON task document (array or `{"tasks": [...]}`).
    #[arg(long)]
    pub tasks: PathBuf,

    /// JSON worker document (array or `{"workers": [...]}`).
    #[arg(long)]
    pub workers: PathBuf,

    /// Overrides execution.max_concurrency.
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// JSON pointer used to put redundant results to a vote, e.g. `/severity`.
    #[arg(long)]
    pub vote_by: Option<String>,

    #[arg(long)]
    pub pretty: bool,

    /// Show progress bars on stderr.
    #[arg(long)]
    pub progress: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long)]
    pub tasks: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_flags() {
        let args = Args::try_parse_from([
            "swarm",
            "run",
            "--tasks",
            "t.json",
            "--workers",
            "w.json",
            "--max-concurrency",
            "4",
            "--pretty",
            "--config",
            "swarm.toml",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("swarm.toml")));
        match args.command {
            Commands::Run(run) => {
                assert_eq!(run.tasks, PathBuf::from("t.json"));
                assert_eq!(run.max_concurrency, Some(4));
                assert!(run.pretty);
                assert!(!run.progress);
                assert_eq!(run.vote_by, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_requires_workers() {
        assert!(Args::try_parse_from(["swarm", "run", "--tasks", "t.json"]).is_err());
    }
}

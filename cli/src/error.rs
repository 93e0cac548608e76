use swarm_core::error::InputError;
use swarm_core::FatalError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("swarm run aborted: {0}")]
    Fatal(#[from] FatalError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl CliError {
    // 0: all tasks succeeded
    // 1: run finished with failed or skipped tasks
    // 11: config error
    // 12: malformed task/worker document
    // 20: io / logging setup
    // 30: run aborted before dispatch
    // 50: internal/uncategorized
    // 130: cancelled by Ctrl-C
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 11,
            CliError::Input(InputError::Io(_)) => 20,
            CliError::Input(_) => 12,
            CliError::Fatal(_) => 30,
            CliError::Io(_) | CliError::Logging(_) => 20,
            CliError::Anyhow(_) => 50,
        }
    }
}

//! Compute-module binary: the renderer's work horse.

use std::process::ExitCode as ProcessExit;

use dispatch::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ProcessExit {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = compute::ModuleConfig::from_args(std::env::args());
    match compute::run(&config) {
        Ok(()) => ProcessExit::from(ExitCode::Ok),
        Err(compute::RunError::Transport(err)) => {
            error!(%err, "cannot establish the pipe pair");
            ProcessExit::from(ExitCode::OpeningPipe)
        }
        Err(compute::RunError::Threads(err)) => {
            error!(%err, "cannot start worker threads");
            ProcessExit::from(ExitCode::CreatingThreads)
        }
    }
}

//! Controller binary: interactive front end of the renderer.

use std::process::ExitCode as ProcessExit;

use dispatch::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ProcessExit {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = control::ControlConfig::from_args(std::env::args());
    match control::run(&config) {
        Ok(()) => ProcessExit::from(ExitCode::Ok),
        Err(control::RunError::Transport(err)) => {
            error!(%err, "cannot establish the pipe pair");
            ProcessExit::from(ExitCode::OpeningPipe)
        }
        Err(control::RunError::Threads(err)) => {
            error!(%err, "cannot start worker threads");
            ProcessExit::from(ExitCode::CreatingThreads)
        }
    }
}

use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread;

use dispatch::CancelFlag;
use protocol::{Message, Startup};
use tracing::{info, warn};
use transport::{Duplex, RawTerminal, TransportError, ignore_sigpipe};

use crate::config::ModuleConfig;
use crate::handler::message_loop;
use crate::keyboard::keyboard_loop;
use crate::scheduler::Scheduler;

/// Failure modes of the module process.
#[derive(Debug)]
pub enum RunError {
    /// The FIFO pair could not be established.
    Transport(TransportError),
    /// A required thread could not be spawned.
    Threads(io::Error),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport setup failed: {err}"),
            Self::Threads(err) => write!(f, "thread setup failed: {err}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::Threads(err) => Some(err),
        }
    }
}

/// Runs the compute module until quit.
///
/// Establishes the FIFO pair (waiting for the controller to attach as a
/// reader), announces itself with a `Startup` banner carrying the worker
/// count, then services messages and keyboard input until the quit flag is
/// raised by either side.
pub fn run(config: &ModuleConfig) -> Result<(), RunError> {
    ignore_sigpipe();
    let _term = RawTerminal::enter();
    info!(
        workers = config.workers,
        in_pipe = %config.in_pipe.display(),
        out_pipe = %config.out_pipe.display(),
        "compute module starting"
    );

    let quit = Arc::new(CancelFlag::new());
    let pipes =
        Duplex::connect(&config.in_pipe, &config.out_pipe, &quit).map_err(RunError::Transport)?;
    let Duplex { read, write } = pipes;
    let write = Arc::new(write);

    if let Err(err) = write.send(&Message::Startup(Startup::new(config.workers))) {
        warn!(%err, "startup banner not delivered");
    }

    let scheduler = Scheduler::start(config.workers, Arc::clone(&write), Arc::clone(&quit))
        .map_err(RunError::Threads)?;
    let handle = scheduler.handle();

    let reader = {
        let write = Arc::clone(&write);
        let handle = handle.clone();
        let quit = Arc::clone(&quit);
        thread::Builder::new()
            .name(String::from("pipe"))
            .spawn(move || message_loop(&read, &write, &handle, &quit))
            .map_err(RunError::Threads)?
    };
    let keyboard = {
        let write = Arc::clone(&write);
        let quit = Arc::clone(&quit);
        thread::Builder::new()
            .name(String::from("keyboard"))
            .spawn(move || keyboard_loop(&write, &handle, &quit))
            .map_err(RunError::Threads)?
    };

    if reader.join().is_err() {
        warn!("pipe thread panicked");
    }
    if keyboard.join().is_err() {
        warn!("keyboard thread panicked");
    }
    scheduler.join();
    info!("compute module stopped");
    Ok(())
}

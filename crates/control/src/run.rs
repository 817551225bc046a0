use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread;

use dispatch::{CancelFlag, DELAY};
use tracing::{info, warn};
use transport::{Duplex, RawTerminal, ReadPort, TransportError, WritePort, ignore_sigpipe};

use crate::config::ControlConfig;
use crate::controller::Controller;
use crate::keyboard::keyboard_loop;
use crate::screen::LogScreen;

/// Failure modes of the controller process.
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

/// Runs the controller until quit.
///
/// Raw mode is entered before any thread spawns so keypress echo is off
/// from the first prompt; the guard restores the terminal on every exit
/// path.
pub fn run(config: &ControlConfig) -> Result<(), RunError> {
    ignore_sigpipe();
    let _term = RawTerminal::enter();
    info!(
        to_module = %config.to_module.display(),
        from_module = %config.from_module.display(),
        width = config.grid.width(),
        height = config.grid.height(),
        "controller starting; press 'h' for help"
    );

    let quit = Arc::new(CancelFlag::new());
    let pipes = Duplex::connect(&config.from_module, &config.to_module, &quit)
        .map_err(RunError::Transport)?;
    let Duplex { read, write } = pipes;
    let write = Arc::new(write);
    let controller = Arc::new(Controller::new(config, Box::new(LogScreen)));

    let reader = {
        let controller = Arc::clone(&controller);
        let write = Arc::clone(&write);
        let quit = Arc::clone(&quit);
        thread::Builder::new()
            .name(String::from("pipe"))
            .spawn(move || reader_loop(&read, &controller, &write, &quit))
            .map_err(RunError::Threads)?
    };
    let keyboard = {
        let controller = Arc::clone(&controller);
        let write = Arc::clone(&write);
        let quit = Arc::clone(&quit);
        thread::Builder::new()
            .name(String::from("keyboard"))
            .spawn(move || keyboard_loop(&controller, &write, &quit))
            .map_err(RunError::Threads)?
    };

    if reader.join().is_err() {
        warn!("pipe thread panicked");
    }
    if keyboard.join().is_err() {
        warn!("keyboard thread panicked");
    }
    info!("controller stopped");
    Ok(())
}

fn reader_loop(read: &ReadPort, controller: &Controller, out: &WritePort, quit: &CancelFlag) {
    while !quit.is_raised() {
        match read.receive(DELAY) {
            Ok(Some(message)) => controller.handle_message(message, out, quit),
            Ok(None) => {}
            Err(err) => warn!(%err, "dropping unreadable frame"),
        }
    }
}

use std::io::Read;
use std::os::fd::AsFd;
use std::time::Duration;

use rustix::event::{PollFd, PollFlags, poll};
use rustix::fs::Timespec;
use rustix::termios::{self, OptionalActions, Termios};

/// Scoped raw-mode guard for the controlling terminal.
///
/// Entering raw mode disables line buffering and echo so single keypresses
/// reach the keyboard thread immediately; output post-processing stays on
/// so diagnostic lines keep their carriage returns. The saved settings are
/// restored when the guard drops, which covers every exit path including
/// panics unwinding out of `main`.
///
/// When stdin is not a terminal (tests, redirected input) the guard is
/// inert.
///
/// # Examples
///
/// ```no_run
/// let _term = transport::RawTerminal::enter();
/// // single-key input until the guard drops
/// ```
#[derive(Debug)]
pub struct RawTerminal {
    saved: Option<Termios>,
}

impl RawTerminal {
    /// Switches stdin to raw mode, remembering the previous settings.
    #[must_use]
    pub fn enter() -> Self {
        let stdin = std::io::stdin();
        let Ok(saved) = termios::tcgetattr(&stdin) else {
            return Self { saved: None };
        };

        let mut raw = saved.clone();
        raw.make_raw();
        raw.output_modes.insert(termios::OutputModes::OPOST);
        match termios::tcsetattr(&stdin, OptionalActions::Now, &raw) {
            Ok(()) => Self { saved: Some(saved) },
            Err(_) => Self { saved: None },
        }
    }

    /// Reports whether raw mode is actually active.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        self.saved.is_some()
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            let _ = termios::tcsetattr(&std::io::stdin(), OptionalActions::Now, &saved);
        }
    }
}

/// Reads one key from stdin, waiting at most `timeout`.
///
/// Returns `None` when no key arrives in time, so keyboard loops can poll
/// the quit flag between attempts instead of blocking indefinitely. Only
/// meaningful while a [`RawTerminal`] guard is active; in cooked mode the
/// byte arrives after the user presses Enter.
#[must_use]
pub fn read_key(timeout: Duration) -> Option<u8> {
    let stdin = std::io::stdin();
    let stdin_fd = stdin.as_fd();
    let mut fds = [PollFd::new(&stdin_fd, PollFlags::IN)];
    let timespec = Timespec {
        tv_sec: i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX),
        tv_nsec: timeout.subsec_nanos() as _,
    };
    match poll(&mut fds, Some(&timespec)) {
        Ok(0) => None,
        Ok(_) if fds[0].revents().contains(PollFlags::IN) => {
            let mut byte = [0u8; 1];
            let mut handle = stdin.lock();
            match handle.read(&mut byte) {
                Ok(1) => Some(byte[0]),
                Ok(_) => {
                    // Stdin is at EOF (closed or /dev/null): poll keeps
                    // reporting readable, so wait out the quantum here
                    // instead of letting the caller spin.
                    std::thread::sleep(timeout);
                    None
                }
                Err(_) => None,
            }
        }
        Ok(_) => {
            // HUP or NVAL without data behaves like EOF above.
            std::thread::sleep(timeout);
            None
        }
        Err(_) => None,
    }
}

/// Ignores `SIGPIPE` process-wide.
///
/// Must run before the first send: with the default disposition a vanished
/// reader would kill the process instead of surfacing
/// [`crate::TransportError::Disconnected`].
#[allow(unsafe_code)]
pub fn ignore_sigpipe() {
    // SAFETY: SIG_IGN installs no handler code; this only flips the
    // process-wide disposition so writes to a dead pipe return EPIPE.
    unsafe {
        let _ = libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(test)]
mod tests {
    use super::RawTerminal;

    #[test]
    fn guard_is_inert_without_a_terminal() {
        // Test harnesses run with stdin redirected; the guard must not fail.
        let guard = RawTerminal::enter();
        drop(guard);
    }
}

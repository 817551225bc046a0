use dispatch::{CancelFlag, DELAY};
use protocol::Message;
use tracing::{info, warn};
use transport::{WritePort, read_key};

use crate::scheduler::SchedulerHandle;

/// Keyboard loop: `q` quit, `a` abort, `h` help.
///
/// Keys are read raw, one at a time, with a short poll timeout so the quit
/// flag set elsewhere (e.g. by a received `Quit`) ends the loop promptly.
pub(crate) fn keyboard_loop(out: &WritePort, scheduler: &SchedulerHandle, quit: &CancelFlag) {
    while !quit.is_raised() {
        let Some(key) = read_key(DELAY) else {
            continue;
        };
        match key {
            b'q' => {
                info!("quitting compute module");
                quit.raise();
                if out.send(&Message::Quit).is_err() {
                    warn!("quit notice not delivered to controller");
                }
            }
            b'a' => {
                info!("aborting computation from keyboard");
                scheduler.abort();
                if out.send(&Message::Abort).is_err() {
                    warn!("abort notice not delivered to controller");
                }
            }
            b'h' => {
                eprintln!("keys: q quit | a abort | h help");
            }
            _ => {}
        }
    }
}

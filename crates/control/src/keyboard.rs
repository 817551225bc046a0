use dispatch::{CancelFlag, DELAY};
use transport::{WritePort, read_key};

use crate::controller::Controller;

/// One decoded keypress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    /// A plain byte, e.g. `b'q'`.
    Char(u8),
    /// Arrow up.
    Up,
    /// Arrow down.
    Down,
    /// Arrow left.
    Left,
    /// Arrow right.
    Right,
}

const ESC: u8 = 0x1B;

/// Reads and decodes one keypress, folding `ESC [ A..D` escape sequences
/// into arrow keys. Returns `None` when nothing (decodable) arrived within
/// the poll quantum.
fn next_key() -> Option<Key> {
    let byte = read_key(DELAY)?;
    if byte != ESC {
        return Some(Key::Char(byte));
    }
    // The rest of an escape sequence follows near-instantly; a lone ESC
    // press leaves the follow-up reads empty.
    match read_key(DELAY) {
        Some(b'[') => match read_key(DELAY) {
            Some(b'A') => Some(Key::Up),
            Some(b'B') => Some(Key::Down),
            Some(b'C') => Some(Key::Right),
            Some(b'D') => Some(Key::Left),
            _ => None,
        },
        _ => Some(Key::Char(ESC)),
    }
}

/// Keyboard loop: polls for keys until the quit flag is raised.
pub(crate) fn keyboard_loop(controller: &Controller, out: &WritePort, quit: &CancelFlag) {
    while !quit.is_raised() {
        if let Some(key) = next_key() {
            controller.handle_key(key, out, quit);
        }
    }
}

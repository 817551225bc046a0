#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `transport` moves [`protocol`] frames across a pair of named FIFOs. Each
//! process owns one [`ReadPort`] and one [`WritePort`], bundled as a
//! [`Duplex`]; every port guards its file descriptor with its own mutex so
//! multiple threads can send on the same FIFO without interleaving frames.
//!
//! # Design
//!
//! - The read FIFO opens immediately in non-blocking mode and drains any
//!   residual bytes left by an earlier session before the first frame parse.
//! - The write FIFO opens by polling until a peer reader attaches or the
//!   supplied quit flag is raised, because POSIX refuses a writer with no
//!   reader.
//! - [`WritePort::send`] loops over partial writes, sleeping
//!   [`dispatch::DELAY`] on a full pipe up to a bounded retry budget. A
//!   broken pipe clears the descriptor slot so later sends fail fast until
//!   a new peer appears.
//! - [`ReadPort::receive`] reads exactly one frame inside a deadline: one
//!   tag byte (absence within the timeout is "no message", not an error),
//!   then the burst length field if the tag calls for one, then the
//!   remainder, tolerating partial reads. The checksum is verified before
//!   any payload is interpreted.
//! - Transport failures are values: every fallible operation returns
//!   [`TransportError`], and callers decide whether to log, retry, or shut
//!   down.
//!
//! # Invariants
//!
//! - A send either delivers the whole frame or reports failure without the
//!   message appearing on the wire half-written by this call again.
//! - A receive never hands out a frame whose byte sum is not `0xFF`.
//! - `SIGPIPE` must be ignored process-wide before the first send so a
//!   vanished reader surfaces as [`TransportError::Disconnected`] instead
//!   of killing the process; [`ignore_sigpipe`] installs that disposition.
//!
//! # See also
//!
//! - [`RawTerminal`], the scoped guard that flips the controlling terminal
//!   into raw mode for single-key input and restores it on every exit path.

mod error;
mod port;
mod term;

pub use crate::error::TransportError;
pub use crate::port::{Duplex, ReadPort, WritePort};
pub use crate::term::{RawTerminal, ignore_sigpipe, read_key};

/// Number of short sleeps a send may spend waiting out a full pipe before
/// giving up on the frame.
pub const WRITE_RETRY_BUDGET: u32 = 200;

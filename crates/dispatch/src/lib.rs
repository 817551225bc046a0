#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `dispatch` collects the small concurrency primitives both processes are
//! built from: a thread-safe [`CancelFlag`] used for the global quit flag
//! and the per-worker abort flags, a mutex-guarded FIFO [`JobQueue`] that
//! owns its entries, the [`DELAY_MS`] short-wait quantum that paces every
//! poll and retry loop, and the process [`ExitCode`] table.
//!
//! # Design
//!
//! - [`CancelFlag`] wraps an `AtomicBool` with acquire/release ordering so a
//!   flag raised on one thread is observed by every loop that polls it.
//!   Cancellation is cooperative throughout: long loops poll at iteration
//!   boundaries and no thread is ever forcibly stopped.
//! - [`JobQueue`] is generic over its element type; clearing the queue drops
//!   the remaining entries through their own `Drop`, so no disposer callback
//!   is needed. One mutex covers every operation.
//!
//! # Examples
//!
//! ```
//! use dispatch::{CancelFlag, JobQueue};
//!
//! let quit = CancelFlag::new();
//! assert!(!quit.is_raised());
//! quit.raise();
//! assert!(quit.is_raised());
//!
//! let queue = JobQueue::new();
//! queue.push("chunk-0");
//! queue.push("chunk-1");
//! assert_eq!(queue.pop(), Some("chunk-0"));
//! assert_eq!(queue.len(), 1);
//! queue.clear();
//! assert!(queue.pop().is_none());
//! ```

mod cancel;
mod exit;
mod queue;

pub use crate::cancel::CancelFlag;
pub use crate::exit::ExitCode;
pub use crate::queue::JobQueue;

use std::time::Duration;

/// Canonical short-wait unit in milliseconds.
///
/// Receive loops use it as their poll timeout, and contention paths (full
/// pipe, idle boss, late reader) sleep in multiples of it.
pub const DELAY_MS: u64 = 10;

/// [`DELAY_MS`] as a [`Duration`], for `thread::sleep` and channel timeouts.
pub const DELAY: Duration = Duration::from_millis(DELAY_MS);

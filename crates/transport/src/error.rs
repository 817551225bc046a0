use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the FIFO transport.
///
/// Per-frame failures ([`TransportError::Frame`],
/// [`TransportError::FrameTimeout`]) are recoverable: the offending frame
/// is discarded and the next receive starts fresh. [`Disconnected`] is
/// sticky on the write side until a new peer attaches.
///
/// [`Disconnected`]: TransportError::Disconnected
#[derive(Debug, Error)]
pub enum TransportError {
    /// A named pipe could not be opened.
    #[error("cannot open named pipe '{path}': {source}")]
    Open {
        /// Path of the FIFO.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The quit flag was raised while waiting for a peer reader to attach.
    #[error("cancelled while waiting for a reader on the write pipe")]
    Cancelled,

    /// The peer's read end is gone; the descriptor slot has been cleared.
    #[error("peer disconnected; write descriptor invalidated")]
    Disconnected,

    /// The retry budget ran out before the frame was fully written.
    #[error("pipe stayed full: wrote {written} of {len} frame bytes")]
    WriteExhausted {
        /// Bytes delivered before giving up.
        written: usize,
        /// Total frame length.
        len: usize,
    },

    /// A frame started arriving but stalled past the deadline; the partial
    /// frame is discarded.
    #[error("frame stalled mid-read: got {received} of {expected} bytes")]
    FrameTimeout {
        /// Bytes received before the deadline.
        received: usize,
        /// Full frame length implied by the header.
        expected: usize,
    },

    /// The frame arrived complete but failed decoding (unknown tag, length
    /// mismatch, or checksum failure).
    #[error(transparent)]
    Frame(#[from] protocol::FrameError),

    /// Any other I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Reports whether the failure invalidated the write descriptor.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Reports whether the failure is scoped to one frame, leaving the
    /// transport usable.
    #[must_use]
    pub const fn is_frame_local(&self) -> bool {
        matches!(self, Self::Frame(_) | Self::FrameTimeout { .. })
    }
}

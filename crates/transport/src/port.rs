use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use dispatch::{CancelFlag, DELAY};
use protocol::{Message, MessageTag};
use rustix::event::{PollFd, PollFlags, poll};
use rustix::fs::{Mode, OFlags, Timespec};
use rustix::io::Errno;
use tracing::{debug, info, trace, warn};

use crate::WRITE_RETRY_BUDGET;
use crate::error::TransportError;

const DRAIN_BUFFER_SIZE: usize = 256;

/// The receiving half of a duplex FIFO connection.
///
/// The descriptor is non-blocking and guarded by its own mutex so only one
/// thread at a time assembles a frame. Residual bytes from an earlier
/// session are drained at open time.
#[derive(Debug)]
pub struct ReadPort {
    fd: Mutex<OwnedFd>,
}

impl ReadPort {
    /// Opens the FIFO for reading and drains any residual bytes.
    ///
    /// Opening a FIFO read end never blocks when `O_NONBLOCK` is set, so
    /// this returns immediately even before the peer exists.
    pub fn open(path: &Path) -> Result<Self, TransportError> {
        let fd = rustix::fs::open(
            path,
            OFlags::RDONLY | OFlags::NONBLOCK | OFlags::NOCTTY,
            Mode::empty(),
        )
        .map_err(|errno| TransportError::Open {
            path: path.to_path_buf(),
            source: errno.into(),
        })?;

        let drained = drain(fd.as_fd());
        if drained > 0 {
            debug!(path = %path.display(), drained, "discarded residual bytes from read pipe");
        }
        info!(path = %path.display(), "named pipe opened for reading");
        Ok(Self { fd: Mutex::new(fd) })
    }

    /// Wraps an already-open descriptor, e.g. one half of an anonymous
    /// pipe. The descriptor should be non-blocking; nothing is drained.
    #[must_use]
    pub fn from_fd(fd: OwnedFd) -> Self {
        Self { fd: Mutex::new(fd) }
    }

    /// Receives at most one frame within `timeout`.
    ///
    /// Returns `Ok(None)` when no tag byte arrives before the deadline —
    /// an empty pipe is a normal condition, not an error. Once a tag byte
    /// is seen, the rest of the frame must arrive before the same deadline
    /// or the partial frame is discarded with
    /// [`TransportError::FrameTimeout`].
    pub fn receive(&self, timeout: Duration) -> Result<Option<Message>, TransportError> {
        let guard = self.lock();
        let fd = guard.as_fd();
        let deadline = Instant::now() + timeout;

        let mut tag_buf = [0u8; 1];
        if read_until_deadline(fd, &mut tag_buf, deadline)? == 0 {
            return Ok(None);
        }
        let tag = MessageTag::try_from(tag_buf[0])?;

        let (total, len_field) = match tag.fixed_frame_len() {
            Some(len) => (len, None),
            None => {
                let mut len_buf = [0u8; 2];
                let got = read_until_deadline(fd, &mut len_buf, deadline)?;
                if got < len_buf.len() {
                    return Err(TransportError::FrameTimeout {
                        received: 1 + got,
                        expected: 3,
                    });
                }
                (
                    MessageTag::burst_frame_len(u16::from_le_bytes(len_buf)),
                    Some(len_buf),
                )
            }
        };

        let mut frame = vec![0u8; total];
        frame[0] = tag_buf[0];
        let mut filled = 1;
        if let Some(len_buf) = len_field {
            frame[1..3].copy_from_slice(&len_buf);
            filled = 3;
        }

        let got = read_until_deadline(fd, &mut frame[filled..], deadline)?;
        if filled + got < total {
            return Err(TransportError::FrameTimeout {
                received: filled + got,
                expected: total,
            });
        }
        drop(guard);

        let message = Message::decode(&frame)?;
        trace!(tag = %message.tag(), len = total, "frame received");
        Ok(Some(message))
    }

    fn lock(&self) -> MutexGuard<'_, OwnedFd> {
        self.fd.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The sending half of a duplex FIFO connection.
///
/// The descriptor lives in a slot behind a mutex: every send from any
/// thread serialises through the lock, and a broken pipe clears the slot so
/// subsequent sends fail fast instead of re-probing a dead peer.
#[derive(Debug)]
pub struct WritePort {
    slot: Mutex<Option<OwnedFd>>,
}

impl WritePort {
    /// Opens the FIFO for writing, polling until a peer reader attaches or
    /// `quit` is raised.
    ///
    /// POSIX rejects a non-blocking writer with `ENXIO` while the FIFO has
    /// no reader, so the open is retried every [`DELAY`] until it succeeds.
    pub fn open(path: &Path, quit: &CancelFlag) -> Result<Self, TransportError> {
        loop {
            if quit.is_raised() {
                return Err(TransportError::Cancelled);
            }
            match rustix::fs::open(
                path,
                OFlags::WRONLY | OFlags::NONBLOCK | OFlags::NOCTTY,
                Mode::empty(),
            ) {
                Ok(fd) => {
                    info!(path = %path.display(), "named pipe opened for writing");
                    return Ok(Self {
                        slot: Mutex::new(Some(fd)),
                    });
                }
                Err(errno) if errno == Errno::NXIO => thread::sleep(DELAY),
                Err(errno) => {
                    return Err(TransportError::Open {
                        path: path.to_path_buf(),
                        source: errno.into(),
                    });
                }
            }
        }
    }

    /// Wraps an already-open descriptor, e.g. one half of an anonymous
    /// pipe. The descriptor should be non-blocking so a full pipe surfaces
    /// as a retryable condition instead of blocking the sender.
    #[must_use]
    pub fn from_fd(fd: OwnedFd) -> Self {
        Self {
            slot: Mutex::new(Some(fd)),
        }
    }

    /// Serialises `message` and writes the whole frame under the port's
    /// write lock.
    ///
    /// Partial writes continue from where they stopped; a full pipe is
    /// waited out in [`DELAY`] steps up to [`WRITE_RETRY_BUDGET`] sleeps.
    /// On a broken pipe the descriptor slot is cleared and
    /// [`TransportError::Disconnected`] is returned; the message itself is
    /// untouched and the caller may retarget it after a reconnect.
    pub fn send(&self, message: &Message) -> Result<(), TransportError> {
        let mut guard = self.lock();
        let frame = message.encode();
        let mut written = 0usize;
        let mut budget = WRITE_RETRY_BUDGET;

        while written < frame.len() {
            let step = {
                let Some(fd) = guard.as_ref() else {
                    return Err(TransportError::Disconnected);
                };
                rustix::io::write(fd, &frame[written..])
            };
            match step {
                Ok(n) => written += n,
                Err(errno) if errno == Errno::INTR => {}
                Err(errno) if errno == Errno::AGAIN => {
                    if budget == 0 {
                        warn!(
                            tag = %message.tag(),
                            written,
                            len = frame.len(),
                            "giving up on frame: pipe stayed full"
                        );
                        return Err(TransportError::WriteExhausted {
                            written,
                            len: frame.len(),
                        });
                    }
                    budget -= 1;
                    thread::sleep(DELAY);
                }
                Err(errno) if errno == Errno::PIPE => {
                    *guard = None;
                    warn!(tag = %message.tag(), "peer disconnected; write pipe invalidated");
                    return Err(TransportError::Disconnected);
                }
                Err(errno) => return Err(TransportError::Io(errno.into())),
            }
        }

        trace!(tag = %message.tag(), len = frame.len(), "frame sent");
        Ok(())
    }

    /// Reports whether the descriptor slot still holds a live peer.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<OwnedFd>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One process's pair of FIFO endpoints.
///
/// # Examples
///
/// ```no_run
/// use dispatch::CancelFlag;
/// use std::path::Path;
/// use transport::Duplex;
///
/// let quit = CancelFlag::new();
/// let pipes = Duplex::connect(
///     Path::new("/tmp/computational_module.in"),
///     Path::new("/tmp/computational_module.out"),
///     &quit,
/// )?;
/// assert!(pipes.write.is_connected());
/// # Ok::<(), transport::TransportError>(())
/// ```
#[derive(Debug)]
pub struct Duplex {
    /// Frames arriving from the peer.
    pub read: ReadPort,
    /// Frames departing to the peer.
    pub write: WritePort,
}

impl Duplex {
    /// Opens the read FIFO immediately, then polls the write FIFO until the
    /// peer attaches as a reader or `quit` is raised.
    pub fn connect(
        read_path: &Path,
        write_path: &Path,
        quit: &CancelFlag,
    ) -> Result<Self, TransportError> {
        let read = ReadPort::open(read_path)?;
        info!(path = %write_path.display(), "waiting for a reader on the write pipe");
        let write = WritePort::open(write_path, quit)?;
        Ok(Self { read, write })
    }
}

fn drain(fd: BorrowedFd<'_>) -> usize {
    let mut garbage = [0u8; DRAIN_BUFFER_SIZE];
    let mut total = 0;
    loop {
        match rustix::io::read(fd, &mut garbage) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(_) => break,
        }
    }
    total
}

/// Reads into `buf` until it is full or the deadline passes, returning the
/// number of bytes delivered. Success means `buf.len()` bytes arrived.
fn read_until_deadline(
    fd: BorrowedFd<'_>,
    buf: &mut [u8],
    deadline: Instant,
) -> Result<usize, TransportError> {
    let mut filled = 0;
    while filled < buf.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        let mut fds = [PollFd::new(&fd, PollFlags::IN)];
        let timeout = timespec_from(remaining);
        let ready = match poll(&mut fds, Some(&timeout)) {
            Ok(n) => n,
            Err(errno) if errno == Errno::INTR => continue,
            Err(errno) => return Err(TransportError::Io(errno.into())),
        };
        if ready == 0 {
            break;
        }

        if fds[0].revents().contains(PollFlags::IN) {
            match rustix::io::read(fd, &mut buf[filled..]) {
                Ok(0) => {}
                Ok(n) => filled += n,
                Err(errno) if errno == Errno::AGAIN || errno == Errno::INTR => {}
                Err(errno) => return Err(TransportError::Io(errno.into())),
            }
        } else {
            // POLLHUP with no readable data: no writer is attached yet.
            // Wait out a quantum instead of spinning on the hangup event.
            thread::sleep(DELAY.min(remaining));
        }
    }
    Ok(filled)
}

fn timespec_from(duration: Duration) -> Timespec {
    Timespec {
        tv_sec: i64::try_from(duration.as_secs()).unwrap_or(i64::MAX),
        tv_nsec: duration.subsec_nanos() as _,
    }
}

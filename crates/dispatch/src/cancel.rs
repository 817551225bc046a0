use std::sync::atomic::{AtomicBool, Ordering};

/// A single-bit, thread-safe cancellation flag.
///
/// One instance serves as each process's global quit flag; the compute
/// workers carry per-worker abort flags of the same shape. Raising is
/// idempotent and the flag is never lowered once raised, except through
/// [`CancelFlag::reset`], which only coordinator code calls between
/// sessions.
///
/// # Examples
///
/// ```
/// use dispatch::CancelFlag;
/// use std::sync::Arc;
/// use std::thread;
///
/// let flag = Arc::new(CancelFlag::new());
/// let observer = Arc::clone(&flag);
/// let handle = thread::spawn(move || {
///     while !observer.is_raised() {
///         thread::yield_now();
///     }
/// });
/// flag.raise();
/// handle.join().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct CancelFlag {
    raised: AtomicBool,
}

impl CancelFlag {
    /// Creates a lowered flag.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
        }
    }

    /// Raises the flag; visible to every thread that polls afterwards.
    #[inline]
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Lowers the flag so the next cycle starts clean.
    #[inline]
    pub fn reset(&self) {
        self.raised.store(false, Ordering::Release);
    }

    /// Reports whether the flag has been raised.
    #[inline]
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Atomically observes and lowers the flag, returning the prior state.
    ///
    /// The boss loop uses this to consume a pending global abort exactly
    /// once even when new aborts race in behind it.
    #[inline]
    #[must_use]
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }
}

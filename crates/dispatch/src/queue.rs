use std::collections::VecDeque;
use std::sync::Mutex;

/// A mutex-guarded FIFO that owns its entries.
///
/// Pushing transfers ownership into the queue; popping transfers it back to
/// the caller. [`JobQueue::clear`] drops every remaining entry in place, so
/// element cleanup rides on the type's own `Drop` rather than a disposer
/// callback. One lock covers every operation, including size queries.
///
/// The queue is unbounded in principle; in practice the controller's pacing
/// rule keeps it shallow on the module side.
///
/// # Examples
///
/// ```
/// use dispatch::JobQueue;
///
/// let queue = JobQueue::new();
/// queue.push(1);
/// queue.push(2);
/// queue.push(3);
/// assert_eq!(queue.len(), 3);
/// assert_eq!(queue.pop(), Some(1));
/// queue.clear();
/// assert!(queue.is_empty());
/// ```
#[derive(Debug)]
pub struct JobQueue<T> {
    entries: Mutex<VecDeque<T>>,
}

impl<T> JobQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends an entry at the tail.
    pub fn push(&self, entry: T) {
        self.lock().push_back(entry);
    }

    /// Removes and returns the head entry, or `None` when empty.
    ///
    /// Never blocks beyond the internal lock; an empty queue is not an
    /// error.
    #[must_use]
    pub fn pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Drops every queued entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Returns the number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Reports whether the queue holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        // A poisoned queue mutex means a panic mid-push/pop; the deque
        // itself is still structurally sound, so continue with it.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

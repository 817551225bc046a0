use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, TrySendError, bounded};
use dispatch::{CancelFlag, DELAY, JobQueue};
use protocol::{ChunkRequest, ComputeParams};
use tracing::{debug, info, warn};
use transport::WritePort;

mod worker;

/// One unit of work: a chunk request plus the parameters that were current
/// when it was accepted.
///
/// Carrying the parameters inside the job means a later `SetCompute` can
/// never change the constants under a running worker; stale jobs are
/// discarded whole by the abort that accompanies the parameter change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComputeJob {
    /// The requested chunk.
    pub chunk: ChunkRequest,
    /// Parameters in force when the request was accepted.
    pub params: ComputeParams,
}

struct WorkerSeat {
    jobs: Sender<ComputeJob>,
    abort: Arc<CancelFlag>,
    busy: Arc<AtomicBool>,
}

/// Cloneable handle for threads that feed or abort the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    queue: Arc<JobQueue<ComputeJob>>,
    abort: Arc<CancelFlag>,
    worker_count: u8,
}

impl SchedulerHandle {
    /// Deposits a job at the tail of the work queue.
    ///
    /// Never blocks and never inspects the abort flag; draining on abort is
    /// the boss's job alone.
    pub fn submit(&self, job: ComputeJob) {
        self.queue.push(job);
    }

    /// Raises the global abort; the boss purges the queue and flags every
    /// busy worker on its next iteration.
    pub fn abort(&self) {
        self.abort.raise();
    }

    /// Number of workers in the pool.
    #[must_use]
    pub const fn worker_count(&self) -> u8 {
        self.worker_count
    }

    /// Number of jobs waiting for a worker.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

/// The boss/worker pool.
///
/// A fixed pool of workers sized at startup consumes a shared work queue
/// through a single boss thread. Every hand-off goes through a bounded
/// channel of capacity 1, so a worker can never be double-booked and a
/// stray wakeup cannot re-run a previous assignment.
pub struct Scheduler {
    handle: SchedulerHandle,
    boss: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawns `worker_count` workers (clamped to at least one) and the boss
    /// thread. Results are streamed through `out`; all threads wind down
    /// once `quit` is raised.
    ///
    /// # Errors
    ///
    /// Propagates the OS error when a thread cannot be spawned.
    pub fn start(
        worker_count: u8,
        out: Arc<WritePort>,
        quit: Arc<CancelFlag>,
    ) -> std::io::Result<Self> {
        let worker_count = worker_count.max(1);
        let queue = Arc::new(JobQueue::new());
        let abort = Arc::new(CancelFlag::new());

        let mut seats = Vec::with_capacity(usize::from(worker_count));
        let mut workers = Vec::with_capacity(usize::from(worker_count));
        for id in 0..worker_count {
            let (jobs_tx, jobs_rx) = bounded::<ComputeJob>(1);
            let seat_abort = Arc::new(CancelFlag::new());
            let busy = Arc::new(AtomicBool::new(false));

            let thread_abort = Arc::clone(&seat_abort);
            let thread_busy = Arc::clone(&busy);
            let thread_quit = Arc::clone(&quit);
            let thread_out = Arc::clone(&out);
            workers.push(thread::Builder::new().name(format!("worker-{id}")).spawn(
                move || {
                    worker::worker_loop(
                        id,
                        &jobs_rx,
                        &thread_abort,
                        &thread_busy,
                        &thread_quit,
                        &thread_out,
                    );
                },
            )?);
            seats.push(WorkerSeat {
                jobs: jobs_tx,
                abort: seat_abort,
                busy,
            });
        }

        let boss_queue = Arc::clone(&queue);
        let boss_abort = Arc::clone(&abort);
        let boss_quit = Arc::clone(&quit);
        let boss = thread::Builder::new()
            .name(String::from("boss"))
            .spawn(move || boss_loop(&boss_queue, &boss_abort, &boss_quit, &seats))?;

        info!(workers = worker_count, "scheduler started");
        Ok(Self {
            handle: SchedulerHandle {
                queue,
                abort,
                worker_count,
            },
            boss,
            workers,
        })
    }

    /// Returns a cloneable handle for submitting and aborting work.
    #[must_use]
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Waits for the boss and every worker to exit.
    ///
    /// Callers raise the quit flag first; join itself only waits.
    pub fn join(self) {
        if self.boss.join().is_err() {
            warn!("boss thread panicked");
        }
        for (id, worker) in self.workers.into_iter().enumerate() {
            if worker.join().is_err() {
                warn!(worker = id, "worker thread panicked");
            }
        }
    }
}

fn boss_loop(
    queue: &JobQueue<ComputeJob>,
    abort: &CancelFlag,
    quit: &CancelFlag,
    seats: &[WorkerSeat],
) {
    let mut next = 0usize;
    while !quit.is_raised() {
        if abort.take() {
            purge(queue, seats);
            continue;
        }

        let Some(job) = queue.pop() else {
            thread::sleep(DELAY);
            continue;
        };

        if !place(job, seats, &mut next, abort, quit, queue) {
            return;
        }
    }
    debug!("boss exiting");
}

/// Hands `job` to the first non-busy worker, scanning round-robin. Returns
/// `false` when quit was raised while waiting for a free seat.
fn place(
    mut job: ComputeJob,
    seats: &[WorkerSeat],
    next: &mut usize,
    abort: &CancelFlag,
    quit: &CancelFlag,
    queue: &JobQueue<ComputeJob>,
) -> bool {
    loop {
        if quit.is_raised() {
            return false;
        }
        if abort.take() {
            // The job in hand predates the abort; drop it with the queue.
            purge(queue, seats);
            return true;
        }

        let mut placed = false;
        for offset in 0..seats.len() {
            let idx = (*next + offset) % seats.len();
            let seat = &seats[idx];
            if seat.busy.load(Ordering::Acquire) {
                continue;
            }
            seat.busy.store(true, Ordering::Release);
            match seat.jobs.try_send(job) {
                Ok(()) => {
                    *next = (idx + 1) % seats.len();
                    placed = true;
                }
                Err(TrySendError::Full(returned) | TrySendError::Disconnected(returned)) => {
                    seat.busy.store(false, Ordering::Release);
                    job = returned;
                    continue;
                }
            }
            break;
        }
        if placed {
            return true;
        }
        thread::sleep(DELAY);
    }
}

fn purge(queue: &JobQueue<ComputeJob>, seats: &[WorkerSeat]) {
    let dropped = queue.len();
    queue.clear();
    let mut flagged = 0;
    for seat in seats {
        if seat.busy.load(Ordering::Acquire) {
            seat.abort.raise();
            flagged += 1;
        }
    }
    debug!(dropped, flagged, "abort: work queue purged");
}

use std::sync::{Mutex, MutexGuard, PoisonError};

use dispatch::JobQueue;
use protocol::{ChunkRequest, Message, Startup, WORKER_COUNT_RANGE};
use render::{ChunkGrid, Region};
use tracing::{debug, info, warn};
use transport::WritePort;

/// Phase of the current compute session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Session {
    /// No chunks pending or outstanding.
    Idle,
    /// Chunks are queued or awaiting their `Done`.
    Dispatching,
}

#[derive(Debug)]
struct DispatchState {
    outstanding: usize,
    worker_count: u8,
    session: Session,
}

/// The chunk-dispatch engine.
///
/// Slices a compute region into chunk requests, holds them in a pending
/// queue, and releases them so the number of unacknowledged `Compute`
/// frames never exceeds the module's worker count. Until the module's
/// `Startup` banner is observed a conservative count of 1 keeps the
/// pipeline well defined.
#[derive(Debug)]
pub struct Dispatcher {
    pending: JobQueue<ChunkRequest>,
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    /// Creates an idle dispatcher assuming a single module worker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: JobQueue::new(),
            state: Mutex::new(DispatchState {
                outstanding: 0,
                worker_count: 1,
                session: Session::Idle,
            }),
        }
    }

    /// Records the worker count advertised in the module's banner.
    pub fn on_startup(&self, startup: &Startup) {
        let advertised = startup.worker_count();
        let mut state = self.lock();
        if WORKER_COUNT_RANGE.contains(&advertised) {
            state.worker_count = advertised;
            info!(workers = advertised, "module announced its worker pool");
        } else {
            warn!(
                advertised,
                assumed = state.worker_count,
                "module banner carries an implausible worker count"
            );
        }
    }

    /// Module worker count currently assumed for pacing.
    #[must_use]
    pub fn worker_count(&self) -> u8 {
        self.lock().worker_count
    }

    /// Number of `Compute` frames sent but not yet answered with `Done`.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    /// Number of chunks still waiting to be dispatched.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Current session phase.
    #[must_use]
    pub fn session(&self) -> Session {
        self.lock().session
    }

    /// Plans a full-image computation and primes the module's pipeline.
    ///
    /// Any previous plan is discarded. Chunks are generated scanning chunk
    /// rows top to bottom, each with its own lower-left complex origin and
    /// the id `c_row * chunks_in_row + c_col`; then `min(workers, chunks)`
    /// requests are dispatched immediately. Returns the number primed.
    pub fn request_compute(&self, out: &WritePort, grid: &ChunkGrid, region: &Region) -> usize {
        let mut state = self.lock();
        self.pending.clear();

        let step = region.pixel_step(grid.width(), grid.height());
        for c_row in 0..grid.chunks_in_col() {
            for c_col in 0..grid.chunks_in_row() {
                let origin = grid.chunk_origin(region.lower_left, step, c_row, c_col);
                self.pending.push(ChunkRequest {
                    chunk_id: grid.chunk_id(c_row, c_col),
                    re: origin.re,
                    im: origin.im,
                    n_re: grid.chunk_width(),
                    n_im: grid.chunk_height(),
                });
            }
        }

        let quota = usize::from(state.worker_count).saturating_sub(state.outstanding);
        let mut primed = 0;
        for _ in 0..quota {
            let Some(request) = self.pending.pop() else {
                break;
            };
            if !self.send_chunk(out, request) {
                break;
            }
            primed += 1;
        }
        state.outstanding += primed;
        state.session = Session::Dispatching;
        info!(
            chunks = grid.chunk_count(),
            primed, "computation requested"
        );
        primed
    }

    /// Reacts to a `Done`: releases the next pending chunk, or reports
    /// completion when the plan is exhausted. Returns `true` when the
    /// session just became idle.
    pub fn on_done(&self, out: &WritePort) -> bool {
        let mut state = self.lock();
        state.outstanding = state.outstanding.saturating_sub(1);

        if let Some(request) = self.pending.pop() {
            if self.send_chunk(out, request) {
                state.outstanding += 1;
            }
            return false;
        }

        if state.outstanding == 0 && state.session == Session::Dispatching {
            state.session = Session::Idle;
            info!("computation complete");
            return true;
        }
        false
    }

    /// User abort: drops the plan and asks the module to stop.
    pub fn abort(&self, out: &WritePort) {
        let state = self.lock();
        let dropped = self.pending.len();
        self.pending.clear();
        drop(state);
        debug!(dropped, "pending chunks discarded");
        if let Err(err) = out.send(&Message::Abort) {
            warn!(%err, "abort request not delivered");
        }
    }

    /// Module confirmed an abort: discard the plan and any outstanding
    /// accounting; `Done`s for aborted chunks will not arrive.
    pub fn on_abort_confirmed(&self) {
        let mut state = self.lock();
        self.pending.clear();
        state.outstanding = 0;
        state.session = Session::Idle;
    }

    /// A parameter change invalidates the session: purge the plan, since
    /// the module aborts its in-flight work when `SetCompute` lands.
    pub fn purge_for_new_parameters(&self) {
        let mut state = self.lock();
        self.pending.clear();
        state.outstanding = 0;
        state.session = Session::Idle;
    }

    fn send_chunk(&self, out: &WritePort, request: ChunkRequest) -> bool {
        match out.send(&Message::Compute(request)) {
            Ok(()) => true,
            Err(err) => {
                warn!(chunk = request.chunk_id, %err, "chunk request not delivered");
                false
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

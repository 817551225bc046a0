use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use dispatch::{CancelFlag, DELAY_MS};
use protocol::{ChunkResult, Message};
use render::{Complex, escape_time};
use tracing::{debug, trace, warn};
use transport::{TransportError, WritePort};

use super::ComputeJob;

/// Body of one worker thread.
///
/// The worker idles on its capacity-1 job channel, polling the quit flag
/// between waits. Each received job is rendered pixel by pixel; an abort
/// raised mid-chunk discards the buffer without emitting anything. A
/// finished chunk is streamed as one burst followed by `Done`.
pub(super) fn worker_loop(
    id: u8,
    jobs: &Receiver<ComputeJob>,
    abort: &CancelFlag,
    busy: &AtomicBool,
    quit: &CancelFlag,
    out: &WritePort,
) {
    debug!(worker = id, "worker ready");
    loop {
        if quit.is_raised() {
            break;
        }
        let job = match jobs.recv_timeout(Duration::from_millis(DELAY_MS)) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match render_chunk(&job, abort, quit) {
            Some(iters) => {
                trace!(worker = id, chunk = job.chunk.chunk_id, "chunk finished");
                emit(id, job.chunk.chunk_id, iters, out);
            }
            None => {
                debug!(worker = id, chunk = job.chunk.chunk_id, "chunk abandoned");
            }
        }
        // Consume any abort aimed at the job that just ended so it cannot
        // leak into the next assignment.
        abort.reset();
        busy.store(false, Ordering::Release);
    }
    debug!(worker = id, "worker exiting");
}

/// Renders one chunk, returning the iteration counts in row-major,
/// bottom-to-top order, or `None` when the abort or quit flag interrupted
/// the loop.
///
/// A chunk with a zero dimension yields an empty buffer, which the caller
/// still emits so the controller sees its `Done`.
#[must_use]
pub fn render_chunk(job: &ComputeJob, abort: &CancelFlag, quit: &CancelFlag) -> Option<Vec<u8>> {
    let params = &job.params;
    let chunk = &job.chunk;
    let c = Complex::new(params.c_re, params.c_im);

    let mut iters = Vec::with_capacity(usize::from(chunk.n_re) * usize::from(chunk.n_im));
    for row in 0..chunk.n_im {
        for col in 0..chunk.n_re {
            if abort.is_raised() || quit.is_raised() {
                return None;
            }
            let z0 = Complex::new(
                chunk.re + f64::from(col) * params.d_re,
                chunk.im + f64::from(row) * params.d_im,
            );
            iters.push(escape_time(z0, c, params.n));
        }
    }
    Some(iters)
}

fn emit(id: u8, chunk_id: u8, iters: Vec<u8>, out: &WritePort) {
    let burst = match ChunkResult::new(chunk_id, iters) {
        Ok(burst) => burst,
        Err(err) => {
            warn!(worker = id, chunk = chunk_id, %err, "result does not fit a burst frame");
            return;
        }
    };
    for message in [Message::ComputeDataBurst(burst), Message::Done] {
        match out.send(&message) {
            Ok(()) => {}
            Err(TransportError::Disconnected) => {
                warn!(worker = id, chunk = chunk_id, "controller gone; result dropped");
                return;
            }
            Err(err) => {
                warn!(worker = id, chunk = chunk_id, %err, "failed to stream result");
                return;
            }
        }
    }
}

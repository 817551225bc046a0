use dispatch::{CancelFlag, DELAY};
use protocol::{ComputeParams, Message, PROTOCOL_VERSION};
use tracing::{debug, info, warn};
use transport::{ReadPort, WritePort};

use crate::scheduler::{ComputeJob, SchedulerHandle};

/// Message-handler loop: the body of the module's pipe-reader thread.
///
/// Reads one frame at a time and reacts:
///
/// - `GetVersion` → reply `Version`.
/// - `SetCompute` → raise the global abort, install the new parameters,
///   reply `Ok`. The abort guarantees no worker mixes parameter
///   generations; jobs queued afterwards carry the new values.
/// - `Compute` → with usable parameters installed, enqueue a job carrying
///   a copy of them; otherwise reply `Error` without enqueuing.
/// - `Abort` → raise the global abort and confirm with an `Abort` reply
///   once the request is taken.
/// - `Quit` → raise the quit flag and return. Nothing is sent in response.
///
/// Frame-local transport failures (bad checksum, unknown tag, stalled
/// frame) are logged and skipped; the loop continues with the next frame.
pub fn message_loop(
    pipe: &ReadPort,
    out: &WritePort,
    scheduler: &SchedulerHandle,
    quit: &CancelFlag,
) {
    let mut params: Option<ComputeParams> = None;

    while !quit.is_raised() {
        let message = match pipe.receive(DELAY) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(err) => {
                warn!(%err, "dropping unreadable frame");
                continue;
            }
        };

        match message {
            Message::GetVersion => {
                info!("controller requested version");
                reply(out, &Message::Version(PROTOCOL_VERSION));
            }
            Message::SetCompute(new_params) => {
                info!(
                    n = new_params.n,
                    "controller set computation parameters"
                );
                scheduler.abort();
                params = Some(new_params);
                reply(out, &Message::Ok);
            }
            Message::Compute(chunk) => match params.filter(|p| usable(p)) {
                Some(params) => {
                    debug!(chunk = chunk.chunk_id, "chunk request accepted");
                    scheduler.submit(ComputeJob { chunk, params });
                }
                None => {
                    warn!(
                        chunk = chunk.chunk_id,
                        "chunk request rejected: no usable parameters installed"
                    );
                    reply(out, &Message::Error);
                }
            },
            Message::Abort => {
                info!("controller requested abort");
                scheduler.abort();
                reply(out, &Message::Abort);
            }
            Message::Quit => {
                info!("controller requested quit");
                quit.raise();
            }
            unexpected => {
                warn!(tag = %unexpected.tag(), "unexpected message from controller");
                reply(out, &Message::Error);
            }
        }
    }
    debug!("message handler exiting");
}

/// Parameters are usable when the iteration cap is non-zero, both step
/// components are non-zero, and the recursive constant is not the origin.
fn usable(params: &ComputeParams) -> bool {
    params.n != 0
        && params.d_re != 0.0
        && params.d_im != 0.0
        && !(params.c_re == 0.0 && params.c_im == 0.0)
}

fn reply(out: &WritePort, message: &Message) {
    if let Err(err) = out.send(message) {
        warn!(tag = %message.tag(), %err, "reply not delivered");
    }
}

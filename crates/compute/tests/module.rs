//! The module's message handler driven end to end over anonymous pipes.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use compute::{Scheduler, message_loop};
use dispatch::{CancelFlag, DELAY};
use protocol::{ChunkRequest, ComputeParams, Message, Version};
use rustix::pipe::{PipeFlags, pipe_with};
use transport::{ReadPort, WritePort};

const DEADLINE: Duration = Duration::from_secs(5);

struct Harness {
    to_module: WritePort,
    from_module: ReadPort,
    quit: Arc<CancelFlag>,
    handler: thread::JoinHandle<()>,
    scheduler: Scheduler,
}

fn start_module(workers: u8) -> Harness {
    let (module_read, controller_write) = pipe_with(PipeFlags::NONBLOCK).expect("pipe");
    let (controller_read, module_write) = pipe_with(PipeFlags::NONBLOCK).expect("pipe");

    let module_read = ReadPort::from_fd(module_read);
    let module_write = Arc::new(WritePort::from_fd(module_write));
    let quit = Arc::new(CancelFlag::new());

    let scheduler = Scheduler::start(workers, Arc::clone(&module_write), Arc::clone(&quit))
        .expect("scheduler starts");
    let handle = scheduler.handle();

    let handler = {
        let quit = Arc::clone(&quit);
        thread::spawn(move || message_loop(&module_read, &module_write, &handle, &quit))
    };

    Harness {
        to_module: WritePort::from_fd(controller_write),
        from_module: ReadPort::from_fd(controller_read),
        quit,
        handler,
        scheduler,
    }
}

fn recv(harness: &Harness) -> Message {
    let deadline = Instant::now() + DEADLINE;
    while Instant::now() < deadline {
        match harness.from_module.receive(DELAY) {
            Ok(Some(message)) => return message,
            Ok(None) => {}
            Err(err) => panic!("unexpected transport error: {err}"),
        }
    }
    panic!("module never replied");
}

fn shutdown(harness: Harness) {
    harness
        .to_module
        .send(&Message::Quit)
        .expect("quit delivered");
    harness.handler.join().expect("handler thread");
    assert!(harness.quit.is_raised());
    harness.scheduler.join();
}

#[test]
fn get_version_round_trips() {
    let harness = start_module(2);
    harness
        .to_module
        .send(&Message::GetVersion)
        .expect("send request");
    assert_eq!(recv(&harness), Message::Version(Version::new(1, 2, 3)));
    shutdown(harness);
}

#[test]
fn compute_before_set_compute_is_rejected() {
    let harness = start_module(2);
    harness
        .to_module
        .send(&Message::Compute(ChunkRequest {
            chunk_id: 0,
            re: 0.0,
            im: 0.0,
            n_re: 4,
            n_im: 4,
        }))
        .expect("send request");
    assert_eq!(recv(&harness), Message::Error);
    shutdown(harness);
}

#[test]
fn minimal_compute_streams_a_deterministic_burst() {
    let harness = start_module(2);

    harness
        .to_module
        .send(&Message::SetCompute(ComputeParams {
            c_re: -0.4,
            c_im: 0.6,
            d_re: 0.1,
            d_im: 0.1,
            n: 10,
        }))
        .expect("send parameters");
    assert_eq!(recv(&harness), Message::Ok);

    harness
        .to_module
        .send(&Message::Compute(ChunkRequest {
            chunk_id: 7,
            re: -1.6,
            im: -1.1,
            n_re: 2,
            n_im: 2,
        }))
        .expect("send request");

    match recv(&harness) {
        Message::ComputeDataBurst(burst) => {
            assert_eq!(burst.chunk_id(), 7);
            assert_eq!(burst.len(), 4);
            assert_eq!(burst.iters()[0], 1, "origin pixel escapes in one step");
            assert!(burst.iters().iter().all(|&iter| iter <= 10));
        }
        other => panic!("expected burst, got {other:?}"),
    }
    assert_eq!(recv(&harness), Message::Done);
    shutdown(harness);
}

#[test]
fn set_compute_with_degenerate_values_still_gates_compute() {
    let harness = start_module(1);

    harness
        .to_module
        .send(&Message::SetCompute(ComputeParams {
            c_re: 0.0,
            c_im: 0.0,
            d_re: 0.1,
            d_im: 0.1,
            n: 10,
        }))
        .expect("send parameters");
    assert_eq!(recv(&harness), Message::Ok);

    harness
        .to_module
        .send(&Message::Compute(ChunkRequest {
            chunk_id: 1,
            re: 0.0,
            im: 0.0,
            n_re: 2,
            n_im: 2,
        }))
        .expect("send request");
    assert_eq!(recv(&harness), Message::Error);
    shutdown(harness);
}

#[test]
fn abort_is_confirmed_with_an_abort_reply() {
    let harness = start_module(2);
    harness
        .to_module
        .send(&Message::Abort)
        .expect("send abort");
    assert_eq!(recv(&harness), Message::Abort);
    shutdown(harness);
}

#[test]
fn unexpected_direction_draws_an_error_reply() {
    let harness = start_module(1);
    harness.to_module.send(&Message::Done).expect("send done");
    assert_eq!(recv(&harness), Message::Error);
    shutdown(harness);
}

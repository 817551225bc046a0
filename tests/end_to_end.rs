//! Both processes' cores wired together over real named FIFOs.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use compute::ModuleConfig;
use control::{ControlConfig, Controller, Key, LogScreen, Session};
use dispatch::{CancelFlag, DELAY};
use protocol::{ChunkRequest, ComputeParams, Message, Version};
use render::ChunkGrid;
use rustix::fs::{CWD, FileType, Mode, mknodat};
use transport::{Duplex, ReadPort, WritePort};

const DEADLINE: Duration = Duration::from_secs(10);

struct Fixture {
    _dir: tempfile::TempDir,
    to_module: PathBuf,
    from_module: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let to_module = dir.path().join("module.in");
    let from_module = dir.path().join("module.out");
    for path in [&to_module, &from_module] {
        mknodat(CWD, path, FileType::Fifo, Mode::RUSR | Mode::WUSR, 0).expect("mkfifo");
    }
    Fixture {
        _dir: dir,
        to_module,
        from_module,
    }
}

fn spawn_module(fixture: &Fixture, workers: u8) -> thread::JoinHandle<()> {
    let config = ModuleConfig {
        in_pipe: fixture.to_module.clone(),
        out_pipe: fixture.from_module.clone(),
        workers,
    };
    thread::spawn(move || compute::run(&config).expect("module runs to completion"))
}

fn connect_controller(fixture: &Fixture, quit: &CancelFlag) -> Duplex {
    Duplex::connect(&fixture.from_module, &fixture.to_module, quit).expect("controller connects")
}

fn recv(read: &ReadPort) -> Message {
    let deadline = Instant::now() + DEADLINE;
    while Instant::now() < deadline {
        match read.receive(DELAY) {
            Ok(Some(message)) => return message,
            Ok(None) => {}
            Err(err) => panic!("unexpected transport error: {err}"),
        }
    }
    panic!("module never replied");
}

fn expect_startup(read: &ReadPort, workers: u8) {
    match recv(read) {
        Message::Startup(startup) => {
            assert_eq!(startup.identifier(), b"COMPUTE");
            assert_eq!(startup.worker_count(), workers);
        }
        other => panic!("expected startup banner, got {other:?}"),
    }
}

#[test]
fn version_and_precondition_round_trip() {
    let fixture = fixture();
    let module = spawn_module(&fixture, 2);

    let quit = CancelFlag::new();
    let pipes = connect_controller(&fixture, &quit);
    expect_startup(&pipes.read, 2);

    pipes.write.send(&Message::GetVersion).expect("send");
    assert_eq!(recv(&pipes.read), Message::Version(Version::new(1, 2, 3)));

    // Compute without SetCompute must be refused.
    pipes
        .write
        .send(&Message::Compute(ChunkRequest {
            chunk_id: 0,
            re: 0.0,
            im: 0.0,
            n_re: 4,
            n_im: 4,
        }))
        .expect("send");
    assert_eq!(recv(&pipes.read), Message::Error);

    pipes.write.send(&Message::Quit).expect("send");
    module.join().expect("module thread");
}

#[test]
fn minimal_compute_is_deterministic_on_the_wire() {
    let fixture = fixture();
    let module = spawn_module(&fixture, 2);

    let quit = CancelFlag::new();
    let pipes = connect_controller(&fixture, &quit);
    expect_startup(&pipes.read, 2);

    pipes
        .write
        .send(&Message::SetCompute(ComputeParams {
            c_re: -0.4,
            c_im: 0.6,
            d_re: 0.1,
            d_im: 0.1,
            n: 10,
        }))
        .expect("send");
    assert_eq!(recv(&pipes.read), Message::Ok);

    pipes
        .write
        .send(&Message::Compute(ChunkRequest {
            chunk_id: 7,
            re: -1.6,
            im: -1.1,
            n_re: 2,
            n_im: 2,
        }))
        .expect("send");

    match recv(&pipes.read) {
        Message::ComputeDataBurst(burst) => {
            assert_eq!(burst.chunk_id(), 7);
            assert_eq!(burst.len(), 4);
            assert_eq!(burst.iters()[0], 1, "origin pixel escapes in one step");
            assert!(burst.iters().iter().all(|&iter| iter <= 10));
        }
        other => panic!("expected burst, got {other:?}"),
    }
    assert_eq!(recv(&pipes.read), Message::Done);

    pipes.write.send(&Message::Quit).expect("send");
    module.join().expect("module thread");
}

struct DrivenController {
    controller: Arc<Controller>,
    write: Arc<WritePort>,
    quit: Arc<CancelFlag>,
    reader: thread::JoinHandle<()>,
}

/// Wires a full `Controller` to the module over the FIFOs, with a reader
/// thread feeding `handle_message` exactly as `control::run` does.
fn drive_controller(fixture: &Fixture, grid: ChunkGrid, iterations: u8) -> DrivenController {
    let quit = Arc::new(CancelFlag::new());
    let pipes = connect_controller(fixture, &quit);
    let Duplex { read, write } = pipes;
    let write = Arc::new(write);

    let config = ControlConfig {
        to_module: fixture.to_module.clone(),
        from_module: fixture.from_module.clone(),
        grid,
        iterations,
        ..ControlConfig::default()
    };
    let controller = Arc::new(Controller::new(&config, Box::new(LogScreen)));

    let reader = {
        let controller = Arc::clone(&controller);
        let write = Arc::clone(&write);
        let quit = Arc::clone(&quit);
        thread::spawn(move || {
            while !quit.is_raised() {
                match read.receive(DELAY) {
                    Ok(Some(message)) => controller.handle_message(message, &write, &quit),
                    Ok(None) => {}
                    Err(err) => panic!("unexpected transport error: {err}"),
                }
            }
        })
    };

    DrivenController {
        controller,
        write,
        quit,
        reader,
    }
}

impl DrivenController {
    fn press(&self, key: u8) {
        self.controller
            .handle_key(Key::Char(key), &self.write, &self.quit);
    }

    fn wait_for_idle(&self) {
        let deadline = Instant::now() + DEADLINE;
        loop {
            let dispatcher = self.controller.dispatcher();
            if dispatcher.session() == Session::Idle
                && dispatcher.outstanding() == 0
                && dispatcher.pending() == 0
            {
                return;
            }
            assert!(Instant::now() < deadline, "session never quiesced");
            thread::sleep(DELAY);
        }
    }

    fn shutdown(self, module: thread::JoinHandle<()>) {
        self.press(b'q');
        self.reader.join().expect("reader thread");
        module.join().expect("module thread");
    }
}

#[test]
fn full_image_computes_and_paints_the_bitmap() {
    let fixture = fixture();
    let module = spawn_module(&fixture, 4);

    let grid = ChunkGrid::new(64, 48, 4, 4);
    let driven = drive_controller(&fixture, grid, 100);

    // Let the startup banner land so pacing uses the real worker count.
    let deadline = Instant::now() + DEADLINE;
    while driven.controller.dispatcher().worker_count() != 4 {
        assert!(Instant::now() < deadline, "startup banner never arrived");
        thread::sleep(DELAY);
    }

    driven.press(b's');
    driven.press(b'1');
    driven.wait_for_idle();

    // The default region around the dragon Julia set has escaping points;
    // at least part of the bitmap must be coloured.
    let mut coloured = 0usize;
    for row in 0..grid.height() {
        for col in 0..grid.width() {
            if driven.controller.pixel(row, col) != Some([0, 0, 0]) {
                coloured += 1;
            }
        }
    }
    assert!(coloured > 0, "computation painted nothing");

    driven.shutdown(module);
}

#[test]
fn abort_mid_stream_quiesces_the_session() {
    let fixture = fixture();
    let module = spawn_module(&fixture, 2);

    let grid = ChunkGrid::new(64, 48, 4, 4);
    let driven = drive_controller(&fixture, grid, 255);

    driven.press(b's');
    driven.press(b'1');
    thread::sleep(Duration::from_millis(20));
    driven.press(b'a');

    // The module confirms the abort; the session must settle to idle with
    // the pending plan discarded, whether or not a few in-flight chunks
    // still streamed in.
    driven.wait_for_idle();
    assert_eq!(driven.controller.dispatcher().pending(), 0);

    driven.shutdown(module);
}

#[test]
fn module_survives_a_vanishing_controller_reader() {
    let fixture = fixture();
    let module = spawn_module(&fixture, 1);

    let quit = CancelFlag::new();
    let pipes = connect_controller(&fixture, &quit);
    expect_startup(&pipes.read, 1);

    pipes
        .write
        .send(&Message::SetCompute(ComputeParams {
            c_re: -0.4,
            c_im: 0.6,
            d_re: 0.01,
            d_im: 0.01,
            n: 255,
        }))
        .expect("send");
    assert_eq!(recv(&pipes.read), Message::Ok);

    // Ask for work, then vanish as a reader mid-session.
    pipes
        .write
        .send(&Message::Compute(ChunkRequest {
            chunk_id: 0,
            re: -0.5,
            im: -0.5,
            n_re: 64,
            n_im: 48,
        }))
        .expect("send");
    drop(pipes.read);

    // The module's result send hits a broken pipe, gets dropped, and the
    // module keeps servicing its read FIFO: the quit below still lands.
    thread::sleep(Duration::from_millis(100));
    pipes.write.send(&Message::Quit).expect("send");
    module.join().expect("module survived the disconnect");
}

//! Transport behaviour over real named FIFOs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dispatch::CancelFlag;
use protocol::{ChunkResult, FrameError, Message, MessageTag, Version};
use rustix::fs::{CWD, FileType, Mode, OFlags, mknodat};
use transport::{Duplex, ReadPort, TransportError, WritePort, ignore_sigpipe};

const RECV_TIMEOUT: Duration = Duration::from_millis(500);

fn make_fifo(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    mknodat(CWD, &path, FileType::Fifo, Mode::RUSR | Mode::WUSR, 0).expect("mkfifo");
    path
}

fn open_raw_reader(path: &Path) -> std::os::fd::OwnedFd {
    rustix::fs::open(path, OFlags::RDONLY | OFlags::NONBLOCK, Mode::empty()).expect("open read end")
}

fn open_raw_writer(path: &Path) -> std::os::fd::OwnedFd {
    rustix::fs::open(path, OFlags::WRONLY | OFlags::NONBLOCK, Mode::empty())
        .expect("open write end")
}

#[test]
fn frames_round_trip_over_a_fifo() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fifo = make_fifo(dir.path(), "wire");

    let reader = ReadPort::open(&fifo).expect("read end opens");
    let quit = CancelFlag::new();
    let writer = WritePort::open(&fifo, &quit).expect("write end opens");

    let message = Message::Version(Version::new(1, 2, 3));
    writer.send(&message).expect("send succeeds");
    let received = reader.receive(RECV_TIMEOUT).expect("receive succeeds");
    assert_eq!(received, Some(message));
}

#[test]
fn empty_pipe_returns_no_message_after_one_timeout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fifo = make_fifo(dir.path(), "wire");

    let reader = ReadPort::open(&fifo).expect("read end opens");
    let quit = CancelFlag::new();
    let _writer = WritePort::open(&fifo, &quit).expect("write end opens");

    let timeout = Duration::from_millis(50);
    let start = Instant::now();
    let received = reader.receive(timeout).expect("quiet pipe is not an error");
    assert_eq!(received, None);
    assert!(start.elapsed() >= Duration::from_millis(40));
}

#[test]
fn pipe_without_writer_is_quiet_not_hot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fifo = make_fifo(dir.path(), "wire");

    let reader = ReadPort::open(&fifo).expect("read end opens");
    let timeout = Duration::from_millis(50);
    let start = Instant::now();
    assert_eq!(reader.receive(timeout).expect("no error"), None);
    assert!(start.elapsed() >= Duration::from_millis(40));
}

#[test]
fn send_to_a_vanished_reader_invalidates_the_port() {
    ignore_sigpipe();
    let dir = tempfile::tempdir().expect("tempdir");
    let fifo = make_fifo(dir.path(), "wire");

    let reader = ReadPort::open(&fifo).expect("read end opens");
    let quit = CancelFlag::new();
    let writer = WritePort::open(&fifo, &quit).expect("write end opens");
    drop(reader);

    let mut disconnect_seen = false;
    for _ in 0..100 {
        match writer.send(&Message::Done) {
            Ok(()) => {}
            Err(TransportError::Disconnected) => {
                disconnect_seen = true;
                break;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(disconnect_seen, "broken pipe never surfaced");
    assert!(!writer.is_connected());

    // Every later send fails fast without touching the descriptor.
    assert!(matches!(
        writer.send(&Message::Done),
        Err(TransportError::Disconnected)
    ));
}

#[test]
fn residual_bytes_are_drained_at_open() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fifo = make_fifo(dir.path(), "wire");

    // Park garbage in the FIFO as a dead session would have left it.
    let stale_reader = open_raw_reader(&fifo);
    let raw_writer = open_raw_writer(&fifo);
    rustix::io::write(&raw_writer, &[0xDE, 0xAD, 0xBE, 0xEF]).expect("write garbage");
    drop(stale_reader);

    let reader = ReadPort::open(&fifo).expect("read end opens and drains");
    let frame = Message::Done.encode();
    rustix::io::write(&raw_writer, &frame).expect("write frame");

    assert_eq!(
        reader.receive(RECV_TIMEOUT).expect("clean frame parses"),
        Some(Message::Done)
    );
}

#[test]
fn stalled_frame_is_discarded_as_timeout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fifo = make_fifo(dir.path(), "wire");

    let reader = ReadPort::open(&fifo).expect("read end opens");
    let raw_writer = open_raw_writer(&fifo);
    rustix::io::write(&raw_writer, &[MessageTag::Compute.as_u8()]).expect("write lone tag");

    let err = reader
        .receive(Duration::from_millis(50))
        .expect_err("partial frame must not parse");
    assert!(matches!(err, TransportError::FrameTimeout { .. }));
    assert!(err.is_frame_local());
}

#[test]
fn corrupted_burst_is_rejected_and_the_next_frame_parses() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fifo = make_fifo(dir.path(), "wire");

    let reader = ReadPort::open(&fifo).expect("read end opens");
    let raw_writer = open_raw_writer(&fifo);

    let burst = ChunkResult::new(5, vec![9u8; 300]).expect("fits u16");
    let mut frame = Message::ComputeDataBurst(burst).encode();
    frame[10] ^= 0x40;
    rustix::io::write(&raw_writer, &frame).expect("write corrupted frame");
    rustix::io::write(&raw_writer, &Message::Done.encode()).expect("write clean frame");

    let err = reader
        .receive(RECV_TIMEOUT)
        .expect_err("corrupted frame must not parse");
    assert!(matches!(
        err,
        TransportError::Frame(FrameError::ChecksumMismatch { .. })
    ));

    assert_eq!(
        reader.receive(RECV_TIMEOUT).expect("clean frame parses"),
        Some(Message::Done)
    );
}

#[test]
fn duplex_peers_connect_and_exchange() {
    let dir = tempfile::tempdir().expect("tempdir");
    let to_peer = make_fifo(dir.path(), "to_peer");
    let from_peer = make_fifo(dir.path(), "from_peer");

    let quit = Arc::new(CancelFlag::new());
    let peer_quit = Arc::clone(&quit);
    let peer_to = to_peer.clone();
    let peer_from = from_peer.clone();

    let peer = thread::spawn(move || {
        let pipes =
            Duplex::connect(&peer_to, &peer_from, &peer_quit).expect("peer side connects");
        let request = loop {
            if let Some(message) = pipes.read.receive(RECV_TIMEOUT).expect("peer receives") {
                break message;
            }
        };
        assert_eq!(request, Message::GetVersion);
        pipes
            .write
            .send(&Message::Version(Version::new(1, 2, 3)))
            .expect("peer replies");
    });

    let pipes = Duplex::connect(&from_peer, &to_peer, &quit).expect("local side connects");
    pipes.write.send(&Message::GetVersion).expect("send request");
    let reply = loop {
        if let Some(message) = pipes.read.receive(RECV_TIMEOUT).expect("local receives") {
            break message;
        }
    };
    assert_eq!(reply, Message::Version(Version::new(1, 2, 3)));
    peer.join().expect("peer thread");
}

#[test]
fn write_open_honours_the_quit_flag() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fifo = make_fifo(dir.path(), "wire");

    let quit = Arc::new(CancelFlag::new());
    let raiser = Arc::clone(&quit);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        raiser.raise();
    });

    let err = WritePort::open(&fifo, &quit).expect_err("no reader ever attaches");
    assert!(matches!(err, TransportError::Cancelled));
    handle.join().expect("raiser thread");
}

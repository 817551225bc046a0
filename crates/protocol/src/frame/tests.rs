use proptest::prelude::*;

use super::*;
use crate::{PROTOCOL_VERSION, STARTUP_MSG_LEN};

fn sample_messages() -> Vec<Message> {
    vec![
        Message::Ok,
        Message::Error,
        Message::Abort,
        Message::Done,
        Message::GetVersion,
        Message::Quit,
        Message::Startup(Startup::new(4)),
        Message::Version(Version::new(1, 2, 3)),
        Message::SetCompute(ComputeParams {
            c_re: -0.4,
            c_im: 0.6,
            d_re: 0.005,
            d_im: 0.004_583_333,
            n: 100,
        }),
        Message::Compute(ChunkRequest {
            chunk_id: 42,
            re: -1.6,
            im: -1.1,
            n_re: 64,
            n_im: 48,
        }),
        Message::ComputeData(PixelResult {
            chunk_id: 9,
            i_re: 63,
            i_im: 47,
            iter: 100,
        }),
        Message::ComputeDataBurst(ChunkResult::new(5, (0..=255).collect()).expect("fits u16")),
    ]
}

#[test]
fn version_frame_matches_golden_bytes() {
    let frame = Message::Version(PROTOCOL_VERSION).encode();
    assert_eq!(frame, [0x04, 0x01, 0x02, 0x03, 0xF5]);
}

#[test]
fn every_variant_round_trips() {
    for message in sample_messages() {
        let frame = message.encode();
        assert_eq!(frame.len(), message.frame_len());
        assert_eq!(Message::decode(&frame), Ok(message));
    }
}

#[test]
fn every_frame_sums_to_ff() {
    for message in sample_messages() {
        let frame = message.encode();
        assert!(frame_checksum_valid(&frame), "frame for {:?}", message.tag());
        let sum = frame.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        assert_eq!(sum, 0xFF);
    }
}

#[test]
fn startup_block_preserves_identifier_then_count_layout() {
    let startup = Startup::new(7);
    let block = startup.block();
    assert_eq!(&block[..7], b"COMPUTE");
    assert_eq!(block[7], 0);
    assert_eq!(block[8], 7);
    assert_eq!(startup.worker_count(), 7);
}

#[test]
fn startup_frame_has_fixed_width() {
    let frame = Message::Startup(Startup::new(2)).encode();
    assert_eq!(frame.len(), 2 + STARTUP_MSG_LEN);
}

#[test]
fn empty_burst_round_trips() {
    let burst = ChunkResult::new(0, Vec::new()).expect("empty burst is valid");
    let frame = Message::ComputeDataBurst(burst.clone()).encode();
    assert_eq!(frame.len(), 5);
    assert_eq!(Message::decode(&frame), Ok(Message::ComputeDataBurst(burst)));
}

#[test]
fn oversized_burst_is_rejected_at_construction() {
    let err = ChunkResult::new(0, vec![0u8; usize::from(u16::MAX) + 1]).unwrap_err();
    assert_eq!(
        err,
        FrameError::BurstTooLong {
            len: usize::from(u16::MAX) + 1
        }
    );
}

#[test]
fn corrupted_burst_fails_checksum_and_later_frames_still_parse() {
    let burst = ChunkResult::new(5, vec![7u8; 300]).expect("fits u16");
    let mut frame = Message::ComputeDataBurst(burst).encode();
    assert_eq!(frame.len(), 305);

    let victim = frame.len() - 2;
    frame[victim] ^= 0x10;
    assert!(matches!(
        Message::decode(&frame),
        Err(FrameError::ChecksumMismatch { .. })
    ));

    let next = Message::Done.encode();
    assert_eq!(Message::decode(&next), Ok(Message::Done));
}

#[test]
fn unknown_tag_is_rejected() {
    let frame = [MessageTag::COUNT, 0xFF - MessageTag::COUNT];
    assert_eq!(
        Message::decode(&frame),
        Err(FrameError::UnknownTag(MessageTag::COUNT))
    );
}

#[test]
fn truncated_and_padded_frames_are_rejected() {
    let mut frame = Message::Compute(ChunkRequest {
        chunk_id: 0,
        re: 0.0,
        im: 0.0,
        n_re: 4,
        n_im: 4,
    })
    .encode();

    frame.pop();
    assert!(matches!(
        Message::decode(&frame),
        Err(FrameError::LengthMismatch { .. })
    ));

    frame.push(0);
    frame.push(0);
    assert!(matches!(
        Message::decode(&frame),
        Err(FrameError::LengthMismatch { .. })
    ));

    assert!(matches!(
        Message::decode(&[]),
        Err(FrameError::Truncated { .. })
    ));
}

#[test]
fn burst_header_shorter_than_length_field_is_truncated() {
    let frame = [MessageTag::ComputeDataBurst.as_u8(), 0x01];
    assert!(matches!(
        Message::decode(&frame),
        Err(FrameError::Truncated {
            expected: 3,
            actual: 2
        })
    ));
}

#[test]
fn checksum_complement_closes_any_prefix() {
    for prefix in [&b""[..], &b"\x01"[..], &b"\xff\xff\xff"[..], &b"abc"[..]] {
        let mut frame = prefix.to_vec();
        frame.push(checksum_complement(prefix));
        assert!(frame_checksum_valid(&frame));
    }
}

proptest! {
    #[test]
    fn arbitrary_set_compute_round_trips(
        c_re in proptest::num::f64::NORMAL,
        c_im in proptest::num::f64::NORMAL,
        d_re in proptest::num::f64::NORMAL,
        d_im in proptest::num::f64::NORMAL,
        n in any::<u8>(),
    ) {
        let message = Message::SetCompute(ComputeParams { c_re, c_im, d_re, d_im, n });
        prop_assert_eq!(Message::decode(&message.encode()), Ok(message));
    }

    #[test]
    fn arbitrary_burst_round_trips_byte_for_byte(
        chunk_id in any::<u8>(),
        iters in proptest::collection::vec(any::<u8>(), 0..2048),
    ) {
        let burst = ChunkResult::new(chunk_id, iters.clone()).expect("bounded by strategy");
        let frame = Message::ComputeDataBurst(burst).encode();
        prop_assert!(frame_checksum_valid(&frame));
        match Message::decode(&frame) {
            Ok(Message::ComputeDataBurst(decoded)) => {
                prop_assert_eq!(decoded.chunk_id(), chunk_id);
                prop_assert_eq!(decoded.iters(), iters.as_slice());
            }
            other => prop_assert!(false, "unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn single_bit_flips_never_decode_silently(
        byte in 0usize..21,
        bit in 0u8..8,
    ) {
        let message = Message::Compute(ChunkRequest {
            chunk_id: 1,
            re: 0.25,
            im: -0.75,
            n_re: 8,
            n_im: 8,
        });
        let mut frame = message.encode();
        frame[byte] ^= 1 << bit;
        // A flip either changes the tag/length interpretation or breaks the
        // checksum; it must never yield the original message.
        prop_assert_ne!(Message::decode(&frame), Ok(message));
    }
}

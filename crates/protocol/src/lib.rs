#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `protocol` defines the typed message set exchanged between the controller
//! and the compute module, together with the framed binary codec that carries
//! those messages over byte-oriented FIFOs. A frame is
//! `[tag:1][payload:variable][checksum:1]` where the checksum byte is chosen
//! so the unsigned 8-bit sum of every frame byte equals `0xFF`. Frame length
//! is a deterministic function of the tag; only [`Message::ComputeDataBurst`]
//! carries an explicit 16-bit length field.
//!
//! # Design
//!
//! - [`MessageTag`] is the one-byte tag registry with fixed discriminants;
//!   values at or above [`MessageTag::COUNT`] are reserved and rejected.
//! - [`Message`] is the tagged union. Encoding is infallible because every
//!   constructor that could overflow the wire format validates up front
//!   ([`ChunkResult::new`] bounds the burst payload at `u16::MAX` bytes).
//! - [`Message::decode`] consumes exactly one frame and verifies the
//!   checksum before any payload field is interpreted.
//! - Multi-byte numeric fields are little-endian on the wire, fixed
//!   explicitly so both ends agree regardless of host order.
//!
//! # Invariants
//!
//! - For every message `m`, `Message::decode(&m.encode()) == Ok(m)`.
//! - For every encoded frame, the wrapping sum of its bytes is `0xFF`.
//! - A frame that fails the checksum, carries an unknown tag, or whose
//!   length disagrees with its tag is rejected without side effects.
//!
//! # Examples
//!
//! ```
//! use protocol::{Message, Version};
//!
//! let frame = Message::Version(Version::new(1, 2, 3)).encode();
//! assert_eq!(frame, [0x04, 0x01, 0x02, 0x03, 0xF5]);
//!
//! let decoded = Message::decode(&frame).expect("frame is well formed");
//! assert_eq!(decoded, Message::Version(Version::new(1, 2, 3)));
//! ```
//!
//! # See also
//!
//! - The `transport` crate, which moves these frames across named FIFOs and
//!   owns the timeout and partial-read handling.

mod frame;
mod tag;

pub use crate::frame::{
    ChunkRequest, ChunkResult, ComputeParams, FrameError, Message, PixelResult, Startup, Version,
    checksum_complement, frame_checksum_valid,
};
pub use crate::tag::MessageTag;

/// Fixed width of the [`Startup`] payload block in bytes.
///
/// The block holds a NUL-terminated identifier followed by the worker count
/// in the byte immediately after the NUL. Implementations must preserve the
/// `<identifier>\0<worker_count>` layout for compatibility.
pub const STARTUP_MSG_LEN: usize = 9;

/// Identifier carried in the [`Startup`] payload, without the trailing NUL.
pub const STARTUP_IDENTIFIER: &[u8] = b"COMPUTE";

/// Protocol version advertised in response to [`Message::GetVersion`].
pub const PROTOCOL_VERSION: Version = Version::new(1, 2, 3);

/// Inclusive range of worker counts a compute module may advertise.
pub const WORKER_COUNT_RANGE: std::ops::RangeInclusive<u8> = 1..=8;

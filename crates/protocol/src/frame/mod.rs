use thiserror::Error;

use crate::tag::MessageTag;
use crate::{STARTUP_IDENTIFIER, STARTUP_MSG_LEN};

/// Error raised while decoding a frame or constructing an oversized payload.
///
/// Every variant leaves the input untouched; a failed decode never consumes
/// bytes or produces a partial message.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The tag byte is not in the assigned registry.
    #[error("unknown message tag {0:#04x}")]
    UnknownTag(u8),

    /// Fewer bytes were supplied than the frame header requires.
    #[error("truncated frame: need {expected} bytes, have {actual}")]
    Truncated {
        /// Bytes the frame must contain.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },

    /// The supplied byte count disagrees with the length implied by the tag.
    #[error("frame length {actual} does not match {expected} implied by tag {tag}")]
    LengthMismatch {
        /// Tag naming the expected layout.
        tag: MessageTag,
        /// Length the tag implies.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// The unsigned 8-bit sum of the frame bytes is not `0xFF`.
    #[error("frame checksum mismatch: byte sum {sum:#04x}, expected 0xff")]
    ChecksumMismatch {
        /// Wrapping sum the frame actually produced.
        sum: u8,
    },

    /// A burst payload longer than the 16-bit length field can describe.
    #[error("burst payload of {len} bytes exceeds the 16-bit length field")]
    BurstTooLong {
        /// Offending payload length.
        len: usize,
    },
}

/// Module banner payload: a fixed-width block with a NUL-terminated
/// identifier and the worker count in the byte after the NUL.
///
/// # Examples
///
/// ```
/// use protocol::Startup;
///
/// let startup = Startup::new(4);
/// assert_eq!(startup.identifier(), b"COMPUTE");
/// assert_eq!(startup.worker_count(), 4);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Startup {
    block: [u8; STARTUP_MSG_LEN],
}

impl Startup {
    /// Builds the banner block advertising `worker_count` workers.
    #[must_use]
    pub fn new(worker_count: u8) -> Self {
        let mut block = [0u8; STARTUP_MSG_LEN];
        block[..STARTUP_IDENTIFIER.len()].copy_from_slice(STARTUP_IDENTIFIER);
        block[STARTUP_IDENTIFIER.len() + 1] = worker_count;
        Self { block }
    }

    /// Wraps a raw payload block received from the wire.
    #[inline]
    #[must_use]
    pub const fn from_block(block: [u8; STARTUP_MSG_LEN]) -> Self {
        Self { block }
    }

    /// Returns the identifier bytes preceding the NUL terminator.
    #[must_use]
    pub fn identifier(&self) -> &[u8] {
        let nul = self
            .block
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.block.len());
        &self.block[..nul]
    }

    /// Returns the advertised worker count: the byte immediately after the
    /// NUL terminator, or 0 when the block carries no terminator.
    #[must_use]
    pub fn worker_count(&self) -> u8 {
        self.block
            .iter()
            .position(|&b| b == 0)
            .and_then(|nul| self.block.get(nul + 1))
            .copied()
            .unwrap_or(0)
    }

    /// Returns the raw payload block.
    #[inline]
    #[must_use]
    pub const fn block(&self) -> &[u8; STARTUP_MSG_LEN] {
        &self.block
    }
}

/// Semantic protocol version (major, minor, patch).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Version {
    /// Major version byte.
    pub major: u8,
    /// Minor version byte.
    pub minor: u8,
    /// Patch version byte.
    pub patch: u8,
}

impl Version {
    /// Constructs a version triple.
    #[inline]
    #[must_use]
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Global computation parameters installed by `SetCompute`.
///
/// `c` is the recursive constant of the escape-time iteration, `d` the
/// per-pixel step in the complex plane, and `n` the iteration cap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComputeParams {
    /// Real part of the recursive constant.
    pub c_re: f64,
    /// Imaginary part of the recursive constant.
    pub c_im: f64,
    /// Real step between neighbouring pixels.
    pub d_re: f64,
    /// Imaginary step between neighbouring pixels.
    pub d_im: f64,
    /// Maximum iteration count per pixel.
    pub n: u8,
}

/// One chunk of work requested by the controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkRequest {
    /// Chunk identifier assigned by the controller.
    pub chunk_id: u8,
    /// Real part of the chunk's lower-left complex origin.
    pub re: f64,
    /// Imaginary part of the chunk's lower-left complex origin.
    pub im: f64,
    /// Chunk width in pixels.
    pub n_re: u8,
    /// Chunk height in pixels.
    pub n_im: u8,
}

/// A single per-pixel iteration result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelResult {
    /// Chunk the pixel belongs to.
    pub chunk_id: u8,
    /// Pixel column within the chunk.
    pub i_re: u8,
    /// Pixel row within the chunk, counted from the chunk's bottom.
    pub i_im: u8,
    /// Escape-time iteration count.
    pub iter: u8,
}

/// Every iteration count of one chunk, streamed as a single frame.
///
/// The buffer is owned: decoding allocates it and moves it to the caller,
/// and the caller drops it after use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkResult {
    chunk_id: u8,
    iters: Vec<u8>,
}

impl ChunkResult {
    /// Wraps a finished chunk, rejecting buffers the 16-bit wire length
    /// field cannot describe.
    ///
    /// # Examples
    ///
    /// ```
    /// use protocol::ChunkResult;
    ///
    /// let burst = ChunkResult::new(7, vec![0, 1, 2, 3]).expect("fits u16");
    /// assert_eq!(burst.chunk_id(), 7);
    /// assert_eq!(burst.len(), 4);
    /// ```
    pub fn new(chunk_id: u8, iters: Vec<u8>) -> Result<Self, FrameError> {
        if iters.len() > usize::from(u16::MAX) {
            return Err(FrameError::BurstTooLong { len: iters.len() });
        }
        Ok(Self { chunk_id, iters })
    }

    /// Returns the chunk identifier.
    #[inline]
    #[must_use]
    pub const fn chunk_id(&self) -> u8 {
        self.chunk_id
    }

    /// Returns the number of iteration counts, as carried on the wire.
    #[inline]
    #[must_use]
    pub fn len(&self) -> u16 {
        self.iters.len() as u16
    }

    /// Reports whether the chunk carried zero pixels.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iters.is_empty()
    }

    /// Returns the iteration counts in row-major, bottom-to-top order.
    #[inline]
    #[must_use]
    pub fn iters(&self) -> &[u8] {
        &self.iters
    }

    /// Consumes the burst, yielding the chunk id and the owned buffer.
    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (u8, Vec<u8>) {
        (self.chunk_id, self.iters)
    }
}

/// The tagged union of every protocol message.
///
/// # Examples
///
/// Round-trip a compute request through the wire form.
///
/// ```
/// use protocol::{ChunkRequest, Message};
///
/// let request = Message::Compute(ChunkRequest {
///     chunk_id: 3,
///     re: -1.6,
///     im: -1.1,
///     n_re: 64,
///     n_im: 48,
/// });
/// let frame = request.encode();
/// assert_eq!(Message::decode(&frame), Ok(request));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Positive acknowledgement.
    Ok,
    /// Negative acknowledgement.
    Error,
    /// Abort request or abort confirmation.
    Abort,
    /// One chunk finished streaming.
    Done,
    /// Version request.
    GetVersion,
    /// Orderly shutdown; never answered.
    Quit,
    /// Module banner with the worker count.
    Startup(Startup),
    /// Version reply.
    Version(Version),
    /// Install computation parameters.
    SetCompute(ComputeParams),
    /// Request one chunk of computation.
    Compute(ChunkRequest),
    /// Single-pixel result.
    ComputeData(PixelResult),
    /// Whole-chunk result burst.
    ComputeDataBurst(ChunkResult),
}

impl Message {
    /// Returns the wire tag of this message.
    #[must_use]
    pub const fn tag(&self) -> MessageTag {
        match self {
            Self::Ok => MessageTag::Ok,
            Self::Error => MessageTag::Error,
            Self::Abort => MessageTag::Abort,
            Self::Done => MessageTag::Done,
            Self::GetVersion => MessageTag::GetVersion,
            Self::Quit => MessageTag::Quit,
            Self::Startup(_) => MessageTag::Startup,
            Self::Version(_) => MessageTag::Version,
            Self::SetCompute(_) => MessageTag::SetCompute,
            Self::Compute(_) => MessageTag::Compute,
            Self::ComputeData(_) => MessageTag::ComputeData,
            Self::ComputeDataBurst(_) => MessageTag::ComputeDataBurst,
        }
    }

    /// Returns the encoded frame length, checksum byte included.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        match self {
            Self::ComputeDataBurst(burst) => MessageTag::burst_frame_len(burst.len()),
            other => other
                .tag()
                .fixed_frame_len()
                .expect("every non-burst tag has a fixed length"),
        }
    }

    /// Serialises the message into a complete frame.
    ///
    /// The final byte is chosen so the unsigned 8-bit sum of the frame is
    /// `0xFF`; multi-byte fields are written little-endian.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.frame_len());
        frame.push(self.tag().as_u8());
        match self {
            Self::Ok | Self::Error | Self::Abort | Self::Done | Self::GetVersion | Self::Quit => {}
            Self::Startup(startup) => frame.extend_from_slice(startup.block()),
            Self::Version(version) => {
                frame.push(version.major);
                frame.push(version.minor);
                frame.push(version.patch);
            }
            Self::SetCompute(params) => {
                frame.extend_from_slice(&params.c_re.to_le_bytes());
                frame.extend_from_slice(&params.c_im.to_le_bytes());
                frame.extend_from_slice(&params.d_re.to_le_bytes());
                frame.extend_from_slice(&params.d_im.to_le_bytes());
                frame.push(params.n);
            }
            Self::Compute(request) => {
                frame.push(request.chunk_id);
                frame.extend_from_slice(&request.re.to_le_bytes());
                frame.extend_from_slice(&request.im.to_le_bytes());
                frame.push(request.n_re);
                frame.push(request.n_im);
            }
            Self::ComputeData(pixel) => {
                frame.push(pixel.chunk_id);
                frame.push(pixel.i_re);
                frame.push(pixel.i_im);
                frame.push(pixel.iter);
            }
            Self::ComputeDataBurst(burst) => {
                frame.extend_from_slice(&burst.len().to_le_bytes());
                frame.push(burst.chunk_id());
                frame.extend_from_slice(burst.iters());
            }
        }
        frame.push(checksum_complement(&frame));
        frame
    }

    /// Decodes exactly one frame, verifying length and checksum first.
    ///
    /// The checksum covers every frame byte including the tag; a frame that
    /// fails any check is rejected whole, leaving the caller free to discard
    /// it and continue with the next frame.
    pub fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        let &tag_byte = frame.first().ok_or(FrameError::Truncated {
            expected: 2,
            actual: 0,
        })?;
        let tag = MessageTag::try_from(tag_byte)?;

        let expected = match tag.fixed_frame_len() {
            Some(len) => len,
            None => {
                if frame.len() < 3 {
                    return Err(FrameError::Truncated {
                        expected: 3,
                        actual: frame.len(),
                    });
                }
                MessageTag::burst_frame_len(u16::from_le_bytes([frame[1], frame[2]]))
            }
        };
        if frame.len() != expected {
            return Err(FrameError::LengthMismatch {
                tag,
                expected,
                actual: frame.len(),
            });
        }

        let sum = frame.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        if sum != 0xFF {
            return Err(FrameError::ChecksumMismatch { sum });
        }

        let payload = &frame[1..frame.len() - 1];
        let message = match tag {
            MessageTag::Ok => Self::Ok,
            MessageTag::Error => Self::Error,
            MessageTag::Abort => Self::Abort,
            MessageTag::Done => Self::Done,
            MessageTag::GetVersion => Self::GetVersion,
            MessageTag::Quit => Self::Quit,
            MessageTag::Startup => {
                let mut block = [0u8; STARTUP_MSG_LEN];
                block.copy_from_slice(payload);
                Self::Startup(Startup::from_block(block))
            }
            MessageTag::Version => {
                Self::Version(Version::new(payload[0], payload[1], payload[2]))
            }
            MessageTag::SetCompute => Self::SetCompute(ComputeParams {
                c_re: read_f64(payload, 0),
                c_im: read_f64(payload, 8),
                d_re: read_f64(payload, 16),
                d_im: read_f64(payload, 24),
                n: payload[32],
            }),
            MessageTag::Compute => Self::Compute(ChunkRequest {
                chunk_id: payload[0],
                re: read_f64(payload, 1),
                im: read_f64(payload, 9),
                n_re: payload[17],
                n_im: payload[18],
            }),
            MessageTag::ComputeData => Self::ComputeData(PixelResult {
                chunk_id: payload[0],
                i_re: payload[1],
                i_im: payload[2],
                iter: payload[3],
            }),
            MessageTag::ComputeDataBurst => {
                let chunk_id = payload[2];
                let iters = payload[3..].to_vec();
                Self::ComputeDataBurst(ChunkResult { chunk_id, iters })
            }
        };
        Ok(message)
    }
}

/// Computes the checksum byte that makes the frame's byte sum `0xFF`.
#[inline]
#[must_use]
pub fn checksum_complement(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    0xFFu8.wrapping_sub(sum)
}

/// Reports whether a complete frame satisfies the sum-to-`0xFF` rule.
#[inline]
#[must_use]
pub fn frame_checksum_valid(frame: &[u8]) -> bool {
    frame.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) == 0xFF
}

#[inline]
fn read_f64(bytes: &[u8], at: usize) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    f64::from_le_bytes(raw)
}

#[cfg(test)]
mod tests;

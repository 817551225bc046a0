use std::fmt;

use crate::frame::FrameError;

/// One-byte tag identifying each message variant on the wire.
///
/// Discriminants are part of the wire format and never change. Tags at or
/// above [`MessageTag::COUNT`] are reserved for future use and rejected by
/// the decoder.
///
/// # Examples
///
/// ```
/// use protocol::MessageTag;
///
/// assert_eq!(MessageTag::Version.as_u8(), 0x04);
/// assert_eq!(MessageTag::try_from(0x04), Ok(MessageTag::Version));
/// assert!(MessageTag::try_from(MessageTag::COUNT).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageTag {
    /// Positive acknowledgement.
    Ok = 0,

    /// Negative acknowledgement; the peer rejected the last request.
    Error = 1,

    /// Cancel in-flight computation.
    ///
    /// Sent by the controller to request an abort, and echoed back by the
    /// module once its work queue has been purged.
    Abort = 2,

    /// One chunk of computation has been fully streamed.
    Done = 3,

    /// Protocol version reply; payload is three unsigned bytes
    /// (major, minor, patch).
    Version = 4,

    /// Request the peer's protocol version.
    GetVersion = 5,

    /// Orderly shutdown request. Never answered.
    Quit = 6,

    /// Module banner sent once after the pipes connect; payload is a
    /// fixed-width block carrying a NUL-terminated identifier and the
    /// worker count.
    Startup = 7,

    /// Install the global computation parameters (c, d, n).
    SetCompute = 8,

    /// Request computation of one chunk.
    Compute = 9,

    /// A single per-pixel iteration result.
    ComputeData = 10,

    /// Every iteration count of one chunk in a single frame, preceded by a
    /// 16-bit length field.
    ComputeDataBurst = 11,
}

impl MessageTag {
    /// Number of assigned tags; values `>= COUNT` are reserved.
    pub const COUNT: u8 = 12;

    /// Returns the wire representation of the tag.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns the full frame length for tags whose size does not depend on
    /// a payload-embedded length field.
    ///
    /// [`MessageTag::ComputeDataBurst`] is the only variable-length frame
    /// and yields `None`; its length is `burst_frame_len` of the 16-bit
    /// value that follows the tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use protocol::MessageTag;
    ///
    /// assert_eq!(MessageTag::Ok.fixed_frame_len(), Some(2));
    /// assert_eq!(MessageTag::Version.fixed_frame_len(), Some(5));
    /// assert_eq!(MessageTag::ComputeDataBurst.fixed_frame_len(), None);
    /// ```
    #[must_use]
    pub const fn fixed_frame_len(self) -> Option<usize> {
        match self {
            Self::Ok
            | Self::Error
            | Self::Abort
            | Self::Done
            | Self::GetVersion
            | Self::Quit => Some(2),
            Self::Startup => Some(2 + crate::STARTUP_MSG_LEN),
            Self::Version => Some(2 + 3),
            Self::SetCompute => Some(2 + 4 * 8 + 1),
            Self::Compute => Some(2 + 1 + 2 * 8 + 2),
            Self::ComputeData => Some(2 + 4),
            Self::ComputeDataBurst => None,
        }
    }

    /// Returns the full frame length of a burst carrying `len` iteration
    /// counts: tag, length field, chunk id, payload, checksum.
    #[inline]
    #[must_use]
    pub const fn burst_frame_len(len: u16) -> usize {
        1 + 2 + 1 + len as usize + 1
    }
}

impl TryFrom<u8> for MessageTag {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, FrameError> {
        let tag = match value {
            0 => Self::Ok,
            1 => Self::Error,
            2 => Self::Abort,
            3 => Self::Done,
            4 => Self::Version,
            5 => Self::GetVersion,
            6 => Self::Quit,
            7 => Self::Startup,
            8 => Self::SetCompute,
            9 => Self::Compute,
            10 => Self::ComputeData,
            11 => Self::ComputeDataBurst,
            other => return Err(FrameError::UnknownTag(other)),
        };
        Ok(tag)
    }
}

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::Abort => "ABORT",
            Self::Done => "DONE",
            Self::Version => "VERSION",
            Self::GetVersion => "GET_VERSION",
            Self::Quit => "QUIT",
            Self::Startup => "STARTUP",
            Self::SetCompute => "SET_COMPUTE",
            Self::Compute => "COMPUTE",
            Self::ComputeData => "COMPUTE_DATA",
            Self::ComputeDataBurst => "COMPUTE_DATA_BURST",
        };
        f.write_str(name)
    }
}

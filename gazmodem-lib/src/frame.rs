//! GazModem frame codec.
//!
//! Wire layout, multi-byte integers little-endian unless noted:
//!
//! ```text
//! [start 0x68][length:2][dest:2][src:2][cmd:1][body][crc:2 big-endian][stop 0x16]
//! ```
//!
//! `length` counts the addresses, the command byte and the body; the checksum
//! covers the `length..body` span. The bridge delivers an unframed byte stream
//! that may start mid-frame, so parsing is incremental: `try_parse_frame`
//! reports whether the head of a buffer is a frame, needs more bytes, or is
//! noise the caller should shift past one byte at a time.

use crate::constants::{
    FRAME_HEADER_SIZE, FRAME_OVERHEAD, LENGTH_BASE, MAX_FRAME_SIZE, READ_SUBCODE, START_BYTE,
    STOP_BYTE,
};
use crate::error::GazError;
use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive};
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// CRC-16/XMODEM: polynomial 0x1021, init 0x0000, MSB first, no reflection,
/// no final XOR. `checksum(b"") == 0x0000`.
pub fn checksum(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x0000;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Function codes observed on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum Command {
    ReadParam = 0x02,
    ReadParamResponse = 0x82,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// The `[length][dest][src][command]` span of a frame. The checksum covers
/// exactly these bytes plus the body.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FrameHeader {
    pub length: U16,
    pub dest: U16,
    pub src: U16,
    pub command: u8,
}

/// One complete wire message between two bus participants.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub dest: u16,
    pub src: u16,
    pub command: Command,
    pub body: Bytes,
}

impl Frame {
    pub fn new(dest: u16, src: u16, command: Command, body: Bytes) -> Self {
        Self {
            dest,
            src,
            command,
            body,
        }
    }

    /// Build a parameter read request: body is the fixed sub-code followed by
    /// the little-endian parameter index.
    pub fn read_request(dest: u16, src: u16, index: u16) -> Self {
        let mut body = BytesMut::with_capacity(3);
        body.put_u8(READ_SUBCODE);
        body.put_u16_le(index);
        Self::new(dest, src, Command::ReadParam, body.freeze())
    }

    /// Total size of this frame once encoded.
    pub fn wire_len(&self) -> usize {
        LENGTH_BASE + self.body.len() + FRAME_OVERHEAD
    }

    /// Assemble the frame, computing the length field and appending the
    /// big-endian checksum of the `length..body` span before the stop marker.
    pub fn encode(&self) -> Bytes {
        let header = FrameHeader {
            length: U16::new((LENGTH_BASE + self.body.len()) as u16),
            dest: U16::new(self.dest),
            src: U16::new(self.src),
            command: self.command.into(),
        };

        let mut out = BytesMut::with_capacity(self.wire_len());
        out.put_u8(START_BYTE);
        out.put_slice(header.as_bytes());
        out.put_slice(&self.body);
        let crc = checksum(&out[1..]);
        out.put_u16(crc); // big-endian on the wire
        out.put_u8(STOP_BYTE);
        out.freeze()
    }
}

/// Outcome of attempting to extract one frame from the head of a buffer.
#[derive(Debug)]
pub enum FrameParse {
    /// A well-formed frame and the number of bytes it occupied.
    Complete(Frame, usize),
    /// The buffer holds less than the frame's declared total length.
    NeedMoreData,
    /// The head of the buffer is not a frame. The caller must discard exactly
    /// one leading byte and retry; this is how the codec resynchronizes on a
    /// stream observed mid-frame.
    Invalid(GazError),
}

/// Attempt to extract one complete frame starting at offset 0 of `buf`.
pub fn try_parse_frame(buf: &[u8]) -> FrameParse {
    if buf.is_empty() {
        return FrameParse::NeedMoreData;
    }
    if buf[0] != START_BYTE {
        return FrameParse::Invalid(GazError::InvalidFrame(format!(
            "expected start marker, got {:#04x}",
            buf[0]
        )));
    }
    if buf.len() < 1 + FRAME_HEADER_SIZE {
        return FrameParse::NeedMoreData;
    }

    let Ok(header) = FrameHeader::ref_from_bytes(&buf[1..1 + FRAME_HEADER_SIZE]) else {
        return FrameParse::Invalid(GazError::InvalidFrame("unreadable header".into()));
    };
    let length = header.length.get() as usize;
    if length < LENGTH_BASE {
        return FrameParse::Invalid(GazError::InvalidFrame(format!(
            "declared length {length} below minimum"
        )));
    }
    let total = length + FRAME_OVERHEAD;
    if total > MAX_FRAME_SIZE {
        return FrameParse::Invalid(GazError::InvalidFrame(format!(
            "declared length {length} exceeds frame bound"
        )));
    }
    if buf.len() < total {
        return FrameParse::NeedMoreData;
    }

    let crc_at = 1 + 2 + length;
    let expected = u16::from_be_bytes([buf[crc_at], buf[crc_at + 1]]);
    let actual = checksum(&buf[1..crc_at]);
    if actual != expected {
        return FrameParse::Invalid(GazError::Crc { expected, actual });
    }
    if buf[total - 1] != STOP_BYTE {
        return FrameParse::Invalid(GazError::InvalidFrame(format!(
            "expected stop marker, got {:#04x}",
            buf[total - 1]
        )));
    }

    let frame = Frame {
        dest: header.dest.get(),
        src: header.src.get(),
        command: Command::from_primitive(header.command),
        body: Bytes::copy_from_slice(&buf[1 + FRAME_HEADER_SIZE..crc_at]),
    };
    FrameParse::Complete(frame, total)
}

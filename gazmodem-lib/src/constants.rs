// Protocol constants for the GazModem wire format

/// Start-of-frame marker.
pub const START_BYTE: u8 = 0x68;

/// End-of-frame marker.
pub const STOP_BYTE: u8 = 0x16;

/// Bytes counted by the length field besides the body: dest + src + command.
pub const LENGTH_BASE: usize = 5;

/// Size of the `[length][dest][src][command]` span following the start marker.
pub const FRAME_HEADER_SIZE: usize = 7;

/// Start marker plus header: bytes preceding the body in a complete frame.
pub const FRAME_PREFIX_SIZE: usize = 8;

/// Offset of the command byte from the start marker.
pub const COMMAND_OFFSET: usize = 7;

/// Checksum (big-endian) plus stop marker trailing the body.
pub const FRAME_TRAILER_SIZE: usize = 3;

/// Bytes surrounding the length-counted span: start + length + crc + stop.
pub const FRAME_OVERHEAD: usize = 6;

/// Upper bound for a plausible frame. Declared lengths beyond this are line
/// noise, not giant frames.
pub const MAX_FRAME_SIZE: usize = 512;

/// All-ones destination heard by every bus participant.
pub const BROADCAST_ADDR: u16 = 0xFFFF;

/// Sub-code prefixing the body of a parameter read request.
pub const READ_SUBCODE: u8 = 0x01;

/// The request body (sub-code + index) is echoed back at the head of a read
/// response body, before the parameter description starts.
pub const RESPONSE_ECHO_SIZE: usize = 3;

/// Exponent magnitudes above this come from corrupt slots and normalize to 0.
pub const MAX_EXPONENT: i8 = 6;

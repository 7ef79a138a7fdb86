//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use gazmodem_lib::config::ScanConfig;
#[allow(unused_imports)]
pub use gazmodem_lib::error::GazError;
#[allow(unused_imports)]
pub use gazmodem_lib::frame::{Command, Frame, FrameParse, try_parse_frame};
#[allow(unused_imports)]
pub use gazmodem_lib::param::AccessMode;
#[allow(unused_imports)]
pub use gazmodem_lib::probe::Prober;
#[allow(unused_imports)]
pub use gazmodem_lib::scanner::{Scanner, StatusSink};
#[allow(unused_imports)]
pub use hex;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// A read response for index 0 of device 5: name "SetTemp", unit "C",
/// SHORT REAL 21.5, exponent 0, read-only.
#[allow(dead_code)]
pub const SETTEMP_RESPONSE_IDX0: &str =
    "681800000005008201000053657454656d7000430007000000ac4111c616";

/// A bus frame from device 7 to device 3 (sniffing fodder).
#[allow(dead_code)]
pub const BUS_FRAME_7_TO_3: &str = "68050003000700405a2116";

/// Split a byte stream into the frames it carries, panicking on anything
/// that is not a clean sequence of well-formed frames.
#[allow(dead_code)]
pub fn parse_all(mut wire: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    while !wire.is_empty() {
        match try_parse_frame(wire) {
            FrameParse::Complete(frame, consumed) => {
                frames.push(frame);
                wire = &wire[consumed..];
            }
            other => panic!("unexpected bytes on the wire: {other:?}"),
        }
    }
    frames
}

use crate::constants::READ_SUBCODE;
use crate::decode::{VALUE_PLACEHOLDER, decode_parameter};
use crate::error::GazError;
use crate::frame::{Command, Frame, FrameParse, checksum, try_parse_frame};
use crate::param::AccessMode;
use crate::probe::extract_response_body;
use crate::sniff::Sniffer;
use bytes::Bytes;

// --- Frame codec ---

#[test]
fn checksum_of_empty_input_is_zero() {
    assert_eq!(checksum(b""), 0x0000);
}

#[test]
fn checksum_matches_xmodem_check_value() {
    // The standard CRC-16/XMODEM check input.
    assert_eq!(checksum(b"123456789"), 0x31C3);
}

#[test]
fn checksum_detects_single_bit_flips() {
    let base = b"GazModem frame body";
    let reference = checksum(base);
    for byte_idx in 0..base.len() {
        for bit in 0..8 {
            let mut flipped = base.to_vec();
            flipped[byte_idx] ^= 1 << bit;
            assert_ne!(
                checksum(&flipped),
                reference,
                "flip of byte {byte_idx} bit {bit} went undetected"
            );
        }
    }
}

#[test]
fn read_request_encodes_exact_bytes() {
    let encoded = Frame::read_request(5, 0, 3).encode();
    let expected = hex::decode("68080005000000020103008dfe16").expect("Failed to decode hex");
    assert_eq!(
        encoded.as_ref(),
        &expected[..],
        "read request bytes do not match the captured exchange"
    );
}

#[test]
fn frame_roundtrip() {
    let frame = Frame::new(
        0x1234,
        0xABCD,
        Command::ReadParamResponse,
        Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF]),
    );
    let encoded = frame.encode();
    assert_eq!(encoded.len(), frame.wire_len());

    match try_parse_frame(&encoded) {
        FrameParse::Complete(parsed, consumed) => {
            assert_eq!(parsed, frame);
            assert_eq!(consumed, encoded.len());
        }
        other => panic!("expected a complete frame, got {other:?}"),
    }
}

#[test]
fn parse_needs_more_data_on_partial_input() {
    let encoded = Frame::read_request(5, 0, 3).encode();
    // Header still incomplete.
    assert!(matches!(
        try_parse_frame(&encoded[..4]),
        FrameParse::NeedMoreData
    ));
    // Header complete, body/trailer not yet buffered.
    assert!(matches!(
        try_parse_frame(&encoded[..encoded.len() - 1]),
        FrameParse::NeedMoreData
    ));
    assert!(matches!(try_parse_frame(&[]), FrameParse::NeedMoreData));
}

#[test]
fn parse_rejects_bad_checksum() {
    let mut corrupted = Frame::read_request(5, 0, 3).encode().to_vec();
    let crc_at = corrupted.len() - 3;
    corrupted[crc_at] ^= 0xFF;
    assert!(matches!(
        try_parse_frame(&corrupted),
        FrameParse::Invalid(GazError::Crc { .. })
    ));
}

#[test]
fn parse_rejects_bad_stop_marker() {
    let mut corrupted = Frame::read_request(5, 0, 3).encode().to_vec();
    let last = corrupted.len() - 1;
    corrupted[last] = 0x00;
    assert!(matches!(
        try_parse_frame(&corrupted),
        FrameParse::Invalid(GazError::InvalidFrame(_))
    ));
}

#[test]
fn parse_rejects_oversized_length() {
    // Declared length 0xFFFF would imply a 64 KiB frame; that is line noise.
    let junk = hex::decode("68ffff0000000002").expect("Failed to decode hex");
    assert!(matches!(
        try_parse_frame(&junk),
        FrameParse::Invalid(GazError::InvalidFrame(_))
    ));
}

#[test]
fn parse_rejects_undersized_length() {
    // Length 4 cannot even cover the two addresses and the command byte.
    let junk = hex::decode("680400000000000200000016").expect("Failed to decode hex");
    assert!(matches!(
        try_parse_frame(&junk),
        FrameParse::Invalid(GazError::InvalidFrame(_))
    ));
}

#[test]
fn resync_consumes_exactly_n_garbage_bytes() {
    let garbage = [0x00u8, 0xFF, 0x55, 0xAA, 0x01];
    let frame = Frame::read_request(10, 0, 42);
    let mut wire = garbage.to_vec();
    wire.extend_from_slice(&frame.encode());

    let mut drops = 0;
    let mut cursor = &wire[..];
    let parsed = loop {
        match try_parse_frame(cursor) {
            FrameParse::Complete(parsed, consumed) => {
                assert_eq!(consumed, cursor.len());
                break parsed;
            }
            FrameParse::Invalid(_) => {
                drops += 1;
                cursor = &cursor[1..];
            }
            FrameParse::NeedMoreData => panic!("ran out of data while resynchronizing"),
        }
    };
    assert_eq!(drops, garbage.len(), "one drop per garbage byte");
    assert_eq!(parsed, frame);
}

// --- Sniffer ---

#[test]
fn sniffer_collects_addresses_excluding_broadcast_and_self() {
    let mut sniffer = Sniffer::new(0);
    // src 5 -> dest 10, then src 1 -> broadcast, then our own address ->
    // broadcast, with garbage interleaved.
    let mut wire = vec![0xDE, 0xAD];
    wire.extend_from_slice(&hex::decode("6805000a000500409c3d16").unwrap());
    wire.push(0x42);
    wire.extend_from_slice(&hex::decode("680500ffff010040175f16").unwrap());
    wire.extend_from_slice(&hex::decode("680500ffff000040206f16").unwrap());
    sniffer.push(&wire);

    let devices: Vec<u16> = sniffer.into_devices().into_iter().collect();
    assert_eq!(
        devices,
        vec![1, 5, 10],
        "ascending, broadcast and self excluded"
    );
}

#[test]
fn sniffer_handles_chunked_input() {
    let frame = hex::decode("6805000a000500409c3d16").unwrap();
    let mut sniffer = Sniffer::new(0);
    sniffer.push(&frame[..6]);
    assert_eq!(sniffer.device_count(), 0);
    sniffer.push(&frame[6..]);
    assert_eq!(sniffer.device_count(), 2);
}

// --- Payload decoder ---

fn response_body(
    index: u16,
    name: &[u8],
    unit: &[u8],
    info: u8,
    exponent: u8,
    value: &[u8],
) -> Vec<u8> {
    let mut body = vec![READ_SUBCODE];
    body.extend_from_slice(&index.to_le_bytes());
    body.extend_from_slice(name);
    body.push(0);
    body.extend_from_slice(unit);
    body.push(0);
    body.push(info);
    body.push(exponent);
    body.extend_from_slice(value);
    body
}

#[test]
fn decode_short_real_parameter() {
    // Captured response body for a setpoint slot: SHORT REAL 21.5 °C.
    let body = hex::decode("01030053657454656d7000430007000000ac41").unwrap();
    let record = decode_parameter(5, 3, &body).expect("should decode");
    assert_eq!(record.device, 5);
    assert_eq!(record.index, 3);
    assert_eq!(record.name, "SetTemp");
    assert_eq!(record.value, "21.50");
    assert_eq!(record.exponent, 0);
    assert_eq!(record.unit, "C");
    assert_eq!(record.type_name, "SHORT REAL");
    assert_eq!(record.access, AccessMode::ReadOnly);
}

#[test]
fn decode_rejects_empty_name() {
    let body = response_body(0, b"", b"", 0x07, 0, &21.5f32.to_le_bytes());
    assert!(decode_parameter(1, 0, &body).is_none());
}

#[test]
fn decode_rejects_placeholder_name() {
    let body = response_body(0, b"?", b"C", 0x07, 0, &21.5f32.to_le_bytes());
    assert!(decode_parameter(1, 0, &body).is_none());
}

#[test]
fn decode_rejects_truncated_header() {
    // Name and unit present, info byte present, exponent missing.
    let mut body = vec![READ_SUBCODE, 0, 0];
    body.extend_from_slice(b"Temp\0C\0");
    body.push(0x07);
    assert!(decode_parameter(1, 0, &body).is_none());
    // And a payload that ends inside the echo prefix.
    assert!(decode_parameter(1, 0, &[0x01]).is_none());
}

#[test]
fn decode_rejects_unknown_type_id() {
    let body = response_body(0, b"Mystery", b"", 0x0F, 0, &[0xAA; 8]);
    assert!(decode_parameter(1, 0, &body).is_none());
}

#[test]
fn exponent_clamped_to_zero_outside_range() {
    // 0xF9 is -7 as a signed byte.
    for exponent in [7u8, 0xF9, 0x7F] {
        let body = response_body(0, b"Counter", b"", 0x02, exponent, &100i16.to_le_bytes());
        let record = decode_parameter(1, 0, &body).expect("should decode");
        assert_eq!(record.exponent, 0, "exponent byte {exponent:#04x} must clamp");
        assert_eq!(record.value, "100");
    }
    // -6 is the limit, not beyond it.
    let body = response_body(0, b"Counter", b"", 0x02, 0xFA, &215i16.to_le_bytes());
    let record = decode_parameter(1, 0, &body).expect("should decode");
    assert_eq!(record.exponent, -6);
    assert_eq!(record.value, "0.000215");
}

#[test]
fn exponent_scales_integer_values() {
    let body = response_body(0, b"Temp", b"C", 0x02, 0xFF, &215i16.to_le_bytes());
    let record = decode_parameter(1, 0, &body).expect("should decode");
    assert_eq!(record.exponent, -1);
    assert_eq!(record.value, "21.5");

    let body = response_body(0, b"Power", b"W", 0x05, 2, &15u16.to_le_bytes());
    let record = decode_parameter(1, 0, &body).expect("should decode");
    assert_eq!(record.value, "1500");
}

#[test]
fn boolean_renders_on_off() {
    let body = response_body(0, b"Pump", b"", 0x0A, 0, &[1]);
    assert_eq!(decode_parameter(1, 0, &body).unwrap().value, "ON");
    let body = response_body(0, b"Pump", b"", 0x0A, 0, &[0]);
    assert_eq!(decode_parameter(1, 0, &body).unwrap().value, "OFF");
}

#[test]
fn readwrite_flag_from_info_byte() {
    let body = response_body(0, b"SetTemp", b"C", 0x27, 0, &21.5f32.to_le_bytes());
    let record = decode_parameter(1, 0, &body).expect("should decode");
    assert_eq!(record.access, AccessMode::ReadWrite);
    assert_eq!(record.type_name, "SHORT REAL");
}

#[test]
fn short_value_renders_placeholder() {
    // DWORD needs 4 bytes; only 2 arrived.
    let body = response_body(0, b"Uptime", b"s", 0x06, 0, &[0x01, 0x02]);
    let record = decode_parameter(1, 0, &body).expect("should decode");
    assert_eq!(record.value, VALUE_PLACEHOLDER);
}

#[test]
fn zero_width_type_renders_placeholder() {
    let body = response_body(0, b"Spacer", b"", 0x00, 0, &[]);
    let record = decode_parameter(1, 0, &body).expect("should decode");
    assert_eq!(record.type_name, "None");
    assert_eq!(record.value, VALUE_PLACEHOLDER);
}

#[test]
fn latin1_text_fields_decode() {
    let body = response_body(0, b"Kocio\xb3", &[0xB0, b'C'], 0x02, 0, &300i16.to_le_bytes());
    let record = decode_parameter(1, 0, &body).expect("should decode");
    assert_eq!(record.name, "Kocio³");
    assert_eq!(record.unit, "°C");
}

// --- Response extraction ---

#[test]
fn extract_response_body_skips_leading_noise() {
    let mut wire = vec![0x00, 0x17, 0x99];
    wire.extend_from_slice(
        &hex::decode("681800000005008201030053657454656d7000430007000000ac4111b416").unwrap(),
    );
    let body = extract_response_body(&wire).expect("should locate the response");
    assert_eq!(
        body.as_ref(),
        &hex::decode("01030053657454656d7000430007000000ac41").unwrap()[..]
    );
}

#[test]
fn extract_response_body_rejects_wrong_command() {
    // A read *request* is not a read response.
    let wire = Frame::read_request(5, 0, 3).encode();
    assert!(matches!(
        extract_response_body(&wire),
        Err(GazError::InvalidFrame(_))
    ));
}

#[test]
fn extract_response_body_requires_minimum_length() {
    assert!(matches!(
        extract_response_body(&[0x68, 0x05, 0x00]),
        Err(GazError::InsufficientData { .. })
    ));
    assert!(matches!(
        extract_response_body(&[0x11, 0x22, 0x33]),
        Err(GazError::InvalidFrame(_))
    ));
}

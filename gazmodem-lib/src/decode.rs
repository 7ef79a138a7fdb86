//! Type-driven decoder for read-response payloads.
//!
//! A response body carries, after the echoed request bytes: two null-terminated
//! Latin-1 text fields (name, unit), an info byte selecting the value type and
//! access mode, a signed decimal exponent, and the fixed-width value itself.
//! Unassigned slots answer with an empty name or a literal `"?"`.

use crate::constants::{MAX_EXPONENT, RESPONSE_ECHO_SIZE};
use crate::param::{AccessMode, ParamType, ParameterRecord, RawValue};
use modular_bitfield::prelude::*;
use tracing::trace;

/// Rendered in place of a value when the type is zero-width or the payload is
/// shorter than the type's encoded size.
pub const VALUE_PLACEHOLDER: &str = "---";

/// The parameter info byte: low nibble is the type id, bit 0x20 the
/// read-write flag. The remaining bits have never been seen set.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamInfo {
    pub type_id: B4,
    #[skip]
    reserved_lo: B1,
    pub writable: bool,
    #[skip]
    reserved_hi: B2,
}

/// Read a null-terminated Latin-1 string starting at `pos`, trimmed.
/// A missing terminator yields an empty string with the cursor at the end of
/// the buffer, which downstream checks then reject.
fn read_cstr(buf: &[u8], pos: usize) -> (String, usize) {
    if pos >= buf.len() {
        return (String::new(), buf.len());
    }
    match buf[pos..].iter().position(|&b| b == 0) {
        Some(off) => {
            let text: String = buf[pos..pos + off].iter().map(|&b| b as char).collect();
            (text.trim().to_string(), pos + off + 1)
        }
        None => (String::new(), buf.len()),
    }
}

fn render_value(param_type: ParamType, raw: RawValue, exponent: i8) -> String {
    if param_type.is_float() {
        return format!("{:.2}", raw.as_f64());
    }
    match param_type {
        ParamType::Boolean => if raw.is_zero() { "OFF" } else { "ON" }.to_string(),
        ParamType::Text => "TXT".to_string(),
        _ if exponent != 0 => format!("{}", raw.as_f64() * 10f64.powi(exponent as i32)),
        _ => raw.to_string(),
    }
}

/// Decode one read-response body into a record.
///
/// Returns `None` for unassigned slots and for anything structurally broken:
/// the decoder never emits a record it cannot fully populate.
pub fn decode_parameter(device: u16, index: u16, body: &[u8]) -> Option<ParameterRecord> {
    let (name, cursor) = read_cstr(body, RESPONSE_ECHO_SIZE);
    if name.is_empty() || name == "?" {
        return None;
    }
    let (unit, cursor) = read_cstr(body, cursor);

    if body.len() < cursor + 2 {
        trace!(device, index, "payload ends before info/exponent bytes");
        return None;
    }
    let info = ParamInfo::from_bytes([body[cursor]]);
    let exponent_raw = body[cursor + 1] as i8;
    let cursor = cursor + 2;

    let Ok(param_type) = ParamType::try_from(info.type_id()) else {
        trace!(device, index, type_id = info.type_id(), "unknown type id");
        return None;
    };
    let access = if info.writable() {
        AccessMode::ReadWrite
    } else {
        AccessMode::ReadOnly
    };
    // Garbage slots occasionally answer with absurd exponents; scaling by
    // them would produce nonsense numbers.
    let exponent = if exponent_raw.unsigned_abs() > MAX_EXPONENT as u8 {
        0
    } else {
        exponent_raw
    };

    let value = match param_type.decode_value(&body[cursor..]) {
        Some(raw) => render_value(param_type, raw, exponent),
        None => VALUE_PLACEHOLDER.to_string(),
    };

    Some(ParameterRecord {
        device,
        index,
        name,
        value,
        exponent,
        unit,
        type_name: param_type.to_string(),
        access,
    })
}

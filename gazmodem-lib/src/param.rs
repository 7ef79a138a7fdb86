//! Parameter value types and the decoded record handed to consumers.

use bytes::Buf;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::Display;

/// Value types carried in the low nibble of a parameter's info byte.
///
/// Display names match what the controllers' own engineering tools show.
/// Ids 0 and 8 are reserved slots with no value payload; id 15 has never been
/// observed and is treated as undecodable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ParamType {
    #[strum(to_string = "None")]
    None = 0,
    #[strum(to_string = "SHORT INT")]
    ShortInt = 1,
    #[strum(to_string = "INT")]
    Int = 2,
    #[strum(to_string = "LONG INT")]
    LongInt = 3,
    #[strum(to_string = "BYTE")]
    Byte = 4,
    #[strum(to_string = "WORD")]
    Word = 5,
    #[strum(to_string = "DWORD")]
    Dword = 6,
    #[strum(to_string = "SHORT REAL")]
    ShortReal = 7,
    #[strum(to_string = "None")]
    Reserved = 8,
    #[strum(to_string = "LONG REAL")]
    LongReal = 9,
    #[strum(to_string = "BOOLEAN")]
    Boolean = 10,
    #[strum(to_string = "BCD")]
    Bcd = 11,
    #[strum(to_string = "STRING")]
    Text = 12,
    #[strum(to_string = "INT 64")]
    Int64 = 13,
    #[strum(to_string = "UINT 64")]
    Uint64 = 14,
}

impl ParamType {
    /// Encoded width in bytes; 0 means no fixed-width value follows (reserved
    /// slots and variable-length text).
    pub fn size(self) -> usize {
        match self {
            ParamType::None | ParamType::Reserved | ParamType::Text => 0,
            ParamType::ShortInt | ParamType::Byte | ParamType::Boolean | ParamType::Bcd => 1,
            ParamType::Int | ParamType::Word => 2,
            ParamType::LongInt | ParamType::Dword | ParamType::ShortReal => 4,
            ParamType::LongReal | ParamType::Int64 | ParamType::Uint64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ParamType::ShortReal | ParamType::LongReal)
    }

    /// Decode the fixed-width little-endian value at the head of `buf`.
    /// Returns `None` for zero-width types or when too few bytes remain.
    pub fn decode_value(self, buf: &[u8]) -> Option<RawValue> {
        let size = self.size();
        if size == 0 || buf.len() < size {
            return None;
        }
        let mut buf = buf;
        Some(match self {
            ParamType::ShortInt => RawValue::Signed(buf.get_i8() as i64),
            ParamType::Int => RawValue::Signed(buf.get_i16_le() as i64),
            ParamType::LongInt => RawValue::Signed(buf.get_i32_le() as i64),
            ParamType::Byte | ParamType::Boolean | ParamType::Bcd => {
                RawValue::Unsigned(buf.get_u8() as u64)
            }
            ParamType::Word => RawValue::Unsigned(buf.get_u16_le() as u64),
            ParamType::Dword => RawValue::Unsigned(buf.get_u32_le() as u64),
            ParamType::ShortReal => RawValue::Float(buf.get_f32_le() as f64),
            ParamType::LongReal => RawValue::Float(buf.get_f64_le()),
            ParamType::Int64 => RawValue::Signed(buf.get_i64_le()),
            ParamType::Uint64 => RawValue::Unsigned(buf.get_u64_le()),
            ParamType::None | ParamType::Reserved | ParamType::Text => return None,
        })
    }
}

/// A decoded numeric payload before rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl RawValue {
    pub fn as_f64(self) -> f64 {
        match self {
            RawValue::Signed(v) => v as f64,
            RawValue::Unsigned(v) => v as f64,
            RawValue::Float(v) => v,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            RawValue::Signed(v) => v == 0,
            RawValue::Unsigned(v) => v == 0,
            RawValue::Float(v) => v == 0.0,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Signed(v) => write!(f, "{v}"),
            RawValue::Unsigned(v) => write!(f, "{v}"),
            RawValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Whether a parameter slot accepts writes, from bit 0x20 of the info byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    #[serde(rename = "RO")]
    ReadOnly,
    #[serde(rename = "RW")]
    ReadWrite,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::ReadOnly => write!(f, "RO"),
            AccessMode::ReadWrite => write!(f, "RW"),
        }
    }
}

/// One fully decoded (device, index) result. Immutable once emitted; the
/// scanner hands ownership to the record channel and never touches it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub device: u16,
    pub index: u16,
    pub name: String,
    pub value: String,
    pub exponent: i8,
    pub unit: String,
    pub type_name: String,
    pub access: AccessMode,
}

impl fmt::Display for ParameterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>5}:{:<4}] {:<24} = {:>10} {:<6} ({}, exp {}, {})",
            self.device,
            self.index,
            self.name,
            self.value,
            self.unit,
            self.type_name,
            self.exponent,
            self.access
        )
    }
}

//! Primitive value codec.
//!
//! Payload fields are opaque bytes until a caller asks for a typed view. This
//! module maps the closed set of payload value types to their wire encodings
//! and back:
//!
//! | Kind      | Rust type    | Encoding                                          |
//! |-----------|--------------|---------------------------------------------------|
//! | `text`    | `String`     | ASCII, one byte per char, no terminator           |
//! | `float32` | `f32`        | IEEE-754, 4 bytes little-endian                   |
//! | `float64` | `f64`        | IEEE-754, 8 bytes little-endian                   |
//! | `uint16`  | `u16`        | 2 bytes little-endian                             |
//! | `uint24`  | `u32`        | 3 bytes little-endian, decodes from up to 4 bytes |
//! | `date`    | `NaiveDate`  | day, month, year - 1900 (one byte each)           |
//! | `flags`   | `FlagSet`    | 1 byte, flag `i` in bit `i`, at most 8 flags      |

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::constants::{DATE_LEN, DATE_YEAR_BASE, MAX_FLAGS, UINT24_LEN, UINT24_MAX};
use crate::error::CodecError;

// ============================================================================
// Value Kinds
// ============================================================================

/// Type tag for the values the codec supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// ASCII text.
    Text,
    /// Single precision float.
    Float32,
    /// Double precision float.
    Float64,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned integer clamped to 24 bits.
    UInt24,
    /// Calendar date without time.
    Date,
    /// Up to eight boolean flags.
    Flags,
}

impl ValueKind {
    /// Every supported kind.
    pub const ALL: [ValueKind; 7] = [
        ValueKind::Text,
        ValueKind::Float32,
        ValueKind::Float64,
        ValueKind::UInt16,
        ValueKind::UInt24,
        ValueKind::Date,
        ValueKind::Flags,
    ];

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Float32 => "float32",
            ValueKind::Float64 => "float64",
            ValueKind::UInt16 => "uint16",
            ValueKind::UInt24 => "uint24",
            ValueKind::Date => "date",
            ValueKind::Flags => "flags",
        }
    }

    /// Encoded width in bytes, `None` for variable-length text.
    pub fn encoded_len(self) -> Option<usize> {
        match self {
            ValueKind::Text => None,
            ValueKind::Float32 => Some(4),
            ValueKind::Float64 => Some(8),
            ValueKind::UInt16 => Some(2),
            ValueKind::UInt24 => Some(UINT24_LEN),
            ValueKind::Date => Some(DATE_LEN),
            ValueKind::Flags => Some(1),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "string" | "ascii" => Ok(ValueKind::Text),
            "float32" | "f32" | "float" | "single" => Ok(ValueKind::Float32),
            "float64" | "f64" | "double" => Ok(ValueKind::Float64),
            "uint16" | "u16" | "ushort" => Ok(ValueKind::UInt16),
            "uint24" | "u24" | "uint32" | "u32" | "uint" => Ok(ValueKind::UInt24),
            "date" => Ok(ValueKind::Date),
            "flags" | "bits" | "bitset" => Ok(ValueKind::Flags),
            _ => Err(CodecError::UnsupportedType(s.to_string())),
        }
    }
}

// ============================================================================
// Flag Set
// ============================================================================

/// Ordered set of boolean flags, packed one per bit on the wire.
///
/// Equality and hashing ignore trailing cleared flags, so a set compares
/// equal to the eight flags decoded from its packed byte.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlagSet(Vec<bool>);

impl FlagSet {
    /// Create `len` cleared flags.
    pub fn new(len: usize) -> Self {
        FlagSet(vec![false; len])
    }

    /// Unpack all eight flags of a byte, bit 0 first.
    pub fn from_byte(byte: u8) -> Self {
        FlagSet((0..MAX_FLAGS).map(|bit| byte & (1 << bit) != 0).collect())
    }

    /// Pack the flags into a byte.
    pub fn to_byte(&self) -> Result<u8, CodecError> {
        if self.0.len() > MAX_FLAGS {
            return Err(CodecError::out_of_range(format!(
                "flag set holds {} flags, at most {MAX_FLAGS} fit in a byte",
                self.0.len()
            )));
        }

        Ok(self
            .0
            .iter()
            .enumerate()
            .fold(0u8, |acc, (bit, &set)| if set { acc | (1 << bit) } else { acc }))
    }

    /// Number of flags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no flags at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flag at `index`, if present.
    pub fn get(&self, index: usize) -> Option<bool> {
        self.0.get(index).copied()
    }

    /// Set the flag at `index`, growing the set with cleared flags if needed.
    pub fn set(&mut self, index: usize, value: bool) {
        if index >= self.0.len() {
            self.0.resize(index + 1, false);
        }
        self.0[index] = value;
    }

    /// Iterate over the flags in index order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }

    /// Flags as a slice.
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    /// Flags up to and including the highest set one.
    fn significant(&self) -> &[bool] {
        let end = self.0.iter().rposition(|&set| set).map_or(0, |last| last + 1);
        &self.0[..end]
    }
}

impl PartialEq for FlagSet {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for FlagSet {}

impl Hash for FlagSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl From<Vec<bool>> for FlagSet {
    fn from(flags: Vec<bool>) -> Self {
        FlagSet(flags)
    }
}

impl FromIterator<bool> for FlagSet {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        FlagSet(iter.into_iter().collect())
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // highest index first, like a binary literal
        for set in self.0.iter().rev() {
            f.write_str(if *set { "1" } else { "0" })?;
        }
        Ok(())
    }
}

// ============================================================================
// Values
// ============================================================================

/// A decoded payload value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// ASCII text.
    Text(String),
    /// Single precision float.
    Float32(f32),
    /// Double precision float.
    Float64(f64),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Unsigned integer of at most 24 bits.
    UInt24(u32),
    /// Calendar date.
    Date(NaiveDate),
    /// Flag set.
    Flags(FlagSet),
}

impl Value {
    /// Type tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Text(_) => ValueKind::Text,
            Value::Float32(_) => ValueKind::Float32,
            Value::Float64(_) => ValueKind::Float64,
            Value::UInt16(_) => ValueKind::UInt16,
            Value::UInt24(_) => ValueKind::UInt24,
            Value::Date(_) => ValueKind::Date,
            Value::Flags(_) => ValueKind::Flags,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::UInt24(v) => write!(f, "{v}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Flags(flags) => write!(f, "0b{flags}"),
        }
    }
}

/// Rust types with a direct mapping to a [`ValueKind`].
pub trait HartValue: Sized {
    /// Kind this type encodes as.
    const KIND: ValueKind;

    /// Wrap into a [`Value`].
    fn into_value(self) -> Value;

    /// Unwrap from a [`Value`] of the matching kind.
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! hart_value {
    ($ty:ty, $variant:ident) => {
        impl HartValue for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

hart_value!(String, Text);
hart_value!(f32, Float32);
hart_value!(f64, Float64);
hart_value!(u16, UInt16);
hart_value!(u32, UInt24);
hart_value!(NaiveDate, Date);
hart_value!(FlagSet, Flags);

// ============================================================================
// Encoding
// ============================================================================

/// Encode a value to bytes. An absent value encodes to an empty buffer.
pub fn encode(value: Option<&Value>) -> Result<Vec<u8>, CodecError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };

    match value {
        Value::Text(s) => Ok(encode_text(s)),
        Value::Float32(v) => Ok(v.to_le_bytes().to_vec()),
        Value::Float64(v) => Ok(v.to_le_bytes().to_vec()),
        Value::UInt16(v) => Ok(v.to_le_bytes().to_vec()),
        Value::UInt24(v) => encode_uint24(*v),
        Value::Date(d) => Ok(encode_date(d)),
        Value::Flags(flags) => Ok(vec![flags.to_byte()?]),
    }
}

/// Encode a typed value to bytes.
pub fn encode_as<T: HartValue>(value: Option<T>) -> Result<Vec<u8>, CodecError> {
    encode(value.map(HartValue::into_value).as_ref())
}

fn encode_text(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

fn encode_uint24(value: u32) -> Result<Vec<u8>, CodecError> {
    if value > UINT24_MAX {
        return Err(CodecError::out_of_range(format!(
            "{value} exceeds the 3-byte maximum of {UINT24_MAX}"
        )));
    }
    Ok(value.to_le_bytes()[..UINT24_LEN].to_vec())
}

fn encode_date(date: &NaiveDate) -> Vec<u8> {
    // each component keeps only its low byte
    vec![
        date.day() as u8,
        date.month() as u8,
        (date.year() - DATE_YEAR_BASE) as u8,
    ]
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode bytes as a value of the given kind.
pub fn decode(kind: ValueKind, bytes: Option<&[u8]>) -> Result<Value, CodecError> {
    let bytes = bytes.ok_or(CodecError::MissingInput)?;

    match kind {
        ValueKind::Text => Ok(Value::Text(decode_text(bytes))),
        ValueKind::Float32 => Ok(Value::Float32(f32::from_le_bytes(fixed(kind, bytes)?))),
        ValueKind::Float64 => Ok(Value::Float64(f64::from_le_bytes(fixed(kind, bytes)?))),
        ValueKind::UInt16 => Ok(Value::UInt16(u16::from_le_bytes(fixed(kind, bytes)?))),
        ValueKind::UInt24 => decode_uint24(bytes).map(Value::UInt24),
        ValueKind::Date => decode_date(bytes).map(Value::Date),
        ValueKind::Flags => {
            let [byte] = fixed::<1>(kind, bytes)?;
            Ok(Value::Flags(FlagSet::from_byte(byte)))
        }
    }
}

/// Decode bytes as a typed value.
pub fn decode_as<T: HartValue>(bytes: Option<&[u8]>) -> Result<T, CodecError> {
    let value = decode(T::KIND, bytes)?;
    T::from_value(value).ok_or_else(|| CodecError::UnsupportedType(T::KIND.name().to_string()))
}

fn fixed<const N: usize>(kind: ValueKind, bytes: &[u8]) -> Result<[u8; N], CodecError> {
    bytes
        .try_into()
        .map_err(|_| CodecError::wrong_length(kind.name(), N, bytes.len()))
}

fn decode_text(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}

fn decode_uint24(bytes: &[u8]) -> Result<u32, CodecError> {
    let mut buf = [0u8; 4];
    if bytes.len() > buf.len() {
        return Err(CodecError::out_of_range(format!(
            "uint24 accepts at most {} bytes, got {}",
            buf.len(),
            bytes.len()
        )));
    }

    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(u32::from_le_bytes(buf))
}

fn decode_date(bytes: &[u8]) -> Result<NaiveDate, CodecError> {
    let [day, month, year] = fixed::<DATE_LEN>(ValueKind::Date, bytes)?;
    let year = DATE_YEAR_BASE + i32::from(year);

    NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(day)).ok_or_else(|| {
        CodecError::out_of_range(format!("{year:04}-{month:02}-{day:02} is not a calendar date"))
    })
}

//! Argument codec
//!
//! Converts human-supplied typed values into the byte buffers contracts
//! receive as arguments, and contract bytes back into typed values.
//!
//! | Format   | Encode                                   | Decode                         |
//! |----------|------------------------------------------|--------------------------------|
//! | `byte`   | unsigned 8-bit decimal, one byte         | first byte                     |
//! | `int8`   | signed 8-bit decimal, minimal BE         | sign-extended BE               |
//! | `uint64` | unsigned 64-bit decimal, minimal BE      | first 8 bytes, BE              |
//! | `int64`  | signed 64-bit decimal, minimal BE        | sign-extended BE               |
//! | `string` | raw UTF-8 bytes                          | bytes as text                  |
//! | `bigint` | base-10 integer, BE magnitude            | unsigned BE as decimal string  |
//! | `hex`    | `0x`-prefixed hex                        | `0x`-prefixed hex              |
//! | `dna`    | decimal amount scaled to base units      | base units as decimal amount   |
//!
//! Signed integers use minimal two's complement; zero encodes as no bytes.
//! Unknown format tags are treated as `hex`.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use num_bigint::{BigInt, BigUint, Sign};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::amount::Amount;
use crate::core::attachment::ArgSlot;

/// Highest argument position a request may use
pub const MAX_ARGUMENT_POSITION: usize = u8::MAX as usize;

// =============================================================================
// Errors
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("cannot parse {format}: \"{value}\"")]
    Encode { format: Format, value: String },
    #[error("cannot decode {format} from 0x{data}")]
    Decode { format: Format, data: String },
    #[error("argument position {0} exceeds the maximum of 255")]
    PositionOutOfRange(usize),
}

// =============================================================================
// Formats
// =============================================================================

/// Format tag selecting an encode/decode rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Format {
    Byte,
    Int8,
    Uint64,
    Int64,
    String,
    BigInt,
    Hex,
    Dna,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Byte => "byte",
            Format::Int8 => "int8",
            Format::Uint64 => "uint64",
            Format::Int64 => "int64",
            Format::String => "string",
            Format::BigInt => "bigint",
            Format::Hex => "hex",
            Format::Dna => "dna",
        }
    }

    /// Parse a tag; anything unrecognized falls back to hex
    pub fn parse(tag: &str) -> Self {
        match tag {
            "byte" => Format::Byte,
            "int8" => Format::Int8,
            "uint64" => Format::Uint64,
            "int64" => Format::Int64,
            "string" => Format::String,
            "bigint" => Format::BigInt,
            "hex" => Format::Hex,
            "dna" => Format::Dna,
            other => {
                debug!("Unknown format \"{}\", treating as hex", other);
                Format::Hex
            }
        }
    }
}

impl Default for Format {
    fn default() -> Self {
        Format::Hex
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Format {
    fn from(tag: String) -> Self {
        Format::parse(&tag)
    }
}

impl From<Format> for String {
    fn from(format: Format) -> Self {
        format.as_str().to_string()
    }
}

// =============================================================================
// Values
// =============================================================================

/// One typed call argument as supplied by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedValue {
    #[serde(rename = "index")]
    pub position: usize,
    #[serde(default)]
    pub format: Format,
    #[serde(rename = "value")]
    pub raw: String,
}

impl TypedValue {
    pub fn new(position: usize, format: Format, raw: impl Into<String>) -> Self {
        Self {
            position,
            format,
            raw: raw.into(),
        }
    }
}

/// A value decoded from contract bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DecodedValue {
    Byte(u8),
    Int(i64),
    Uint(u64),
    /// Text, decimal strings and hex all render as JSON strings
    Text(String),
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Byte(v) => write!(f, "{}", v),
            DecodedValue::Int(v) => write!(f, "{}", v),
            DecodedValue::Uint(v) => write!(f, "{}", v),
            DecodedValue::Text(v) => f.write_str(v),
        }
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Minimal two's-complement big-endian bytes; zero is empty
fn signed_to_bytes(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    BigInt::from(value).to_signed_bytes_be()
}

/// Minimal big-endian bytes; zero is empty
fn unsigned_to_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

fn parse_hex(raw: &str) -> Option<Vec<u8>> {
    let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    hex::decode(digits).ok()
}

/// Encode a raw string according to `format`
pub fn encode(format: Format, raw: &str) -> Result<Vec<u8>, FormatError> {
    let err = || FormatError::Encode {
        format,
        value: raw.to_string(),
    };
    match format {
        Format::Byte => raw.parse::<u8>().map(|b| vec![b]).map_err(|_| err()),
        Format::Int8 => raw
            .parse::<i8>()
            .map(|v| signed_to_bytes(v.into()))
            .map_err(|_| err()),
        Format::Uint64 => raw
            .parse::<u64>()
            .map(unsigned_to_bytes)
            .map_err(|_| err()),
        Format::Int64 => raw.parse::<i64>().map(signed_to_bytes).map_err(|_| err()),
        Format::String => Ok(raw.as_bytes().to_vec()),
        Format::BigInt => {
            let value = BigInt::parse_bytes(raw.as_bytes(), 10).ok_or_else(err)?;
            if value.sign() == Sign::NoSign {
                return Ok(Vec::new());
            }
            Ok(value.magnitude().to_bytes_be())
        }
        Format::Hex => parse_hex(raw).ok_or_else(err),
        Format::Dna => raw
            .parse::<Amount>()
            .map(|a| a.to_bytes_be())
            .map_err(|_| err()),
    }
}

/// Decode contract bytes according to `format`
pub fn decode(format: Format, data: &[u8]) -> Result<DecodedValue, FormatError> {
    let err = || FormatError::Decode {
        format,
        data: hex::encode(data),
    };
    let value = match format {
        Format::Byte => DecodedValue::Byte(*data.first().ok_or_else(err)?),
        Format::Int8 => {
            if data.len() > 1 {
                return Err(err());
            }
            DecodedValue::Int(data.first().map(|b| *b as i8 as i64).unwrap_or(0))
        }
        Format::Uint64 => {
            let head = &data[..data.len().min(8)];
            DecodedValue::Uint(head.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
        }
        Format::Int64 => {
            if data.len() > 8 {
                return Err(err());
            }
            let fill = if data.first().is_some_and(|b| b & 0x80 != 0) {
                0xFF
            } else {
                0x00
            };
            let mut word = [fill; 8];
            word[8 - data.len()..].copy_from_slice(data);
            DecodedValue::Int(i64::from_be_bytes(word))
        }
        Format::String => DecodedValue::Text(String::from_utf8_lossy(data).into_owned()),
        Format::BigInt => DecodedValue::Text(BigUint::from_bytes_be(data).to_string()),
        Format::Hex => DecodedValue::Text(format!("0x{}", hex::encode(data))),
        Format::Dna => DecodedValue::Text(Amount::from_bytes_be(data).to_string()),
    };
    Ok(value)
}

/// Build the dense argument vector from sparse typed values
///
/// The result has `max(position) + 1` slots (none for an empty input).
/// Missing positions are `None`; for repeated positions the last value
/// wins. Encoding runs in ascending position order and stops at the
/// first error.
pub fn build_argument_vector(values: &[TypedValue]) -> Result<Vec<ArgSlot>, FormatError> {
    let mut by_position: BTreeMap<usize, &TypedValue> = BTreeMap::new();
    for value in values {
        if value.position > MAX_ARGUMENT_POSITION {
            return Err(FormatError::PositionOutOfRange(value.position));
        }
        by_position.insert(value.position, value);
    }

    let Some(max_position) = by_position.keys().next_back().copied() else {
        return Ok(Vec::new());
    };

    let mut slots = Vec::with_capacity(max_position + 1);
    for position in 0..=max_position {
        let slot = match by_position.get(&position) {
            Some(value) => Some(encode(value.format, &value.raw)?),
            None => None,
        };
        slots.push(slot);
    }
    Ok(slots)
}

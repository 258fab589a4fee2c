//! Fixed-size ledger identifiers
//!
//! `Address` (20 bytes) and `Hash` (32 bytes), both rendered and parsed as
//! `0x`-prefixed hex.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors parsing hex identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseIdError {
    #[error("missing 0x prefix: {0}")]
    MissingPrefix(String),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

macro_rules! fixed_bytes {
    ($name:ident, $len:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;
            pub const ZERO: Self = Self([0u8; $len]);

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Build from a slice, failing on length mismatch
            pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseIdError> {
                if bytes.len() != $len {
                    return Err(ParseIdError::InvalidLength {
                        expected: $len,
                        actual: bytes.len(),
                    });
                }
                let mut out = [0u8; $len];
                out.copy_from_slice(bytes);
                Ok(Self(out))
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; $len]
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .ok_or_else(|| ParseIdError::MissingPrefix(s.to_string()))?;
                let bytes =
                    hex::decode(digits).map_err(|_| ParseIdError::InvalidHex(s.to_string()))?;
                Self::from_slice(&bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(Address, 20);
fixed_bytes!(Hash, 32);

impl Hash {
    /// Take the first 32 bytes of a digest
    pub fn from_digest(digest: &[u8]) -> Self {
        let mut out = [0u8; 32];
        let n = digest.len().min(32);
        out[..n].copy_from_slice(&digest[..n]);
        Self(out)
    }
}

/// Arbitrary bytes carried over JSON as `0x`-prefixed hex
#[derive(Clone, PartialEq, Eq, Default)]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl FromStr for HexBytes {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| ParseIdError::MissingPrefix(s.to_string()))?;
        hex::decode(digits)
            .map(HexBytes)
            .map_err(|_| ParseIdError::InvalidHex(s.to_string()))
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let text = "0x00112233445566778899aabbccddeeff00112233";
        let address: Address = text.parse().unwrap();
        assert_eq!(address.to_string(), text);
        assert!(!address.is_zero());
        assert!(Address::ZERO.is_zero());
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert!(matches!(
            "0011".parse::<Address>(),
            Err(ParseIdError::MissingPrefix(_))
        ));
        assert!(matches!(
            "0x0011".parse::<Address>(),
            Err(ParseIdError::InvalidLength { expected: 20, actual: 2 })
        ));
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash = Hash::new([0xab; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(32)));
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_hex_bytes_empty() {
        let bytes: HexBytes = "0x".parse().unwrap();
        assert!(bytes.0.is_empty());
        assert_eq!(bytes.to_hex(), "0x");
    }
}

//! DNA amounts
//!
//! An amount is an integer count of base units with a human interpretation
//! as a decimal value with 18 decimal places (`1 DNA = 10^18` base units).

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid decimal amount: \"{0}\"")]
pub struct ParseAmountError(pub String);

/// A quantity of DNA, stored as base units
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Amount {
    base: BigInt,
}

impl Amount {
    /// The logical number of decimal places of one DNA
    pub const DECIMALS: usize = 18;

    /// Base units in one DNA
    pub fn precision() -> BigInt {
        BigInt::from(10u64.pow(Self::DECIMALS as u32))
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Creates an amount from a quantity of base units
    pub fn from_base(base: impl Into<BigInt>) -> Self {
        Self { base: base.into() }
    }

    /// Creates an amount from whole DNA
    pub fn from_whole(dna: i64) -> Self {
        Self::from_base(BigInt::from(dna) * Self::precision())
    }

    /// Interpret big-endian bytes as an unsigned count of base units
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        Self::from_base(BigInt::from_bytes_be(Sign::Plus, bytes))
    }

    /// Big-endian magnitude of the base units, minimal length (empty for zero)
    pub fn to_bytes_be(&self) -> Vec<u8> {
        if self.base.is_zero() {
            return Vec::new();
        }
        self.base.magnitude().to_bytes_be()
    }

    pub fn base(&self) -> &BigInt {
        &self.base
    }

    pub fn is_zero(&self) -> bool {
        self.base.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.base.is_negative()
    }

    /// Base units clamped into a `u64`
    pub fn saturating_u64(&self) -> u64 {
        if self.base.is_negative() {
            0
        } else {
            self.base.to_u64().unwrap_or(u64::MAX)
        }
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }
}

/// Largest power of ten a decimal may be scaled by while parsing
const MAX_DECIMAL_SHIFT: u64 = 96;

impl FromStr for Amount {
    type Err = ParseAmountError;

    /// Parse a decimal such as `1.5`, `-2`, `.25` or `1e-3`. Digits beyond
    /// the 18th decimal place are truncated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseAmountError(s.to_string());
        let text = s.trim();

        let (mantissa, exponent) = match text.find(['e', 'E']) {
            Some(pos) => {
                let exp: i64 = text[pos + 1..].parse().map_err(|_| err())?;
                (&text[..pos], exp)
            }
            None => (text, 0),
        };

        let (negative, unsigned) = match mantissa.as_bytes().first() {
            Some(b'-') => (true, &mantissa[1..]),
            Some(b'+') => (false, &mantissa[1..]),
            _ => (false, mantissa),
        };

        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, f),
            None => (unsigned, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }

        let digits = format!("{}{}", int_part, frac_part);
        let mut value = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(err)?;

        // value * 10^(DECIMALS + exponent - frac_len)
        let shift = (Self::DECIMALS as i64)
            .checked_add(exponent)
            .and_then(|s| s.checked_sub(frac_part.len() as i64))
            .filter(|s| s.unsigned_abs() <= MAX_DECIMAL_SHIFT)
            .ok_or_else(err)?;
        let scale = BigInt::from(10u8).pow(shift.unsigned_abs() as u32);
        if shift >= 0 {
            value *= scale;
        } else {
            value /= scale;
        }

        if negative {
            value = -value;
        }
        Ok(Self { base: value })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (q, r) = self.base.abs().div_rem(&Self::precision());
        let sign = if self.base.is_negative() { "-" } else { "" };
        if r.is_zero() {
            return write!(f, "{}{}", sign, q);
        }
        let fraction = r.to_str_radix(10);
        let padded = "0".repeat(Self::DECIMALS - fraction.len()) + &fraction;
        write!(f, "{}{}.{}", sign, q, padded.trim_end_matches('0'))
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({} DNA)", self)
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base.cmp(&other.base)
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, other: Amount) -> Amount {
        Amount::from_base(self.base + other.base)
    }
}

impl<'a> Add<&'a Amount> for &'a Amount {
    type Output = Amount;
    fn add(self, other: &'a Amount) -> Amount {
        Amount::from_base(&self.base + &other.base)
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, other: Amount) -> Amount {
        Amount::from_base(self.base - other.base)
    }
}

impl<'a> Sub<&'a Amount> for &'a Amount {
    type Output = Amount;
    fn sub(self, other: &'a Amount) -> Amount {
        Amount::from_base(&self.base - &other.base)
    }
}

impl AddAssign<&Amount> for Amount {
    fn add_assign(&mut self, other: &Amount) {
        self.base += &other.base;
    }
}

impl SubAssign<&Amount> for Amount {
    fn sub_assign(&mut self, other: &Amount) {
        self.base -= &other.base;
    }
}

impl Mul<u64> for &Amount {
    type Output = Amount;
    fn mul(self, factor: u64) -> Amount {
        Amount::from_base(&self.base * factor)
    }
}

impl Neg for Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        Amount::from_base(-self.base)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Number(n) => n.to_string(),
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

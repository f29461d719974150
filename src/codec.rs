//! Hex helpers for the node-facing boundary.
//!
//! Every byte-valued field leaves this crate as a lowercase `0x`-prefixed
//! string and enters it with its width checked.

use alloy::primitives::U256;

use crate::error::DecodeError;

fn strip_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Decode a hex string into exactly `N` bytes.
pub fn parse_fixed<const N: usize>(field: &'static str, s: &str) -> Result<[u8; N], DecodeError> {
    let bytes = parse_bytes(field, s)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| DecodeError::InvalidWidth {
        field,
        expected: N,
        actual,
    })
}

/// Decode a variable-length hex string.
pub fn parse_bytes(field: &'static str, s: &str) -> Result<Vec<u8>, DecodeError> {
    let digits = strip_prefix(s);
    if digits.len() % 2 != 0 {
        return Err(DecodeError::InvalidHex { field });
    }
    hex::decode(digits).map_err(|_| DecodeError::InvalidHex { field })
}

/// Canonical form of a 20-byte address.
pub fn address(field: &'static str, s: &str) -> Result<String, DecodeError> {
    parse_fixed::<20>(field, s).map(to_hex)
}

/// Canonical form of a 32-byte hash or storage key.
pub fn hash(field: &'static str, s: &str) -> Result<String, DecodeError> {
    parse_fixed::<32>(field, s).map(to_hex)
}

/// Parse a quantity, either `0x` hex or decimal.
pub fn parse_quantity(field: &'static str, s: &str) -> Result<U256, DecodeError> {
    let trimmed = s.trim();
    let parsed = match trimmed.strip_prefix("0x") {
        // Nodes emit "0x" for zero in a few places.
        Some("") => Ok(U256::ZERO),
        Some(digits) => U256::from_str_radix(digits, 16),
        None => U256::from_str_radix(trimmed, 10),
    };
    parsed.map_err(|_| DecodeError::InvalidQuantity {
        field,
        value: s.to_string(),
    })
}

pub fn parse_u64(field: &'static str, s: &str) -> Result<u64, DecodeError> {
    let value = parse_quantity(field, s)?;
    u64::try_from(value).map_err(|_| DecodeError::InvalidQuantity {
        field,
        value: s.to_string(),
    })
}

pub fn opt_quantity(field: &'static str, s: Option<&str>) -> Result<Option<U256>, DecodeError> {
    s.map(|s| parse_quantity(field, s)).transpose()
}

pub fn opt_u64(field: &'static str, s: Option<&str>) -> Result<Option<u64>, DecodeError> {
    s.map(|s| parse_u64(field, s)).transpose()
}

pub fn required<'a>(field: &'static str, s: Option<&'a str>) -> Result<&'a str, DecodeError> {
    s.ok_or(DecodeError::MissingField(field))
}

pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

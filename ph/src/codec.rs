//! Decimal codec for arbitrary-precision integers
//!
//! Residues and Mersenne numbers travel over the wire as decimal strings.
//! A JSON number is backed by an f64 in most clients, so anything that can
//! exceed 2^53 must never be carried as one.

use num_bigint::BigUint;
use thiserror::Error;
use tracing::debug;

/// Errors from decoding untrusted numerals
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Malformed numeral: {0}")]
    MalformedNumeral(String),
}

/// Encode a non-negative integer as a base-10 string
pub fn encode(value: &BigUint) -> String {
    value.to_str_radix(10)
}

/// Decode a base-10 string into a non-negative integer
///
/// Accepts one or more ASCII digits (leading zeros allowed). Signs,
/// whitespace, underscores and every other character are rejected outright;
/// there is no partial parsing.
pub fn decode(text: &str) -> Result<BigUint, CodecError> {
    debug!(len = text.len(), "decode: called");
    if text.is_empty() {
        debug!("decode: empty input");
        return Err(CodecError::MalformedNumeral("empty string".to_string()));
    }

    if let Some(pos) = text.bytes().position(|b| !b.is_ascii_digit()) {
        debug!(pos, "decode: non-digit byte");
        return Err(CodecError::MalformedNumeral(format!(
            "unexpected character at offset {} in '{}'",
            pos,
            preview(text)
        )));
    }

    BigUint::parse_bytes(text.as_bytes(), 10)
        .ok_or_else(|| CodecError::MalformedNumeral(format!("cannot parse '{}'", preview(text))))
}

/// Lowest 64 bits as 16 hex digits, the customary residue fingerprint
///
/// Full residues of large exponents run to megabytes; logs and status lines
/// show this instead.
pub fn res64(value: &BigUint) -> String {
    format!("{:016X}", value.iter_u64_digits().next().unwrap_or(0))
}

/// Truncate long numerals for error messages
fn preview(text: &str) -> String {
    const MAX: usize = 32;
    if text.len() <= MAX {
        text.to_string()
    } else {
        let cut = text.char_indices().nth(MAX).map(|(i, _)| i).unwrap_or(text.len());
        format!("{}... ({} bytes)", &text[..cut], text.len())
    }
}

/// Serde adapter carrying a `BigUint` as a decimal string
///
/// Use as `#[serde(with = "crate::codec::decimal")]`.
pub mod decimal {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode(&text).map_err(D::Error::custom)
    }
}

//! Reversible byte/string transforms used by token codecs.
//!
//! Every decode primitive has an encode counterpart so fixtures can be built
//! from a known plaintext. All functions are pure.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD, URL_SAFE};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// atob-like decoder: accepts missing padding and non-zero trailing bits
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Failure of a single transform step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("transform requires a key but the derived key is empty")]
    EmptyKey,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} has no inverse")]
    NotInvertible(&'static str),
}

pub fn reverse(input: &[u8]) -> Vec<u8> {
    input.iter().rev().copied().collect()
}

/// Translate `-`/`_` to `+`/`/`, drop whitespace and restore padding
pub fn normalize_url_safe_base64(input: &[u8]) -> Vec<u8> {
    let mut normalized: Vec<u8> = input
        .iter()
        .filter(|b| !b.is_ascii_whitespace())
        .map(|&b| match b {
            b'-' => b'+',
            b'_' => b'/',
            other => other,
        })
        .collect();
    while normalized.last() == Some(&b'=') {
        normalized.pop();
    }
    while normalized.len() % 4 != 0 {
        normalized.push(b'=');
    }
    normalized
}

pub fn url_safe_base64_decode(input: &[u8]) -> Result<Vec<u8>, TransformError> {
    base64_decode(&normalize_url_safe_base64(input))
}

pub fn url_safe_base64_encode(input: &[u8]) -> Vec<u8> {
    URL_SAFE.encode(input).into_bytes()
}

/// Standard-alphabet decode, tolerant of whitespace and missing padding
pub fn base64_decode(input: &[u8]) -> Result<Vec<u8>, TransformError> {
    let cleaned: Vec<u8> = input
        .iter()
        .filter(|b| !b.is_ascii_whitespace())
        .copied()
        .collect();
    LENIENT_BASE64
        .decode(&cleaned)
        .map_err(|e| TransformError::InvalidBase64(e.to_string()))
}

pub fn base64_encode(input: &[u8]) -> Vec<u8> {
    STANDARD.encode(input).into_bytes()
}

/// Drop every non-hex character, then decode byte pairs
pub fn hex_pair_decode(input: &[u8]) -> Result<Vec<u8>, TransformError> {
    let digits: Vec<u8> = input
        .iter()
        .filter(|b| b.is_ascii_hexdigit())
        .copied()
        .collect();
    if digits.len() % 2 != 0 {
        return Err(TransformError::InvalidHex(format!(
            "odd number of hex digits ({})",
            digits.len()
        )));
    }
    hex::decode(&digits).map_err(|e| TransformError::InvalidHex(e.to_string()))
}

pub fn hex_pair_encode(input: &[u8]) -> Vec<u8> {
    hex::encode(input).into_bytes()
}

/// `(b + n) mod 256` per byte; `n` may be negative
pub fn mod_shift(input: &[u8], n: i16) -> Vec<u8> {
    input
        .iter()
        .map(|&b| (i16::from(b) + n).rem_euclid(256) as u8)
        .collect()
}

/// `b[i] xor key[i mod len(key)]`; self-inverse
pub fn xor_repeat(input: &[u8], key: &[u8]) -> Result<Vec<u8>, TransformError> {
    if key.is_empty() {
        return Err(TransformError::EmptyKey);
    }
    Ok(input
        .iter()
        .zip(key.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect())
}

/// Self-synchronizing XOR decode.
///
/// The effective key byte at position `i` is `key[i mod len] xor running`,
/// where `running` accumulates (by XOR) every plaintext byte decoded so far.
/// Must run strictly left to right.
pub fn xor_feedback(input: &[u8], key: &[u8]) -> Result<Vec<u8>, TransformError> {
    if key.is_empty() {
        return Err(TransformError::EmptyKey);
    }
    let mut running = 0u8;
    let mut output = Vec::with_capacity(input.len());
    for (i, &c) in input.iter().enumerate() {
        let plain = c ^ key[i % key.len()] ^ running;
        running ^= plain;
        output.push(plain);
    }
    Ok(output)
}

/// Inverse of [`xor_feedback`]
pub fn xor_feedback_encode(input: &[u8], key: &[u8]) -> Result<Vec<u8>, TransformError> {
    if key.is_empty() {
        return Err(TransformError::EmptyKey);
    }
    let mut running = 0u8;
    let mut output = Vec::with_capacity(input.len());
    for (i, &p) in input.iter().enumerate() {
        output.push(p ^ key[i % key.len()] ^ running);
        running ^= p;
    }
    Ok(output)
}

/// Rotate ASCII letters by 13; self-inverse
pub fn rot13(input: &[u8]) -> Vec<u8> {
    caesar_shift(input, 13)
}

/// Rotate ASCII letters by `n` within their case, other bytes untouched
pub fn caesar_shift(input: &[u8], n: i8) -> Vec<u8> {
    let shift = i16::from(n).rem_euclid(26) as u8;
    input
        .iter()
        .map(|&b| match b {
            b'a'..=b'z' => b'a' + (b - b'a' + shift) % 26,
            b'A'..=b'Z' => b'A' + (b - b'A' + shift) % 26,
            other => other,
        })
        .collect()
}

/// Keep bytes at positions `offset, offset + step, ...`
pub fn every_nth(input: &[u8], step: usize, offset: usize) -> Result<Vec<u8>, TransformError> {
    if step == 0 {
        return Err(TransformError::InvalidArgument(
            "every_nth step must be positive".to_string(),
        ));
    }
    Ok(input.iter().skip(offset).step_by(step).copied().collect())
}

/// Drop `front` bytes from the start and `back` bytes from the end
pub fn slice(input: &[u8], front: usize, back: usize) -> Result<Vec<u8>, TransformError> {
    if front.checked_add(back).map_or(true, |total| total > input.len()) {
        return Err(TransformError::InvalidArgument(format!(
            "cannot drop {}+{} bytes from input of length {}",
            front,
            back,
            input.len()
        )));
    }
    Ok(input[front..input.len() - back].to_vec())
}

/// One declarative step of a codec's transform chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    Reverse,
    UrlSafeBase64Decode,
    Base64Decode,
    HexPairDecode,
    ModShift { n: i16 },
    /// XOR with the codec's derived key, repeated
    XorRepeat,
    /// Feedback XOR with the codec's derived key
    XorFeedback,
    Rot13,
    CaesarShift { n: i8 },
    EveryNth { step: usize, offset: usize },
    Slice { front: usize, back: usize },
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Transform::Reverse => "reverse",
            Transform::UrlSafeBase64Decode => "url_safe_base64_decode",
            Transform::Base64Decode => "base64_decode",
            Transform::HexPairDecode => "hex_pair_decode",
            Transform::ModShift { .. } => "mod_shift",
            Transform::XorRepeat => "xor_repeat",
            Transform::XorFeedback => "xor_feedback",
            Transform::Rot13 => "rot13",
            Transform::CaesarShift { .. } => "caesar_shift",
            Transform::EveryNth { .. } => "every_nth",
            Transform::Slice { .. } => "slice",
        }
    }

    pub fn needs_key(&self) -> bool {
        matches!(self, Transform::XorRepeat | Transform::XorFeedback)
    }

    /// Run the decode direction of this step
    pub fn apply(&self, input: &[u8], key: &[u8]) -> Result<Vec<u8>, TransformError> {
        match self {
            Transform::Reverse => Ok(reverse(input)),
            Transform::UrlSafeBase64Decode => url_safe_base64_decode(input),
            Transform::Base64Decode => base64_decode(input),
            Transform::HexPairDecode => hex_pair_decode(input),
            Transform::ModShift { n } => Ok(mod_shift(input, *n)),
            Transform::XorRepeat => xor_repeat(input, key),
            Transform::XorFeedback => xor_feedback(input, key),
            Transform::Rot13 => Ok(rot13(input)),
            Transform::CaesarShift { n } => Ok(caesar_shift(input, *n)),
            Transform::EveryNth { step, offset } => every_nth(input, *step, *offset),
            Transform::Slice { front, back } => slice(input, *front, *back),
        }
    }

    /// Run the encode direction of this step
    pub fn invert(&self, input: &[u8], key: &[u8]) -> Result<Vec<u8>, TransformError> {
        match self {
            Transform::Reverse => Ok(reverse(input)),
            Transform::UrlSafeBase64Decode => Ok(url_safe_base64_encode(input)),
            Transform::Base64Decode => Ok(base64_encode(input)),
            Transform::HexPairDecode => Ok(hex_pair_encode(input)),
            Transform::ModShift { n } => Ok(mod_shift(input, -*n)),
            Transform::XorRepeat => xor_repeat(input, key),
            Transform::XorFeedback => xor_feedback_encode(input, key),
            Transform::Rot13 => Ok(rot13(input)),
            Transform::CaesarShift { n } => {
                let back = 26 - i16::from(*n).rem_euclid(26);
                Ok(caesar_shift(input, back as i8))
            }
            Transform::EveryNth { .. } => Err(TransformError::NotInvertible("every_nth")),
            Transform::Slice { .. } => Err(TransformError::NotInvertible("slice")),
        }
    }
}

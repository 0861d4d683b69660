//! Order-preserving encodings for numeric key components.
//!
//! For any two values `a, b` of the same kind, `encode(a) < encode(b)` under
//! unsigned lexicographic comparison iff `a < b` numerically. Every encoding
//! starts with a one-byte form discriminator so decoders can accept both the
//! fixed-width binary form (used in keys) and the legacy decimal form (used
//! by out-of-band tooling, never placed in keys or on the wire).

use byteorder::{BigEndian, ReadBytesExt};

/// Fixed-width big-endian binary form.
const FORM_FIXED: u8 = 0x01;
/// Legacy human-readable decimal form.
const FORM_DECIMAL: u8 = 0x02;

/// Sign byte of a negative decimal encoding. Must sort below [`SIGN_POS`].
const SIGN_NEG: u8 = b'-';
/// Sign byte of a non-negative decimal encoding.
const SIGN_POS: u8 = b'=';

/// An error raised while encoding or decoding a numeric value.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ElenError {
    /// NaN admits no position in a total order.
    #[error("cannot encode NaN")]
    Nan,
    /// The input was empty.
    #[error("empty encoded value")]
    Empty,
    /// Bytes remain past the decoded value.
    #[error("{0} trailing bytes after encoded value")]
    Trailing(usize),
    /// The input ended before the encoded width.
    #[error("input shorter than the encoded width")]
    Truncated,
    /// The form discriminator is unknown, or illegal for the requested kind.
    #[error("unknown encoding form {0:#04x}")]
    UnknownForm(u8),
    /// The decimal payload did not parse back to a number.
    #[error("malformed decimal payload")]
    Decimal,
}

macro_rules! unsigned_codec {
    ($encode:ident, $decode:ident, $ty:ty, $read:ident) => {
        /// Encodes into the fixed-width binary form.
        pub fn $encode(value: $ty) -> Vec<u8> {
            let mut out = Vec::with_capacity(1 + std::mem::size_of::<$ty>());
            out.push(FORM_FIXED);
            out.extend_from_slice(&value.to_be_bytes());
            out
        }

        /// Strictly decodes the fixed-width binary form.
        pub fn $decode(buf: &[u8]) -> Result<$ty, ElenError> {
            let mut rest = fixed_payload(buf)?;
            let value = rest.$read::<BigEndian>().map_err(|_| ElenError::Truncated)?;
            ensure_consumed(rest)?;
            Ok(value)
        }
    };
}

macro_rules! signed_codec {
    ($encode:ident, $decode:ident, $ty:ty, $unsigned:ty, $read:ident) => {
        /// Encodes into the fixed-width binary form. The flipped sign bit
        /// makes the big-endian bytes sort in numeric order.
        pub fn $encode(value: $ty) -> Vec<u8> {
            let mapped = (value as $unsigned) ^ (1 << (<$unsigned>::BITS - 1));
            let mut out = Vec::with_capacity(1 + std::mem::size_of::<$ty>());
            out.push(FORM_FIXED);
            out.extend_from_slice(&mapped.to_be_bytes());
            out
        }

        /// Strictly decodes the fixed-width binary form.
        pub fn $decode(buf: &[u8]) -> Result<$ty, ElenError> {
            let mut rest = fixed_payload(buf)?;
            let mapped = rest.$read::<BigEndian>().map_err(|_| ElenError::Truncated)?;
            ensure_consumed(rest)?;
            Ok((mapped ^ (1 << (<$unsigned>::BITS - 1))) as $ty)
        }
    };
}

unsigned_codec!(encode_u32, decode_u32, u32, read_u32);
unsigned_codec!(encode_u64, decode_u64, u64, read_u64);
signed_codec!(encode_i32, decode_i32, i32, u32, read_u32);
signed_codec!(encode_i64, decode_i64, i64, u64, read_u64);

/// Encodes an `f32` into the fixed-width binary form.
///
/// Negative values have every bit flipped and non-negative values only the
/// sign bit, which maps IEEE-754 order onto unsigned byte order for all
/// finite values and infinities. Signed zeros collapse to `+0.0`.
pub fn encode_f32(value: f32) -> Result<Vec<u8>, ElenError> {
    if value.is_nan() {
        return Err(ElenError::Nan);
    }
    let value = if value == 0.0 { 0.0 } else { value };
    let bits = value.to_bits();
    let mapped = if bits & (1 << 31) != 0 { !bits } else { bits | (1 << 31) };
    let mut out = Vec::with_capacity(5);
    out.push(FORM_FIXED);
    out.extend_from_slice(&mapped.to_be_bytes());
    Ok(out)
}

/// Decodes an `f32` from either form.
pub fn decode_f32(buf: &[u8]) -> Result<f32, ElenError> {
    match form(buf)? {
        FORM_DECIMAL => decode_decimal(buf).map(|v| v as f32),
        _ => {
            let mut rest = fixed_payload(buf)?;
            let mapped = rest.read_u32::<BigEndian>().map_err(|_| ElenError::Truncated)?;
            ensure_consumed(rest)?;
            let bits = if mapped & (1 << 31) != 0 { mapped & !(1 << 31) } else { !mapped };
            Ok(f32::from_bits(bits))
        }
    }
}

/// Encodes an `f64` into the fixed-width binary form. See [`encode_f32`].
pub fn encode_f64(value: f64) -> Result<Vec<u8>, ElenError> {
    if value.is_nan() {
        return Err(ElenError::Nan);
    }
    let value = if value == 0.0 { 0.0 } else { value };
    let bits = value.to_bits();
    let mapped = if bits & (1 << 63) != 0 { !bits } else { bits | (1 << 63) };
    let mut out = Vec::with_capacity(9);
    out.push(FORM_FIXED);
    out.extend_from_slice(&mapped.to_be_bytes());
    Ok(out)
}

/// Decodes an `f64` from either form.
pub fn decode_f64(buf: &[u8]) -> Result<f64, ElenError> {
    match form(buf)? {
        FORM_DECIMAL => decode_decimal(buf),
        _ => {
            let mut rest = fixed_payload(buf)?;
            let mapped = rest.read_u64::<BigEndian>().map_err(|_| ElenError::Truncated)?;
            ensure_consumed(rest)?;
            let bits = if mapped & (1 << 63) != 0 { mapped & !(1 << 63) } else { !mapped };
            Ok(f64::from_bits(bits))
        }
    }
}

/// Encodes the legacy decimal form: `[sign][int digits].[frac digits]` with
/// `precision` fractional digits. Negative digits are nine's-complemented so
/// negatives of equal integer width sort inversely.
pub fn encode_decimal(value: f64, precision: usize) -> Result<Vec<u8>, ElenError> {
    if value.is_nan() {
        return Err(ElenError::Nan);
    }
    if !value.is_finite() {
        return Err(ElenError::Decimal);
    }
    let value = if value == 0.0 { 0.0 } else { value };
    let negative = value < 0.0;
    let text = format!("{:.*}", precision, value.abs());
    let mut out = Vec::with_capacity(2 + text.len());
    out.push(FORM_DECIMAL);
    out.push(if negative { SIGN_NEG } else { SIGN_POS });
    for byte in text.bytes() {
        if negative && byte.is_ascii_digit() {
            out.push(b'9' - (byte - b'0'));
        } else {
            out.push(byte);
        }
    }
    Ok(out)
}

/// Decodes the legacy decimal form.
pub fn decode_decimal(buf: &[u8]) -> Result<f64, ElenError> {
    if form(buf)? != FORM_DECIMAL {
        return Err(ElenError::UnknownForm(buf[0]));
    }
    let payload = &buf[1..];
    if payload.is_empty() {
        return Err(ElenError::Truncated);
    }
    let negative = match payload[0] {
        SIGN_NEG => true,
        SIGN_POS => false,
        _ => return Err(ElenError::Decimal),
    };
    let digits: Vec<u8> = payload[1..]
        .iter()
        .map(|&byte| {
            if negative && byte.is_ascii_digit() {
                b'9' - (byte - b'0')
            } else {
                byte
            }
        })
        .collect();
    let text = String::from_utf8(digits).map_err(|_| ElenError::Decimal)?;
    let magnitude: f64 = text.parse().map_err(|_| ElenError::Decimal)?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn form(buf: &[u8]) -> Result<u8, ElenError> {
    match buf.first() {
        None => Err(ElenError::Empty),
        Some(&FORM_FIXED) | Some(&FORM_DECIMAL) => Ok(buf[0]),
        Some(&other) => Err(ElenError::UnknownForm(other)),
    }
}

fn fixed_payload(buf: &[u8]) -> Result<&[u8], ElenError> {
    match form(buf)? {
        FORM_FIXED => Ok(&buf[1..]),
        other => Err(ElenError::UnknownForm(other)),
    }
}

fn ensure_consumed(rest: &[u8]) -> Result<(), ElenError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(ElenError::Trailing(rest.len()))
    }
}

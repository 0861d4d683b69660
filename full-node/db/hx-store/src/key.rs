//! The key codec: joining a subject and a predicate into one ordered key
//! and splitting it back.
//!
//! Layout: `subject bytes || predicate bytes || subject_len:u32-be ||
//! predicate_len:u32-be || subject_kind:u8 || predicate_kind:u8`. The
//! length and kind fields sit at fixed positions at the *end* of the key,
//! so keys with identical subjects but different predicate kinds never
//! collide, and keys sort first by subject, then by predicate. Numeric
//! components are run through the order-preserving encoding before they
//! enter the key; the recorded lengths are the encoded lengths.

use std::borrow::Cow;

use bytes::Bytes;
use hx_interface::{Blob, BlobError, DataKind};

use crate::elen::{self, ElenError};

/// Fixed-width tail of every key: two lengths and two kind tags.
pub const KEY_SUFFIX_SIZE: usize = 4 + 4 + 1 + 1;

/// An error raised by key composition or splitting.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum KeyError {
    /// The key is shorter than the suffix, or the declared component
    /// lengths do not cover the prefix exactly.
    #[error("key of {0} bytes is too short for its declared layout")]
    TooShort(usize),
    /// A kind tag in the suffix is not a known [`DataKind`].
    #[error("unknown data kind tag {0}")]
    UnknownKind(u8),
    /// A numeric component failed to encode or decode.
    #[error(transparent)]
    Elen(#[from] ElenError),
    /// A component blob disagreed with its own kind tag.
    #[error(transparent)]
    Blob(#[from] BlobError),
}

/// Joins a subject and a predicate into a single ordered key.
pub fn compose(subject: &Blob, predicate: &Blob) -> Result<Vec<u8>, KeyError> {
    let subject_bytes = encode_component(subject)?;
    let predicate_bytes = encode_component(predicate)?;

    let mut key =
        Vec::with_capacity(subject_bytes.len() + predicate_bytes.len() + KEY_SUFFIX_SIZE);
    key.extend_from_slice(&subject_bytes);
    key.extend_from_slice(&predicate_bytes);
    key.extend_from_slice(&(subject_bytes.len() as u32).to_be_bytes());
    key.extend_from_slice(&(predicate_bytes.len() as u32).to_be_bytes());
    key.push(subject.kind().as_u8());
    key.push(predicate.kind().as_u8());
    Ok(key)
}

/// Splits a key back into its subject and predicate.
///
/// With `copy = false` byte-string components borrow from `key` (zero
/// copy); numeric components are always decoded into fresh owned blobs.
pub fn split(key: &Bytes, copy: bool) -> Result<(Blob, Blob), KeyError> {
    let total = key.len();
    if total < KEY_SUFFIX_SIZE {
        return Err(KeyError::TooShort(total));
    }
    let suffix = &key[total - KEY_SUFFIX_SIZE..];
    let subject_len = u32::from_be_bytes(suffix[0..4].try_into().expect("suffix width")) as usize;
    let predicate_len = u32::from_be_bytes(suffix[4..8].try_into().expect("suffix width")) as usize;
    let subject_kind = DataKind::from_u8(suffix[8]).ok_or(KeyError::UnknownKind(suffix[8]))?;
    let predicate_kind = DataKind::from_u8(suffix[9]).ok_or(KeyError::UnknownKind(suffix[9]))?;

    let prefix = total - KEY_SUFFIX_SIZE;
    if subject_len
        .checked_add(predicate_len)
        .map_or(true, |sum| sum != prefix)
    {
        return Err(KeyError::TooShort(total));
    }

    let subject = decode_component(key.slice(0..subject_len), subject_kind, copy)?;
    let predicate =
        decode_component(key.slice(subject_len..subject_len + predicate_len), predicate_kind, copy)?;
    Ok((subject, predicate))
}

fn encode_component(blob: &Blob) -> Result<Cow<'_, [u8]>, KeyError> {
    Ok(match blob.kind() {
        DataKind::ByteString | DataKind::Pointer => Cow::Borrowed(blob.as_bytes()),
        DataKind::I32 => Cow::Owned(elen::encode_i32(blob.as_i32()?)),
        DataKind::I64 => Cow::Owned(elen::encode_i64(blob.as_i64()?)),
        DataKind::U32 => Cow::Owned(elen::encode_u32(blob.as_u32()?)),
        DataKind::U64 => Cow::Owned(elen::encode_u64(blob.as_u64()?)),
        DataKind::F32 => Cow::Owned(elen::encode_f32(blob.as_f32()?)?),
        DataKind::F64 => Cow::Owned(elen::encode_f64(blob.as_f64()?)?),
    })
}

fn decode_component(bytes: Bytes, kind: DataKind, copy: bool) -> Result<Blob, KeyError> {
    Ok(match kind {
        DataKind::ByteString | DataKind::Pointer => {
            if copy {
                Blob::new(Bytes::copy_from_slice(&bytes), kind)
            } else {
                Blob::new(bytes, kind)
            }
        }
        DataKind::I32 => Blob::from_i32(elen::decode_i32(&bytes)?),
        DataKind::I64 => Blob::from_i64(elen::decode_i64(&bytes)?),
        DataKind::U32 => Blob::from_u32(elen::decode_u32(&bytes)?),
        DataKind::U64 => Blob::from_u64(elen::decode_u64(&bytes)?),
        DataKind::F32 => Blob::from_f32(elen::decode_f32(&bytes)?),
        DataKind::F64 => Blob::from_f64(elen::decode_f64(&bytes)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(subject: Blob, predicate: Blob) {
        let key = Bytes::from(compose(&subject, &predicate).unwrap());
        for copy in [false, true] {
            let (s, p) = split(&key, copy).unwrap();
            assert_eq!(s, subject);
            assert_eq!(p, predicate);
        }
    }

    #[test]
    fn byte_components_round_trip() {
        round_trip(Blob::from("alice"), Blob::from("age"));
    }

    #[test]
    fn numeric_components_round_trip() {
        round_trip(Blob::from_f64(-1.5), Blob::from("v"));
        round_trip(Blob::from_u32(30), Blob::from_i64(-7));
    }

    #[test]
    fn empty_subject_round_trips() {
        round_trip(Blob::empty(), Blob::from("p"));
        round_trip(Blob::empty(), Blob::empty());
    }

    #[test]
    fn same_subject_different_predicate_kind_never_collides() {
        // "a" + "1" as bytes vs "a" + u32-ish payloads must stay distinct.
        let k1 = compose(&Blob::from("a"), &Blob::from("1")).unwrap();
        let k2 = compose(&Blob::from("a"), &Blob::from_u32(b'1' as u32)).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn keys_sort_by_numeric_subject() {
        let lo = compose(&Blob::from_f64(-1.5), &Blob::from("v")).unwrap();
        let hi = compose(&Blob::from_f64(2.25), &Blob::from("v")).unwrap();
        assert!(lo < hi);
    }

    #[test]
    fn short_keys_are_rejected() {
        assert_eq!(split(&Bytes::from_static(b"tiny"), false), Err(KeyError::TooShort(4)));
    }

    #[test]
    fn overflowing_declared_lengths_are_rejected() {
        let mut key = compose(&Blob::from("s"), &Blob::from("p")).unwrap();
        let at = key.len() - KEY_SUFFIX_SIZE;
        key[at..at + 4].copy_from_slice(&u32::MAX.to_be_bytes());
        let total = key.len();
        assert_eq!(split(&Bytes::from(key), false), Err(KeyError::TooShort(total)));
    }
}

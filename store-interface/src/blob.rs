//! The blob / typed-value layer. A [`Blob`] is the atomic currency of the
//! pipeline: every subject, predicate, and object travels as one.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::Bytes;

/// The data kind tagged onto every [`Blob`].
///
/// The discriminant values are stable: they are written to the wire and into
/// stored values, so reordering the variants is a format break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataKind {
    /// An uninterpreted byte string.
    ByteString = 0,
    /// A 32-bit signed integer.
    I32 = 1,
    /// A 64-bit signed integer.
    I64 = 2,
    /// A 32-bit unsigned integer.
    U32 = 3,
    /// A 64-bit unsigned integer.
    U64 = 4,
    /// An IEEE-754 single-precision float.
    F32 = 5,
    /// An IEEE-754 double-precision float.
    F64 = 6,
    /// An opaque pointer. Process-local; never serialized.
    Pointer = 7,
}

impl DataKind {
    /// Decodes a kind from its stable `u8` tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => DataKind::ByteString,
            1 => DataKind::I32,
            2 => DataKind::I64,
            3 => DataKind::U32,
            4 => DataKind::U64,
            5 => DataKind::F32,
            6 => DataKind::F64,
            7 => DataKind::Pointer,
            _ => return None,
        })
    }

    /// The stable `u8` tag for this kind.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether values of this kind can be widened to `f64` (and therefore
    /// feed histograms).
    pub fn is_numeric(self) -> bool {
        !matches!(self, DataKind::ByteString | DataKind::Pointer)
    }

    /// The fixed payload width of this kind, or `None` for byte strings.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            DataKind::ByteString | DataKind::Pointer => None,
            DataKind::I32 | DataKind::U32 | DataKind::F32 => Some(4),
            DataKind::I64 | DataKind::U64 | DataKind::F64 => Some(8),
        }
    }
}

/// An error raised by [`Blob`] reinterpretation or deserialization.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    /// The blob carries a different kind than the accessor asked for.
    #[error("kind mismatch: expected {expected:?}, got {got:?}")]
    KindMismatch {
        /// The kind the caller asked for.
        expected: DataKind,
        /// The kind recorded on the blob.
        got: DataKind,
    },
    /// The payload length does not fit the kind's fixed width.
    #[error("payload of {got} bytes does not fit a {kind:?}")]
    Length {
        /// The kind whose width was violated.
        kind: DataKind,
        /// The actual payload length.
        got: usize,
    },
    /// The input ended before a full blob could be read.
    #[error("blob input truncated")]
    Truncated,
    /// The kind tag read from the input is not a known [`DataKind`].
    #[error("unknown data kind tag {0}")]
    UnknownKind(u8),
}

/// A kind-tagged byte range.
///
/// The payload is a [`Bytes`] handle, so "borrowed" blobs are zero-copy
/// slices of a shared buffer and cloning never copies the payload. Numeric
/// constructors record the value in little-endian byte order; the
/// order-preserving key encoding is applied later, at key-composition time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    data: Bytes,
    kind: DataKind,
}

macro_rules! numeric_ctor_accessor {
    ($ctor:ident, $accessor:ident, $ty:ty, $kind:expr) => {
        #[doc = concat!("Builds a `", stringify!($ty), "` blob.")]
        pub fn $ctor(value: $ty) -> Self {
            Blob {
                data: Bytes::copy_from_slice(&value.to_le_bytes()),
                kind: $kind,
            }
        }

        #[doc = concat!("Reinterprets the payload as a `", stringify!($ty), "`.")]
        pub fn $accessor(&self) -> Result<$ty, BlobError> {
            self.check_kind($kind)?;
            let bytes: [u8; std::mem::size_of::<$ty>()] =
                self.data.as_ref().try_into().map_err(|_| BlobError::Length {
                    kind: $kind,
                    got: self.data.len(),
                })?;
            Ok(<$ty>::from_le_bytes(bytes))
        }
    };
}

impl Blob {
    /// Wraps an existing buffer under the given kind without copying.
    pub fn new(data: Bytes, kind: DataKind) -> Self {
        Blob { data, kind }
    }

    /// Copies a slice into an owned byte-string blob.
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Blob {
            data: Bytes::copy_from_slice(data),
            kind: DataKind::ByteString,
        }
    }

    /// The empty byte-string blob. Legal as subject, predicate, and object.
    pub fn empty() -> Self {
        Blob {
            data: Bytes::new(),
            kind: DataKind::ByteString,
        }
    }

    numeric_ctor_accessor!(from_i32, as_i32, i32, DataKind::I32);
    numeric_ctor_accessor!(from_i64, as_i64, i64, DataKind::I64);
    numeric_ctor_accessor!(from_u32, as_u32, u32, DataKind::U32);
    numeric_ctor_accessor!(from_u64, as_u64, u64, DataKind::U64);
    numeric_ctor_accessor!(from_f32, as_f32, f32, DataKind::F32);
    numeric_ctor_accessor!(from_f64, as_f64, f64, DataKind::F64);

    /// The payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The underlying shared buffer handle.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The kind recorded on this blob.
    pub fn kind(&self) -> DataKind {
        self.kind
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Widens any numeric payload to `f64`.
    ///
    /// This is the conversion histograms observe values through. Fails with
    /// a kind mismatch for byte-string and pointer blobs.
    pub fn to_f64(&self) -> Result<f64, BlobError> {
        match self.kind {
            DataKind::I32 => Ok(self.as_i32()? as f64),
            DataKind::I64 => Ok(self.as_i64()? as f64),
            DataKind::U32 => Ok(self.as_u32()? as f64),
            DataKind::U64 => Ok(self.as_u64()? as f64),
            DataKind::F32 => Ok(self.as_f32()? as f64),
            DataKind::F64 => self.as_f64(),
            got => Err(BlobError::KindMismatch {
                expected: DataKind::F64,
                got,
            }),
        }
    }

    /// Serialized size of this blob: `kind:u8 | len:u64 | bytes`.
    pub fn packed_size(&self) -> usize {
        1 + 8 + self.data.len()
    }

    /// Appends the length-prefixed serialization to `out`.
    pub fn pack_into(&self, out: &mut Vec<u8>) {
        out.push(self.kind.as_u8());
        out.extend_from_slice(&(self.data.len() as u64).to_le_bytes());
        out.extend_from_slice(&self.data);
    }

    /// Reads one length-prefixed blob from the cursor, advancing it.
    pub fn unpack(cursor: &mut &[u8]) -> Result<Self, BlobError> {
        let tag = cursor.read_u8().map_err(|_| BlobError::Truncated)?;
        let kind = DataKind::from_u8(tag).ok_or(BlobError::UnknownKind(tag))?;
        let len = cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| BlobError::Truncated)?;
        let len = usize::try_from(len).map_err(|_| BlobError::Truncated)?;
        if cursor.len() < len {
            return Err(BlobError::Truncated);
        }
        let mut payload = vec![0u8; len];
        cursor
            .read_exact(&mut payload)
            .map_err(|_| BlobError::Truncated)?;
        Ok(Blob {
            data: Bytes::from(payload),
            kind,
        })
    }

    fn check_kind(&self, expected: DataKind) -> Result<(), BlobError> {
        if self.kind != expected {
            return Err(BlobError::KindMismatch {
                expected,
                got: self.kind,
            });
        }
        Ok(())
    }
}

impl From<&str> for Blob {
    fn from(value: &str) -> Self {
        Blob::copy_from_slice(value.as_bytes())
    }
}

impl From<String> for Blob {
    fn from(value: String) -> Self {
        Blob {
            data: Bytes::from(value.into_bytes()),
            kind: DataKind::ByteString,
        }
    }
}

impl From<Vec<u8>> for Blob {
    fn from(value: Vec<u8>) -> Self {
        Blob {
            data: Bytes::from(value),
            kind: DataKind::ByteString,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_round_trips() {
        assert_eq!(Blob::from_u32(30).as_u32().unwrap(), 30);
        assert_eq!(Blob::from_i64(-9).as_i64().unwrap(), -9);
        assert_eq!(Blob::from_f64(2.25).as_f64().unwrap(), 2.25);
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let blob = Blob::from_f64(3.14);
        assert_eq!(
            blob.as_u32(),
            Err(BlobError::KindMismatch {
                expected: DataKind::U32,
                got: DataKind::F64,
            })
        );
    }

    #[test]
    fn wrong_width_is_reported() {
        let blob = Blob::new(Bytes::from_static(&[1, 2, 3]), DataKind::U32);
        assert_eq!(
            blob.as_u32(),
            Err(BlobError::Length {
                kind: DataKind::U32,
                got: 3,
            })
        );
    }

    #[test]
    fn pack_unpack_round_trips() {
        let blob = Blob::from("hello");
        let mut buf = Vec::new();
        blob.pack_into(&mut buf);
        assert_eq!(buf.len(), blob.packed_size());

        let mut cursor = buf.as_slice();
        let decoded = Blob::unpack(&mut cursor).unwrap();
        assert_eq!(decoded, blob);
        assert!(cursor.is_empty());
    }

    #[test]
    fn empty_blob_is_legal() {
        let blob = Blob::empty();
        let mut buf = Vec::new();
        blob.pack_into(&mut buf);
        let decoded = Blob::unpack(&mut buf.as_slice()).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.kind(), DataKind::ByteString);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let blob = Blob::from("payload");
        let mut buf = Vec::new();
        blob.pack_into(&mut buf);
        buf.truncate(buf.len() - 1);
        assert_eq!(Blob::unpack(&mut buf.as_slice()), Err(BlobError::Truncated));
    }
}

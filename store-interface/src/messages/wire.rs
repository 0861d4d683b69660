//! The wire format: a packer and a strict unpacker for bulk messages.
//!
//! All multibyte integers are little-endian; lengths are unsigned 64-bit.
//! The header is `direction:u8 | op:u8 | src_rank:i32 | dst_rank:i32 |
//! count:u64`, followed by `count` op-specific items. [`pack`] produces a
//! buffer of exactly [`size`] bytes, and `unpack(pack(m))` reproduces `m`
//! structurally.

use byteorder::{LittleEndian, ReadBytesExt};

use crate::blob::{Blob, BlobError, DataKind};
use crate::histogram::HistogramSnapshot;
use crate::messages::{
    BDeleteRequest, BDeleteResponse, BGetOpRequest, BGetOpResponse, BGetRequest, BGetResponse,
    BHistogramRequest, BHistogramResponse, BPutRequest, BPutResponse, GetOpRecord, Message,
    Request, RequestBody, Response, ResponseBody,
};
use crate::ops::{Comparator, Operation, Status};

const DIRECTION_REQUEST: u8 = 0;
const DIRECTION_RESPONSE: u8 = 1;

const HEADER_SIZE: usize = 1 + 1 + 4 + 4 + 8;

/// Pre-allocation cap so a corrupt count cannot reserve unbounded memory.
const CAPACITY_HINT_MAX: u64 = 1024;

/// An error raised while decoding a wire buffer.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum WireError {
    /// The buffer ended before the declared item count was read.
    #[error("message truncated")]
    Truncated,
    /// The op tag is unknown, or names an op that never travels in bulk.
    #[error("unknown or non-bulk opcode {0}")]
    Opcode(u8),
    /// The direction tag is neither request nor response.
    #[error("unknown direction tag {0}")]
    Direction(u8),
    /// A kind tag is not a known [`DataKind`].
    #[error("unknown data kind tag {0}")]
    Kind(u8),
    /// A comparator tag is not a known [`Comparator`].
    #[error("unknown comparator tag {0}")]
    UnknownComparator(u8),
    /// A status tag is not a known [`Status`].
    #[error("unknown status tag {0}")]
    UnknownStatus(u8),
    /// Bytes remain after the declared item count was fully read.
    #[error("{0} trailing bytes after message body")]
    Trailing(usize),
    /// A histogram name is not valid UTF-8.
    #[error("histogram name is not valid utf-8")]
    Name(#[from] std::string::FromUtf8Error),
}

impl From<BlobError> for WireError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::UnknownKind(tag) => WireError::Kind(tag),
            _ => WireError::Truncated,
        }
    }
}

/// Exact packed size of a message, computable before serialization.
pub fn size(msg: &Message) -> usize {
    let body = match msg {
        Message::Request(req) => request_body_size(&req.body),
        Message::Response(resp) => response_body_size(&resp.body),
    };
    HEADER_SIZE + body
}

fn request_body_size(body: &RequestBody) -> usize {
    // Every request item leads with `datastore_id:u32 | original_index:u64`.
    const ITEM_PREFIX: usize = 4 + 8;
    match body {
        RequestBody::Put(b) => (0..b.count())
            .map(|i| {
                ITEM_PREFIX
                    + b.subjects[i].packed_size()
                    + b.predicates[i].packed_size()
                    + b.objects[i].packed_size()
            })
            .sum(),
        RequestBody::Get(b) => (0..b.count())
            .map(|i| ITEM_PREFIX + b.subjects[i].packed_size() + b.predicates[i].packed_size() + 1)
            .sum(),
        RequestBody::GetOp(b) => (0..b.count())
            .map(|i| {
                ITEM_PREFIX
                    + b.subjects[i].packed_size()
                    + b.predicates[i].packed_size()
                    + 1 // object kind
                    + 1 // comparator
                    + 8 // record limit
            })
            .sum(),
        RequestBody::Delete(b) => (0..b.count())
            .map(|i| ITEM_PREFIX + b.subjects[i].packed_size() + b.predicates[i].packed_size())
            .sum(),
        RequestBody::Histogram(b) => (0..b.count()).map(|i| ITEM_PREFIX + 8 + b.names[i].len()).sum(),
    }
}

fn response_body_size(body: &ResponseBody) -> usize {
    // Every response item leads with
    // `datastore_id:u32 | original_index:u64 | status:u8`.
    const ITEM_PREFIX: usize = 4 + 8 + 1;
    match body {
        ResponseBody::Put(b) => (0..b.count())
            .map(|i| ITEM_PREFIX + b.subjects[i].packed_size() + b.predicates[i].packed_size())
            .sum(),
        ResponseBody::Get(b) => (0..b.count())
            .map(|i| {
                ITEM_PREFIX
                    + b.subjects[i].packed_size()
                    + b.predicates[i].packed_size()
                    + b.objects[i].packed_size()
            })
            .sum(),
        ResponseBody::GetOp(b) => (0..b.count())
            .map(|i| {
                ITEM_PREFIX
                    + b.subjects[i].packed_size()
                    + b.predicates[i].packed_size()
                    + 8
                    + b.records[i]
                        .iter()
                        .map(|r| {
                            r.subject.packed_size()
                                + r.predicate.packed_size()
                                + r.object.packed_size()
                        })
                        .sum::<usize>()
            })
            .sum(),
        ResponseBody::Delete(b) => (0..b.count())
            .map(|i| ITEM_PREFIX + b.subjects[i].packed_size() + b.predicates[i].packed_size())
            .sum(),
        ResponseBody::Histogram(b) => (0..b.count())
            .map(|i| ITEM_PREFIX + 8 + b.names[i].len() + 8 + 16 * b.histograms[i].buckets.len())
            .sum(),
    }
}

/// Serializes a message into a buffer of exactly [`size`] bytes.
pub fn pack(msg: &Message) -> Vec<u8> {
    let total = size(msg);
    let mut out = Vec::with_capacity(total);
    match msg {
        Message::Request(req) => {
            write_header(
                &mut out,
                DIRECTION_REQUEST,
                req.body.op(),
                req.src_rank,
                req.dst_rank,
                req.body.count() as u64,
            );
            pack_request_body(&mut out, &req.body);
        }
        Message::Response(resp) => {
            write_header(
                &mut out,
                DIRECTION_RESPONSE,
                resp.body.op(),
                resp.src_rank,
                resp.dst_rank,
                resp.body.count() as u64,
            );
            pack_response_body(&mut out, &resp.body);
        }
    }
    debug_assert_eq!(out.len(), total);
    out
}

fn write_header(out: &mut Vec<u8>, direction: u8, op: Operation, src_rank: i32, dst_rank: i32, count: u64) {
    out.push(direction);
    out.push(op.as_u8());
    out.extend_from_slice(&src_rank.to_le_bytes());
    out.extend_from_slice(&dst_rank.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
}

fn write_request_prefix(out: &mut Vec<u8>, datastore_id: u32, index: u64) {
    out.extend_from_slice(&datastore_id.to_le_bytes());
    out.extend_from_slice(&index.to_le_bytes());
}

fn write_response_prefix(out: &mut Vec<u8>, datastore_id: u32, index: u64, status: Status) {
    out.extend_from_slice(&datastore_id.to_le_bytes());
    out.extend_from_slice(&index.to_le_bytes());
    out.push(status.as_u8());
}

fn pack_request_body(out: &mut Vec<u8>, body: &RequestBody) {
    match body {
        RequestBody::Put(b) => {
            for i in 0..b.count() {
                write_request_prefix(out, b.datastore_ids[i], b.original_indexes[i]);
                b.subjects[i].pack_into(out);
                b.predicates[i].pack_into(out);
                b.objects[i].pack_into(out);
            }
        }
        RequestBody::Get(b) => {
            for i in 0..b.count() {
                write_request_prefix(out, b.datastore_ids[i], b.original_indexes[i]);
                b.subjects[i].pack_into(out);
                b.predicates[i].pack_into(out);
                out.push(b.object_kinds[i].as_u8());
            }
        }
        RequestBody::GetOp(b) => {
            for i in 0..b.count() {
                write_request_prefix(out, b.datastore_ids[i], b.original_indexes[i]);
                b.subjects[i].pack_into(out);
                b.predicates[i].pack_into(out);
                out.push(b.object_kinds[i].as_u8());
                out.push(b.comparators[i].as_u8());
                out.extend_from_slice(&b.num_records[i].to_le_bytes());
            }
        }
        RequestBody::Delete(b) => {
            for i in 0..b.count() {
                write_request_prefix(out, b.datastore_ids[i], b.original_indexes[i]);
                b.subjects[i].pack_into(out);
                b.predicates[i].pack_into(out);
            }
        }
        RequestBody::Histogram(b) => {
            for i in 0..b.count() {
                write_request_prefix(out, b.datastore_ids[i], b.original_indexes[i]);
                write_name(out, &b.names[i]);
            }
        }
    }
}

fn pack_response_body(out: &mut Vec<u8>, body: &ResponseBody) {
    match body {
        ResponseBody::Put(b) => {
            for i in 0..b.count() {
                write_response_prefix(out, b.datastore_ids[i], b.original_indexes[i], b.statuses[i]);
                b.subjects[i].pack_into(out);
                b.predicates[i].pack_into(out);
            }
        }
        ResponseBody::Get(b) => {
            for i in 0..b.count() {
                write_response_prefix(out, b.datastore_ids[i], b.original_indexes[i], b.statuses[i]);
                b.subjects[i].pack_into(out);
                b.predicates[i].pack_into(out);
                b.objects[i].pack_into(out);
            }
        }
        ResponseBody::GetOp(b) => {
            for i in 0..b.count() {
                write_response_prefix(out, b.datastore_ids[i], b.original_indexes[i], b.statuses[i]);
                b.subjects[i].pack_into(out);
                b.predicates[i].pack_into(out);
                out.extend_from_slice(&(b.records[i].len() as u64).to_le_bytes());
                for record in &b.records[i] {
                    record.subject.pack_into(out);
                    record.predicate.pack_into(out);
                    record.object.pack_into(out);
                }
            }
        }
        ResponseBody::Delete(b) => {
            for i in 0..b.count() {
                write_response_prefix(out, b.datastore_ids[i], b.original_indexes[i], b.statuses[i]);
                b.subjects[i].pack_into(out);
                b.predicates[i].pack_into(out);
            }
        }
        ResponseBody::Histogram(b) => {
            for i in 0..b.count() {
                write_response_prefix(out, b.datastore_ids[i], b.original_indexes[i], b.statuses[i]);
                write_name(out, &b.names[i]);
                let hist = &b.histograms[i];
                out.extend_from_slice(&(hist.buckets.len() as u64).to_le_bytes());
                for (bucket, count) in hist.buckets.iter().zip(&hist.counts) {
                    out.extend_from_slice(&bucket.to_bits().to_le_bytes());
                    out.extend_from_slice(&count.to_le_bytes());
                }
            }
        }
    }
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    out.extend_from_slice(&(name.len() as u64).to_le_bytes());
    out.extend_from_slice(name.as_bytes());
}

/// Deserializes a message, failing on truncation, unknown tags, and
/// trailing bytes.
pub fn unpack(bytes: &[u8]) -> Result<Message, WireError> {
    let mut cursor = bytes;
    let direction = read_u8(&mut cursor)?;
    let op_tag = read_u8(&mut cursor)?;
    let src_rank = read_i32(&mut cursor)?;
    let dst_rank = read_i32(&mut cursor)?;
    let count = read_u64(&mut cursor)?;

    let op = match Operation::from_u8(op_tag) {
        Some(op) if op != Operation::Sync => op,
        _ => return Err(WireError::Opcode(op_tag)),
    };

    let msg = match direction {
        DIRECTION_REQUEST => {
            let body = unpack_request_body(&mut cursor, op, count)?;
            Message::Request(Request {
                src_rank,
                dst_rank,
                body,
            })
        }
        DIRECTION_RESPONSE => {
            let body = unpack_response_body(&mut cursor, op, count)?;
            Message::Response(Response {
                src_rank,
                dst_rank,
                body,
            })
        }
        other => return Err(WireError::Direction(other)),
    };

    if !cursor.is_empty() {
        return Err(WireError::Trailing(cursor.len()));
    }
    Ok(msg)
}

fn unpack_request_body(cursor: &mut &[u8], op: Operation, count: u64) -> Result<RequestBody, WireError> {
    let hint = count.min(CAPACITY_HINT_MAX) as usize;
    Ok(match op {
        Operation::Put => {
            let mut body = BPutRequest::with_capacity(hint);
            for _ in 0..count {
                let (ds, index) = read_request_prefix(cursor)?;
                let subject = Blob::unpack(cursor)?;
                let predicate = Blob::unpack(cursor)?;
                let object = Blob::unpack(cursor)?;
                body.add(ds, index, subject, predicate, object);
            }
            RequestBody::Put(body)
        }
        Operation::Get => {
            let mut body = BGetRequest::with_capacity(hint);
            for _ in 0..count {
                let (ds, index) = read_request_prefix(cursor)?;
                let subject = Blob::unpack(cursor)?;
                let predicate = Blob::unpack(cursor)?;
                let object_kind = read_kind(cursor)?;
                body.add(ds, index, subject, predicate, object_kind);
            }
            RequestBody::Get(body)
        }
        Operation::GetOp => {
            let mut body = BGetOpRequest::with_capacity(hint);
            for _ in 0..count {
                let (ds, index) = read_request_prefix(cursor)?;
                let subject = Blob::unpack(cursor)?;
                let predicate = Blob::unpack(cursor)?;
                let object_kind = read_kind(cursor)?;
                let cmp_tag = read_u8(cursor)?;
                let comparator =
                    Comparator::from_u8(cmp_tag).ok_or(WireError::UnknownComparator(cmp_tag))?;
                let num_records = read_u64(cursor)?;
                body.add(ds, index, subject, predicate, object_kind, comparator, num_records);
            }
            RequestBody::GetOp(body)
        }
        Operation::Delete => {
            let mut body = BDeleteRequest::with_capacity(hint);
            for _ in 0..count {
                let (ds, index) = read_request_prefix(cursor)?;
                let subject = Blob::unpack(cursor)?;
                let predicate = Blob::unpack(cursor)?;
                body.add(ds, index, subject, predicate);
            }
            RequestBody::Delete(body)
        }
        Operation::Histogram => {
            let mut body = BHistogramRequest::with_capacity(hint);
            for _ in 0..count {
                let (ds, index) = read_request_prefix(cursor)?;
                let name = read_name(cursor)?;
                body.add(ds, index, name);
            }
            RequestBody::Histogram(body)
        }
        Operation::Sync => unreachable!("rejected before body decoding"),
    })
}

fn unpack_response_body(cursor: &mut &[u8], op: Operation, count: u64) -> Result<ResponseBody, WireError> {
    let hint = count.min(CAPACITY_HINT_MAX) as usize;
    Ok(match op {
        Operation::Put => {
            let mut body = BPutResponse::with_capacity(hint);
            for _ in 0..count {
                let (ds, index, status) = read_response_prefix(cursor)?;
                let subject = Blob::unpack(cursor)?;
                let predicate = Blob::unpack(cursor)?;
                body.add(ds, index, status, subject, predicate);
            }
            ResponseBody::Put(body)
        }
        Operation::Get => {
            let mut body = BGetResponse::with_capacity(hint);
            for _ in 0..count {
                let (ds, index, status) = read_response_prefix(cursor)?;
                let subject = Blob::unpack(cursor)?;
                let predicate = Blob::unpack(cursor)?;
                let object = Blob::unpack(cursor)?;
                body.add(ds, index, status, subject, predicate, object);
            }
            ResponseBody::Get(body)
        }
        Operation::GetOp => {
            let mut body = BGetOpResponse::with_capacity(hint);
            for _ in 0..count {
                let (ds, index, status) = read_response_prefix(cursor)?;
                let subject = Blob::unpack(cursor)?;
                let predicate = Blob::unpack(cursor)?;
                let n_records = read_u64(cursor)?;
                let mut records = Vec::with_capacity(n_records.min(CAPACITY_HINT_MAX) as usize);
                for _ in 0..n_records {
                    records.push(GetOpRecord {
                        subject: Blob::unpack(cursor)?,
                        predicate: Blob::unpack(cursor)?,
                        object: Blob::unpack(cursor)?,
                    });
                }
                body.add(ds, index, status, subject, predicate, records);
            }
            ResponseBody::GetOp(body)
        }
        Operation::Delete => {
            let mut body = BDeleteResponse::with_capacity(hint);
            for _ in 0..count {
                let (ds, index, status) = read_response_prefix(cursor)?;
                let subject = Blob::unpack(cursor)?;
                let predicate = Blob::unpack(cursor)?;
                body.add(ds, index, status, subject, predicate);
            }
            ResponseBody::Delete(body)
        }
        Operation::Histogram => {
            let mut body = BHistogramResponse::with_capacity(hint);
            for _ in 0..count {
                let (ds, index, status) = read_response_prefix(cursor)?;
                let name = read_name(cursor)?;
                let n_buckets = read_u64(cursor)?;
                let hint = n_buckets.min(CAPACITY_HINT_MAX) as usize;
                let mut snapshot = HistogramSnapshot {
                    buckets: Vec::with_capacity(hint),
                    counts: Vec::with_capacity(hint),
                };
                for _ in 0..n_buckets {
                    snapshot.buckets.push(f64::from_bits(read_u64(cursor)?));
                    snapshot.counts.push(read_u64(cursor)?);
                }
                body.add(ds, index, status, name, snapshot);
            }
            ResponseBody::Histogram(body)
        }
        Operation::Sync => unreachable!("rejected before body decoding"),
    })
}

fn read_request_prefix(cursor: &mut &[u8]) -> Result<(u32, u64), WireError> {
    Ok((read_u32(cursor)?, read_u64(cursor)?))
}

fn read_response_prefix(cursor: &mut &[u8]) -> Result<(u32, u64, Status), WireError> {
    let ds = read_u32(cursor)?;
    let index = read_u64(cursor)?;
    let tag = read_u8(cursor)?;
    let status = Status::from_u8(tag).ok_or(WireError::UnknownStatus(tag))?;
    Ok((ds, index, status))
}

fn read_name(cursor: &mut &[u8]) -> Result<String, WireError> {
    let len = read_u64(cursor)?;
    let len = usize::try_from(len).map_err(|_| WireError::Truncated)?;
    if cursor.len() < len {
        return Err(WireError::Truncated);
    }
    let (name, rest) = cursor.split_at(len);
    let name = String::from_utf8(name.to_vec())?;
    *cursor = rest;
    Ok(name)
}

fn read_kind(cursor: &mut &[u8]) -> Result<DataKind, WireError> {
    let tag = read_u8(cursor)?;
    DataKind::from_u8(tag).ok_or(WireError::Kind(tag))
}

fn read_u8(cursor: &mut &[u8]) -> Result<u8, WireError> {
    cursor.read_u8().map_err(|_| WireError::Truncated)
}

fn read_u32(cursor: &mut &[u8]) -> Result<u32, WireError> {
    cursor.read_u32::<LittleEndian>().map_err(|_| WireError::Truncated)
}

fn read_i32(cursor: &mut &[u8]) -> Result<i32, WireError> {
    cursor.read_i32::<LittleEndian>().map_err(|_| WireError::Truncated)
}

fn read_u64(cursor: &mut &[u8]) -> Result<u64, WireError> {
    cursor.read_u64::<LittleEndian>().map_err(|_| WireError::Truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Blob;

    fn sample_put_request() -> Message {
        let mut body = BPutRequest::with_capacity(2);
        body.add(3, 0, Blob::from("s1"), Blob::from("p1"), Blob::from_f64(3.14));
        body.add(3, 1, Blob::from("s2"), Blob::from("p2"), Blob::from("hello"));
        Message::Request(Request {
            src_rank: 0,
            dst_rank: 1,
            body: RequestBody::Put(body),
        })
    }

    #[test]
    fn put_request_round_trips() {
        let msg = sample_put_request();
        let packed = pack(&msg);
        assert_eq!(packed.len(), size(&msg));
        assert_eq!(unpack(&packed).unwrap(), msg);
    }

    #[test]
    fn unpacked_kinds_survive() {
        let packed = pack(&sample_put_request());
        let Message::Request(req) = unpack(&packed).unwrap() else {
            panic!("direction flipped in transit");
        };
        let RequestBody::Put(body) = req.body else {
            panic!("op flipped in transit");
        };
        assert_eq!(body.objects[0].as_f64().unwrap(), 3.14);
        assert_eq!(body.objects[1].as_bytes(), b"hello");
        // Reinterpreting the f64 item as u32 is a kind mismatch.
        assert!(matches!(
            body.objects[0].as_u32(),
            Err(crate::blob::BlobError::KindMismatch { .. })
        ));
    }

    #[test]
    fn empty_bulk_round_trips() {
        let msg = Message::Request(Request {
            src_rank: 2,
            dst_rank: 5,
            body: RequestBody::Delete(BDeleteRequest::default()),
        });
        let packed = pack(&msg);
        assert_eq!(packed.len(), HEADER_SIZE);
        assert_eq!(unpack(&packed).unwrap(), msg);
    }

    #[test]
    fn getop_response_round_trips() {
        let mut body = BGetOpResponse::with_capacity(1);
        body.add(
            0,
            7,
            Status::Ok,
            Blob::from_f64(-1.5),
            Blob::from("v"),
            vec![
                GetOpRecord {
                    subject: Blob::from_f64(-1.5),
                    predicate: Blob::from("v"),
                    object: Blob::from_u32(1),
                },
                GetOpRecord {
                    subject: Blob::from_f64(2.25),
                    predicate: Blob::from("v"),
                    object: Blob::from_u32(2),
                },
            ],
        );
        let msg = Message::Response(Response {
            src_rank: 1,
            dst_rank: 0,
            body: ResponseBody::GetOp(body),
        });
        let packed = pack(&msg);
        assert_eq!(packed.len(), size(&msg));
        assert_eq!(unpack(&packed).unwrap(), msg);
    }

    #[test]
    fn histogram_response_round_trips() {
        let mut body = BHistogramResponse::with_capacity(1);
        body.add(
            2,
            0,
            Status::Ok,
            "latency".to_string(),
            HistogramSnapshot {
                buckets: vec![0.0, 25.0, 50.0, 75.0],
                counts: vec![1, 1, 1, 1],
            },
        );
        let msg = Message::Response(Response {
            src_rank: 0,
            dst_rank: 0,
            body: ResponseBody::Histogram(body),
        });
        let packed = pack(&msg);
        assert_eq!(packed.len(), size(&msg));
        assert_eq!(unpack(&packed).unwrap(), msg);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let packed = pack(&sample_put_request());
        for cut in [0, 1, HEADER_SIZE, packed.len() - 1] {
            assert_eq!(unpack(&packed[..cut]), Err(WireError::Truncated));
        }
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let mut packed = pack(&sample_put_request());
        packed[1] = 0xAA;
        assert_eq!(unpack(&packed), Err(WireError::Opcode(0xAA)));
        // SYNC is a known operation but never a bulk message.
        packed[1] = Operation::Sync.as_u8();
        assert_eq!(unpack(&packed), Err(WireError::Opcode(Operation::Sync.as_u8())));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut packed = pack(&sample_put_request());
        packed.push(0);
        assert_eq!(unpack(&packed), Err(WireError::Trailing(1)));
    }
}

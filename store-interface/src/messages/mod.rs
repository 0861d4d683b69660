//! Homogeneous bulk request/response records.
//!
//! The deep `Message -> Request/Response -> Bulk<op>` hierarchy of classic
//! triple stores collapses here into a tagged union: a [`Message`] is either
//! a [`Request`] or a [`Response`], and each carries one op-specific body of
//! parallel column vectors. Every column has length `count()`; `Vec` growth
//! covers the `count <= capacity` invariant.
//!
//! Response items carry the `(original_index, datastore_id)` pair that
//! correlates them back to the enqueue call, and echo the subject and
//! predicate blobs of the request item they answer.

pub mod wire;

use crate::blob::{Blob, DataKind};
use crate::histogram::HistogramSnapshot;
use crate::ops::{Comparator, Operation, Status};

/// A bulk message travelling between ranks.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Client-to-server.
    Request(Request),
    /// Server-to-client.
    Response(Response),
}

/// A bulk request addressed to one destination rank.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Rank of the issuing process.
    pub src_rank: i32,
    /// Rank hosting every datastore named by the items.
    pub dst_rank: i32,
    /// The op-specific columns.
    pub body: RequestBody,
}

/// The op-specific columns of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Bulk PUT.
    Put(BPutRequest),
    /// Bulk GET.
    Get(BGetRequest),
    /// Bulk GETOP.
    GetOp(BGetOpRequest),
    /// Bulk DELETE.
    Delete(BDeleteRequest),
    /// Bulk HISTOGRAM.
    Histogram(BHistogramRequest),
}

impl RequestBody {
    /// The operation this body carries.
    pub fn op(&self) -> Operation {
        match self {
            RequestBody::Put(_) => Operation::Put,
            RequestBody::Get(_) => Operation::Get,
            RequestBody::GetOp(_) => Operation::GetOp,
            RequestBody::Delete(_) => Operation::Delete,
            RequestBody::Histogram(_) => Operation::Histogram,
        }
    }

    /// Number of valid items.
    pub fn count(&self) -> usize {
        match self {
            RequestBody::Put(b) => b.count(),
            RequestBody::Get(b) => b.count(),
            RequestBody::GetOp(b) => b.count(),
            RequestBody::Delete(b) => b.count(),
            RequestBody::Histogram(b) => b.count(),
        }
    }
}

/// Columns of a bulk PUT request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BPutRequest {
    /// Destination datastore id per item.
    pub datastore_ids: Vec<u32>,
    /// Caller-supplied index per item.
    pub original_indexes: Vec<u64>,
    /// Subject per item.
    pub subjects: Vec<Blob>,
    /// Predicate per item.
    pub predicates: Vec<Blob>,
    /// Object per item.
    pub objects: Vec<Blob>,
}

impl BPutRequest {
    /// An empty body with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        BPutRequest {
            datastore_ids: Vec::with_capacity(capacity),
            original_indexes: Vec::with_capacity(capacity),
            subjects: Vec::with_capacity(capacity),
            predicates: Vec::with_capacity(capacity),
            objects: Vec::with_capacity(capacity),
        }
    }

    /// Appends one item.
    pub fn add(&mut self, datastore_id: u32, index: u64, subject: Blob, predicate: Blob, object: Blob) {
        self.datastore_ids.push(datastore_id);
        self.original_indexes.push(index);
        self.subjects.push(subject);
        self.predicates.push(predicate);
        self.objects.push(object);
    }

    /// Number of valid items.
    pub fn count(&self) -> usize {
        self.subjects.len()
    }
}

/// Columns of a bulk GET request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BGetRequest {
    /// Destination datastore id per item.
    pub datastore_ids: Vec<u32>,
    /// Caller-supplied index per item.
    pub original_indexes: Vec<u64>,
    /// Subject per item.
    pub subjects: Vec<Blob>,
    /// Predicate per item.
    pub predicates: Vec<Blob>,
    /// Kind the caller expects the stored object to carry.
    pub object_kinds: Vec<DataKind>,
}

impl BGetRequest {
    /// An empty body with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        BGetRequest {
            datastore_ids: Vec::with_capacity(capacity),
            original_indexes: Vec::with_capacity(capacity),
            subjects: Vec::with_capacity(capacity),
            predicates: Vec::with_capacity(capacity),
            object_kinds: Vec::with_capacity(capacity),
        }
    }

    /// Appends one item.
    pub fn add(&mut self, datastore_id: u32, index: u64, subject: Blob, predicate: Blob, object_kind: DataKind) {
        self.datastore_ids.push(datastore_id);
        self.original_indexes.push(index);
        self.subjects.push(subject);
        self.predicates.push(predicate);
        self.object_kinds.push(object_kind);
    }

    /// Number of valid items.
    pub fn count(&self) -> usize {
        self.subjects.len()
    }
}

/// Columns of a bulk GETOP request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BGetOpRequest {
    /// Destination datastore id per item.
    pub datastore_ids: Vec<u32>,
    /// Caller-supplied index per item.
    pub original_indexes: Vec<u64>,
    /// Seek subject per item.
    pub subjects: Vec<Blob>,
    /// Seek predicate per item.
    pub predicates: Vec<Blob>,
    /// Kind the caller expects streamed objects to carry.
    pub object_kinds: Vec<DataKind>,
    /// Comparison predicate per item.
    pub comparators: Vec<Comparator>,
    /// Record limit per item.
    pub num_records: Vec<u64>,
}

impl BGetOpRequest {
    /// An empty body with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        BGetOpRequest {
            datastore_ids: Vec::with_capacity(capacity),
            original_indexes: Vec::with_capacity(capacity),
            subjects: Vec::with_capacity(capacity),
            predicates: Vec::with_capacity(capacity),
            object_kinds: Vec::with_capacity(capacity),
            comparators: Vec::with_capacity(capacity),
            num_records: Vec::with_capacity(capacity),
        }
    }

    /// Appends one item.
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        datastore_id: u32,
        index: u64,
        subject: Blob,
        predicate: Blob,
        object_kind: DataKind,
        comparator: Comparator,
        num_records: u64,
    ) {
        self.datastore_ids.push(datastore_id);
        self.original_indexes.push(index);
        self.subjects.push(subject);
        self.predicates.push(predicate);
        self.object_kinds.push(object_kind);
        self.comparators.push(comparator);
        self.num_records.push(num_records);
    }

    /// Number of valid items.
    pub fn count(&self) -> usize {
        self.subjects.len()
    }
}

/// Columns of a bulk DELETE request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BDeleteRequest {
    /// Destination datastore id per item.
    pub datastore_ids: Vec<u32>,
    /// Caller-supplied index per item.
    pub original_indexes: Vec<u64>,
    /// Subject per item.
    pub subjects: Vec<Blob>,
    /// Predicate per item.
    pub predicates: Vec<Blob>,
}

impl BDeleteRequest {
    /// An empty body with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        BDeleteRequest {
            datastore_ids: Vec::with_capacity(capacity),
            original_indexes: Vec::with_capacity(capacity),
            subjects: Vec::with_capacity(capacity),
            predicates: Vec::with_capacity(capacity),
        }
    }

    /// Appends one item.
    pub fn add(&mut self, datastore_id: u32, index: u64, subject: Blob, predicate: Blob) {
        self.datastore_ids.push(datastore_id);
        self.original_indexes.push(index);
        self.subjects.push(subject);
        self.predicates.push(predicate);
    }

    /// Number of valid items.
    pub fn count(&self) -> usize {
        self.subjects.len()
    }
}

/// Columns of a bulk HISTOGRAM request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BHistogramRequest {
    /// Destination datastore id per item.
    pub datastore_ids: Vec<u32>,
    /// Caller-supplied index per item.
    pub original_indexes: Vec<u64>,
    /// Histogram name per item.
    pub names: Vec<String>,
}

impl BHistogramRequest {
    /// An empty body with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        BHistogramRequest {
            datastore_ids: Vec::with_capacity(capacity),
            original_indexes: Vec::with_capacity(capacity),
            names: Vec::with_capacity(capacity),
        }
    }

    /// Appends one item.
    pub fn add(&mut self, datastore_id: u32, index: u64, name: String) {
        self.datastore_ids.push(datastore_id);
        self.original_indexes.push(index);
        self.names.push(name);
    }

    /// Number of valid items.
    pub fn count(&self) -> usize {
        self.names.len()
    }
}

/// A bulk response addressed back to the issuing rank.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Rank of the responding process.
    pub src_rank: i32,
    /// Rank that issued the request.
    pub dst_rank: i32,
    /// The op-specific columns.
    pub body: ResponseBody,
}

/// The op-specific columns of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Bulk PUT outcome.
    Put(BPutResponse),
    /// Bulk GET outcome.
    Get(BGetResponse),
    /// Bulk GETOP outcome.
    GetOp(BGetOpResponse),
    /// Bulk DELETE outcome.
    Delete(BDeleteResponse),
    /// Bulk HISTOGRAM outcome.
    Histogram(BHistogramResponse),
}

impl ResponseBody {
    /// The operation this body answers.
    pub fn op(&self) -> Operation {
        match self {
            ResponseBody::Put(_) => Operation::Put,
            ResponseBody::Get(_) => Operation::Get,
            ResponseBody::GetOp(_) => Operation::GetOp,
            ResponseBody::Delete(_) => Operation::Delete,
            ResponseBody::Histogram(_) => Operation::Histogram,
        }
    }

    /// Number of valid items.
    pub fn count(&self) -> usize {
        match self {
            ResponseBody::Put(b) => b.count(),
            ResponseBody::Get(b) => b.count(),
            ResponseBody::GetOp(b) => b.count(),
            ResponseBody::Delete(b) => b.count(),
            ResponseBody::Histogram(b) => b.count(),
        }
    }
}

/// Columns of a bulk PUT response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BPutResponse {
    /// Responding datastore id per item.
    pub datastore_ids: Vec<u32>,
    /// Caller-supplied index echoed per item.
    pub original_indexes: Vec<u64>,
    /// Outcome per item.
    pub statuses: Vec<Status>,
    /// Subject echoed per item.
    pub subjects: Vec<Blob>,
    /// Predicate echoed per item.
    pub predicates: Vec<Blob>,
}

impl BPutResponse {
    /// An empty body with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        BPutResponse {
            datastore_ids: Vec::with_capacity(capacity),
            original_indexes: Vec::with_capacity(capacity),
            statuses: Vec::with_capacity(capacity),
            subjects: Vec::with_capacity(capacity),
            predicates: Vec::with_capacity(capacity),
        }
    }

    /// Appends one item.
    pub fn add(&mut self, datastore_id: u32, index: u64, status: Status, subject: Blob, predicate: Blob) {
        self.datastore_ids.push(datastore_id);
        self.original_indexes.push(index);
        self.statuses.push(status);
        self.subjects.push(subject);
        self.predicates.push(predicate);
    }

    /// Number of valid items.
    pub fn count(&self) -> usize {
        self.statuses.len()
    }
}

/// Columns of a bulk GET response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BGetResponse {
    /// Responding datastore id per item.
    pub datastore_ids: Vec<u32>,
    /// Caller-supplied index echoed per item.
    pub original_indexes: Vec<u64>,
    /// Outcome per item.
    pub statuses: Vec<Status>,
    /// Subject echoed per item.
    pub subjects: Vec<Blob>,
    /// Predicate echoed per item.
    pub predicates: Vec<Blob>,
    /// Fetched object per item; empty unless the status is `Ok`.
    pub objects: Vec<Blob>,
}

impl BGetResponse {
    /// An empty body with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        BGetResponse {
            datastore_ids: Vec::with_capacity(capacity),
            original_indexes: Vec::with_capacity(capacity),
            statuses: Vec::with_capacity(capacity),
            subjects: Vec::with_capacity(capacity),
            predicates: Vec::with_capacity(capacity),
            objects: Vec::with_capacity(capacity),
        }
    }

    /// Appends one item.
    pub fn add(
        &mut self,
        datastore_id: u32,
        index: u64,
        status: Status,
        subject: Blob,
        predicate: Blob,
        object: Blob,
    ) {
        self.datastore_ids.push(datastore_id);
        self.original_indexes.push(index);
        self.statuses.push(status);
        self.subjects.push(subject);
        self.predicates.push(predicate);
        self.objects.push(object);
    }

    /// Number of valid items.
    pub fn count(&self) -> usize {
        self.statuses.len()
    }
}

/// One record streamed by a GETOP item.
#[derive(Debug, Clone, PartialEq)]
pub struct GetOpRecord {
    /// Subject recovered from the stored key.
    pub subject: Blob,
    /// Predicate recovered from the stored key.
    pub predicate: Blob,
    /// Stored object.
    pub object: Blob,
}

/// Columns of a bulk GETOP response. Each item carries the records its scan
/// streamed, in scan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BGetOpResponse {
    /// Responding datastore id per item.
    pub datastore_ids: Vec<u32>,
    /// Caller-supplied index echoed per item.
    pub original_indexes: Vec<u64>,
    /// Outcome per item.
    pub statuses: Vec<Status>,
    /// Seed subject echoed per item.
    pub subjects: Vec<Blob>,
    /// Seed predicate echoed per item.
    pub predicates: Vec<Blob>,
    /// Streamed records per item.
    pub records: Vec<Vec<GetOpRecord>>,
}

impl BGetOpResponse {
    /// An empty body with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        BGetOpResponse {
            datastore_ids: Vec::with_capacity(capacity),
            original_indexes: Vec::with_capacity(capacity),
            statuses: Vec::with_capacity(capacity),
            subjects: Vec::with_capacity(capacity),
            predicates: Vec::with_capacity(capacity),
            records: Vec::with_capacity(capacity),
        }
    }

    /// Appends one item.
    pub fn add(
        &mut self,
        datastore_id: u32,
        index: u64,
        status: Status,
        subject: Blob,
        predicate: Blob,
        records: Vec<GetOpRecord>,
    ) {
        self.datastore_ids.push(datastore_id);
        self.original_indexes.push(index);
        self.statuses.push(status);
        self.subjects.push(subject);
        self.predicates.push(predicate);
        self.records.push(records);
    }

    /// Number of valid items.
    pub fn count(&self) -> usize {
        self.statuses.len()
    }
}

/// Columns of a bulk DELETE response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BDeleteResponse {
    /// Responding datastore id per item.
    pub datastore_ids: Vec<u32>,
    /// Caller-supplied index echoed per item.
    pub original_indexes: Vec<u64>,
    /// Outcome per item.
    pub statuses: Vec<Status>,
    /// Subject echoed per item.
    pub subjects: Vec<Blob>,
    /// Predicate echoed per item.
    pub predicates: Vec<Blob>,
}

impl BDeleteResponse {
    /// An empty body with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        BDeleteResponse {
            datastore_ids: Vec::with_capacity(capacity),
            original_indexes: Vec::with_capacity(capacity),
            statuses: Vec::with_capacity(capacity),
            subjects: Vec::with_capacity(capacity),
            predicates: Vec::with_capacity(capacity),
        }
    }

    /// Appends one item.
    pub fn add(&mut self, datastore_id: u32, index: u64, status: Status, subject: Blob, predicate: Blob) {
        self.datastore_ids.push(datastore_id);
        self.original_indexes.push(index);
        self.statuses.push(status);
        self.subjects.push(subject);
        self.predicates.push(predicate);
    }

    /// Number of valid items.
    pub fn count(&self) -> usize {
        self.statuses.len()
    }
}

/// Columns of a bulk HISTOGRAM response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BHistogramResponse {
    /// Responding datastore id per item.
    pub datastore_ids: Vec<u32>,
    /// Caller-supplied index echoed per item.
    pub original_indexes: Vec<u64>,
    /// Outcome per item.
    pub statuses: Vec<Status>,
    /// Histogram name echoed per item.
    pub names: Vec<String>,
    /// Snapshot per item; empty unless the status is `Ok`.
    pub histograms: Vec<HistogramSnapshot>,
}

impl BHistogramResponse {
    /// An empty body with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        BHistogramResponse {
            datastore_ids: Vec::with_capacity(capacity),
            original_indexes: Vec::with_capacity(capacity),
            statuses: Vec::with_capacity(capacity),
            names: Vec::with_capacity(capacity),
            histograms: Vec::with_capacity(capacity),
        }
    }

    /// Appends one item.
    pub fn add(
        &mut self,
        datastore_id: u32,
        index: u64,
        status: Status,
        name: String,
        histogram: HistogramSnapshot,
    ) {
        self.datastore_ids.push(datastore_id);
        self.original_indexes.push(index);
        self.statuses.push(status);
        self.names.push(name);
        self.histograms.push(histogram);
    }

    /// Number of valid items.
    pub fn count(&self) -> usize {
        self.statuses.len()
    }
}

//! Client-side batch queues: one append-only queue per (operation,
//! destination datastore), guarded by the node's queue lock.

use hx_interface::messages::{
    BDeleteRequest, BGetOpRequest, BGetRequest, BHistogramRequest, BPutRequest, RequestBody,
};
use hx_interface::{Blob, Comparator, DataKind, Operation};

pub(crate) struct QueuedPut {
    pub index: u64,
    pub subject: Blob,
    pub predicate: Blob,
    pub object: Blob,
}

pub(crate) struct QueuedGet {
    pub index: u64,
    pub subject: Blob,
    pub predicate: Blob,
    pub object_kind: DataKind,
}

pub(crate) struct QueuedGetOp {
    pub index: u64,
    pub subject: Blob,
    pub predicate: Blob,
    pub object_kind: DataKind,
    pub comparator: Comparator,
    pub num_records: u64,
}

pub(crate) struct QueuedDelete {
    pub index: u64,
    pub subject: Blob,
    pub predicate: Blob,
}

pub(crate) struct QueuedHistogram {
    pub index: u64,
    pub name: String,
}

/// All pending items of one instance, indexed by destination datastore id.
/// The enqueue counter hands out original indexes and resets on flush.
pub(crate) struct Queues {
    puts: Vec<Vec<QueuedPut>>,
    gets: Vec<Vec<QueuedGet>>,
    getops: Vec<Vec<QueuedGetOp>>,
    deletes: Vec<Vec<QueuedDelete>>,
    histograms: Vec<Vec<QueuedHistogram>>,
    next_index: u64,
}

impl Queues {
    pub fn new(total_datastores: u32) -> Self {
        let total = total_datastores as usize;
        Queues {
            puts: (0..total).map(|_| Vec::new()).collect(),
            gets: (0..total).map(|_| Vec::new()).collect(),
            getops: (0..total).map(|_| Vec::new()).collect(),
            deletes: (0..total).map(|_| Vec::new()).collect(),
            histograms: (0..total).map(|_| Vec::new()).collect(),
            next_index: 0,
        }
    }

    /// Hands out the next original index.
    pub fn next_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// Appends one item; when the queue reaches `threshold` it is drained
    /// and returned as a ready-to-ship request body.
    pub fn push_put(&mut self, ds: u32, item: QueuedPut, threshold: usize) -> Option<RequestBody> {
        let queue = &mut self.puts[ds as usize];
        queue.push(item);
        (queue.len() >= threshold).then(|| Self::put_body(ds, std::mem::take(queue)))
    }

    pub fn push_get(&mut self, ds: u32, item: QueuedGet, threshold: usize) -> Option<RequestBody> {
        let queue = &mut self.gets[ds as usize];
        queue.push(item);
        (queue.len() >= threshold).then(|| Self::get_body(ds, std::mem::take(queue)))
    }

    pub fn push_getop(&mut self, ds: u32, item: QueuedGetOp, threshold: usize) -> Option<RequestBody> {
        let queue = &mut self.getops[ds as usize];
        queue.push(item);
        (queue.len() >= threshold).then(|| Self::getop_body(ds, std::mem::take(queue)))
    }

    pub fn push_delete(&mut self, ds: u32, item: QueuedDelete, threshold: usize) -> Option<RequestBody> {
        let queue = &mut self.deletes[ds as usize];
        queue.push(item);
        (queue.len() >= threshold).then(|| Self::delete_body(ds, std::mem::take(queue)))
    }

    pub fn push_histogram(
        &mut self,
        ds: u32,
        item: QueuedHistogram,
        threshold: usize,
    ) -> Option<RequestBody> {
        let queue = &mut self.histograms[ds as usize];
        queue.push(item);
        (queue.len() >= threshold).then(|| Self::histogram_body(ds, std::mem::take(queue)))
    }

    /// Drains every non-empty queue regardless of threshold and resets the
    /// index counter. Bodies come out op-major, then by datastore id.
    pub fn drain(&mut self) -> Vec<(u32, RequestBody)> {
        let mut out = Vec::new();
        for op in [
            Operation::Put,
            Operation::Get,
            Operation::GetOp,
            Operation::Delete,
            Operation::Histogram,
        ] {
            for ds in 0..self.puts.len() as u32 {
                let body = match op {
                    Operation::Put => {
                        let queue = &mut self.puts[ds as usize];
                        (!queue.is_empty()).then(|| Self::put_body(ds, std::mem::take(queue)))
                    }
                    Operation::Get => {
                        let queue = &mut self.gets[ds as usize];
                        (!queue.is_empty()).then(|| Self::get_body(ds, std::mem::take(queue)))
                    }
                    Operation::GetOp => {
                        let queue = &mut self.getops[ds as usize];
                        (!queue.is_empty()).then(|| Self::getop_body(ds, std::mem::take(queue)))
                    }
                    Operation::Delete => {
                        let queue = &mut self.deletes[ds as usize];
                        (!queue.is_empty()).then(|| Self::delete_body(ds, std::mem::take(queue)))
                    }
                    Operation::Histogram => {
                        let queue = &mut self.histograms[ds as usize];
                        (!queue.is_empty()).then(|| Self::histogram_body(ds, std::mem::take(queue)))
                    }
                    Operation::Sync => None,
                };
                if let Some(body) = body {
                    out.push((ds, body));
                }
            }
        }
        self.next_index = 0;
        out
    }

    fn put_body(ds: u32, items: Vec<QueuedPut>) -> RequestBody {
        let mut body = BPutRequest::with_capacity(items.len());
        for item in items {
            body.add(ds, item.index, item.subject, item.predicate, item.object);
        }
        RequestBody::Put(body)
    }

    fn get_body(ds: u32, items: Vec<QueuedGet>) -> RequestBody {
        let mut body = BGetRequest::with_capacity(items.len());
        for item in items {
            body.add(ds, item.index, item.subject, item.predicate, item.object_kind);
        }
        RequestBody::Get(body)
    }

    fn getop_body(ds: u32, items: Vec<QueuedGetOp>) -> RequestBody {
        let mut body = BGetOpRequest::with_capacity(items.len());
        for item in items {
            body.add(
                ds,
                item.index,
                item.subject,
                item.predicate,
                item.object_kind,
                item.comparator,
                item.num_records,
            );
        }
        RequestBody::GetOp(body)
    }

    fn delete_body(ds: u32, items: Vec<QueuedDelete>) -> RequestBody {
        let mut body = BDeleteRequest::with_capacity(items.len());
        for item in items {
            body.add(ds, item.index, item.subject, item.predicate);
        }
        RequestBody::Delete(body)
    }

    fn histogram_body(ds: u32, items: Vec<QueuedHistogram>) -> RequestBody {
        let mut body = BHistogramRequest::with_capacity(items.len());
        for item in items {
            body.add(ds, item.index, item.name);
        }
        RequestBody::Histogram(body)
    }
}

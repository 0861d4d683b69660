//! The result stream handed back by `flush`.
//!
//! Instead of a linked chain of response records freed one at a time, the
//! stream yields owned [`ResultEntry`] values; consuming an entry is also
//! what releases it. Entries appear in destination-completion order, and
//! within one bulk in request item order.

use std::collections::VecDeque;

use hx_interface::messages::{Response, ResponseBody};
use hx_interface::{Blob, HistogramSnapshot, Operation, Status};

use crate::error::NodeError;

/// One per-item (or, for GETOP, per-record) outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    /// The operation that produced this entry.
    pub op: Operation,
    /// The per-item outcome.
    pub status: Status,
    /// The datastore that answered.
    pub datastore_id: u32,
    /// The index assigned at enqueue time, correlating the entry back to
    /// its call.
    pub original_index: u64,
    /// The subject: echoed from the request, or recovered from the stored
    /// key for GETOP records. Empty for histogram entries.
    pub subject: Blob,
    /// The predicate, under the same rules as the subject.
    pub predicate: Blob,
    /// The fetched object, when the operation returns one.
    pub object: Option<Blob>,
    /// The histogram name, for histogram entries.
    pub name: Option<String>,
    /// The snapshot, for successful histogram entries.
    pub histogram: Option<HistogramSnapshot>,
}

/// The entries of one flush, consumed exactly once.
#[derive(Debug, Default)]
pub struct Results {
    entries: VecDeque<ResultEntry>,
    exhausted: bool,
}

impl Results {
    pub(crate) fn new(responses: Vec<Response>) -> Self {
        let mut entries = VecDeque::new();
        for response in responses {
            flatten(response, &mut entries);
        }
        Results {
            entries,
            exhausted: false,
        }
    }

    /// Pops the next entry. Returns `Ok(None)` exactly once at the end;
    /// asking again is a programmer error reported as
    /// [`NodeError::ResultExhausted`].
    pub fn next_entry(&mut self) -> Result<Option<ResultEntry>, NodeError> {
        if let Some(entry) = self.entries.pop_front() {
            return Ok(Some(entry));
        }
        if self.exhausted {
            return Err(NodeError::ResultExhausted);
        }
        self.exhausted = true;
        Ok(None)
    }

    /// Entries still unconsumed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether every entry has been consumed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Iterator for Results {
    type Item = ResultEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().ok().flatten()
    }
}

fn flatten(response: Response, out: &mut VecDeque<ResultEntry>) {
    match response.body {
        ResponseBody::Put(b) => {
            for i in 0..b.count() {
                out.push_back(ResultEntry {
                    op: Operation::Put,
                    status: b.statuses[i],
                    datastore_id: b.datastore_ids[i],
                    original_index: b.original_indexes[i],
                    subject: b.subjects[i].clone(),
                    predicate: b.predicates[i].clone(),
                    object: None,
                    name: None,
                    histogram: None,
                });
            }
        }
        ResponseBody::Get(b) => {
            for i in 0..b.count() {
                let object = (b.statuses[i] == Status::Ok).then(|| b.objects[i].clone());
                out.push_back(ResultEntry {
                    op: Operation::Get,
                    status: b.statuses[i],
                    datastore_id: b.datastore_ids[i],
                    original_index: b.original_indexes[i],
                    subject: b.subjects[i].clone(),
                    predicate: b.predicates[i].clone(),
                    object,
                    name: None,
                    histogram: None,
                });
            }
        }
        ResponseBody::GetOp(b) => {
            for i in 0..b.count() {
                if b.statuses[i] == Status::Ok {
                    // One entry per streamed record, in scan order.
                    for record in &b.records[i] {
                        out.push_back(ResultEntry {
                            op: Operation::GetOp,
                            status: Status::Ok,
                            datastore_id: b.datastore_ids[i],
                            original_index: b.original_indexes[i],
                            subject: record.subject.clone(),
                            predicate: record.predicate.clone(),
                            object: Some(record.object.clone()),
                            name: None,
                            histogram: None,
                        });
                    }
                } else {
                    out.push_back(ResultEntry {
                        op: Operation::GetOp,
                        status: b.statuses[i],
                        datastore_id: b.datastore_ids[i],
                        original_index: b.original_indexes[i],
                        subject: b.subjects[i].clone(),
                        predicate: b.predicates[i].clone(),
                        object: None,
                        name: None,
                        histogram: None,
                    });
                }
            }
        }
        ResponseBody::Delete(b) => {
            for i in 0..b.count() {
                out.push_back(ResultEntry {
                    op: Operation::Delete,
                    status: b.statuses[i],
                    datastore_id: b.datastore_ids[i],
                    original_index: b.original_indexes[i],
                    subject: b.subjects[i].clone(),
                    predicate: b.predicates[i].clone(),
                    object: None,
                    name: None,
                    histogram: None,
                });
            }
        }
        ResponseBody::Histogram(b) => {
            for i in 0..b.count() {
                let histogram = (b.statuses[i] == Status::Ok).then(|| b.histograms[i].clone());
                out.push_back(ResultEntry {
                    op: Operation::Histogram,
                    status: b.statuses[i],
                    datastore_id: b.datastore_ids[i],
                    original_index: b.original_indexes[i],
                    subject: Blob::empty(),
                    predicate: Blob::empty(),
                    object: None,
                    name: Some(b.names[i].clone()),
                    histogram,
                });
            }
        }
    }
}

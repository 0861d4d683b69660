//! The datastore executor: dispatches incoming bulk request bodies against
//! the local storage engine and builds the matching response bodies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use bytes::Bytes;
use hx_interface::messages::{
    BDeleteRequest, BDeleteResponse, BGetOpRequest, BGetOpResponse, BGetRequest, BGetResponse,
    BHistogramRequest, BHistogramResponse, BPutRequest, BPutResponse, GetOpRecord, RequestBody,
    ResponseBody,
};
use hx_interface::{
    Blob, Comparator, DataKind, HistogramSnapshot, ScanDirection, Status, StorageEngine,
};
use tracing::{debug, warn};

use crate::histogram::{Histogram, HistogramConfig};
use crate::key;

/// One shard-local datastore: an engine plus its named histograms.
pub struct Datastore {
    id: u32,
    engine: Arc<dyn StorageEngine>,
    registered: HashMap<String, HistogramConfig>,
    // Created lazily on the first PUT naming a registered predicate; each
    // histogram carries its own lock so snapshots stay brief.
    histograms: RwLock<HashMap<String, Arc<Mutex<Histogram>>>>,
}

impl Datastore {
    /// Wraps an engine as datastore `id` with the given histogram
    /// registrations.
    pub fn new(
        id: u32,
        engine: Arc<dyn StorageEngine>,
        histogram_configs: impl IntoIterator<Item = HistogramConfig>,
    ) -> Self {
        let registered = histogram_configs
            .into_iter()
            .map(|config| (config.name.clone(), config))
            .collect();
        Datastore {
            id,
            engine,
            registered,
            histograms: RwLock::new(HashMap::new()),
        }
    }

    /// The global id of this datastore.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Forces buffered engine writes down to durable storage.
    pub fn sync(&self) -> anyhow::Result<()> {
        self.engine.sync()
    }

    /// Executes one bulk request body, producing the response body. Item
    /// failures are reported per item and never abort the batch.
    pub fn execute(&self, body: &RequestBody) -> ResponseBody {
        debug!(datastore = self.id, op = ?body.op(), count = body.count(), "executing bulk");
        match body {
            RequestBody::Put(b) => self.bput(b),
            RequestBody::Get(b) => self.bget(b),
            RequestBody::GetOp(b) => self.bgetop(b),
            RequestBody::Delete(b) => self.bdelete(b),
            RequestBody::Histogram(b) => self.bhistogram(b),
        }
    }

    fn bput(&self, b: &BPutRequest) -> ResponseBody {
        let mut resp = BPutResponse::with_capacity(b.count());
        for i in 0..b.count() {
            let status = self.put_one(&b.subjects[i], &b.predicates[i], &b.objects[i]);
            resp.add(
                b.datastore_ids[i],
                b.original_indexes[i],
                status,
                b.subjects[i].clone(),
                b.predicates[i].clone(),
            );
        }
        ResponseBody::Put(resp)
    }

    fn put_one(&self, subject: &Blob, predicate: &Blob, object: &Blob) -> Status {
        let key = match key::compose(subject, predicate) {
            Ok(key) => key,
            Err(err) => {
                warn!(datastore = self.id, %err, "put key composition failed");
                return Status::KindMismatch;
            }
        };
        let mut value = Vec::with_capacity(1 + object.len());
        value.push(object.kind().as_u8());
        value.extend_from_slice(object.as_bytes());
        match self.engine.put(&key, &value) {
            Ok(()) => {
                self.observe(predicate, object);
                Status::Ok
            }
            Err(err) => {
                warn!(datastore = self.id, key = %hex::encode(&key), %err, "engine put failed");
                Status::EngineError
            }
        }
    }

    fn bget(&self, b: &BGetRequest) -> ResponseBody {
        let mut resp = BGetResponse::with_capacity(b.count());
        for i in 0..b.count() {
            let (status, object) =
                self.get_one(&b.subjects[i], &b.predicates[i], b.object_kinds[i]);
            resp.add(
                b.datastore_ids[i],
                b.original_indexes[i],
                status,
                b.subjects[i].clone(),
                b.predicates[i].clone(),
                object,
            );
        }
        ResponseBody::Get(resp)
    }

    fn get_one(&self, subject: &Blob, predicate: &Blob, expected: DataKind) -> (Status, Blob) {
        let key = match key::compose(subject, predicate) {
            Ok(key) => key,
            Err(err) => {
                warn!(datastore = self.id, %err, "get key composition failed");
                return (Status::KindMismatch, Blob::empty());
            }
        };
        match self.engine.get(&key) {
            Ok(Some(value)) => match decode_value(&value) {
                Some(object) if object.kind() == expected => (Status::Ok, object),
                Some(object) => {
                    debug!(
                        datastore = self.id,
                        expected = ?expected,
                        stored = ?object.kind(),
                        "stored object kind disagrees with request"
                    );
                    (Status::KindMismatch, Blob::empty())
                }
                None => (Status::EngineError, Blob::empty()),
            },
            Ok(None) => (Status::NotFound, Blob::empty()),
            Err(err) => {
                warn!(datastore = self.id, key = %hex::encode(&key), %err, "engine get failed");
                (Status::EngineError, Blob::empty())
            }
        }
    }

    fn bgetop(&self, b: &BGetOpRequest) -> ResponseBody {
        let mut resp = BGetOpResponse::with_capacity(b.count());
        for i in 0..b.count() {
            let (status, records) = self.getop_one(
                &b.subjects[i],
                &b.predicates[i],
                b.comparators[i],
                b.num_records[i] as usize,
            );
            resp.add(
                b.datastore_ids[i],
                b.original_indexes[i],
                status,
                b.subjects[i].clone(),
                b.predicates[i].clone(),
                records,
            );
        }
        ResponseBody::GetOp(resp)
    }

    fn getop_one(
        &self,
        subject: &Blob,
        predicate: &Blob,
        comparator: Comparator,
        limit: usize,
    ) -> (Status, Vec<GetOpRecord>) {
        let seek = match key::compose(subject, predicate) {
            Ok(key) => key,
            Err(err) => {
                warn!(datastore = self.id, %err, "getop key composition failed");
                return (Status::KindMismatch, Vec::new());
            }
        };

        let raw = match self.seek_records(&seek, comparator, limit) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(datastore = self.id, %err, "engine scan failed");
                return (Status::EngineError, Vec::new());
            }
        };

        let mut records = Vec::with_capacity(raw.len());
        for (stored_key, stored_value) in raw {
            let stored_key = Bytes::from(stored_key);
            let (subject, predicate) = match key::split(&stored_key, false) {
                Ok(parts) => parts,
                Err(err) => {
                    warn!(
                        datastore = self.id,
                        key = %hex::encode(&stored_key),
                        %err,
                        "skipping record with malformed key"
                    );
                    continue;
                }
            };
            let Some(object) = decode_value(&stored_value) else {
                warn!(
                    datastore = self.id,
                    key = %hex::encode(&stored_key),
                    "skipping record with malformed value"
                );
                continue;
            };
            records.push(GetOpRecord {
                subject,
                predicate,
                object,
            });
        }

        if records.is_empty() {
            (Status::NotFound, records)
        } else {
            (Status::Ok, records)
        }
    }

    /// Runs the comparator against the ordered key space.
    ///
    /// Tie-breaks: LT/LE descend from the seek position and GT/GE ascend,
    /// with the strict variants (and BEFORE/AFTER/NE) skipping the exact
    /// key; EQ returns only the exact key; FIRST/LAST ignore the seek key
    /// entirely and walk in from the keyspace bounds.
    fn seek_records(
        &self,
        seek: &[u8],
        comparator: Comparator,
        limit: usize,
    ) -> anyhow::Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let engine = &self.engine;
        let skip_exact = |mut rows: Vec<(Vec<u8>, Vec<u8>)>| {
            rows.retain(|(key, _)| key.as_slice() != seek);
            rows.truncate(limit);
            rows
        };
        Ok(match comparator {
            Comparator::Eq => match engine.get(seek)? {
                Some(value) if limit > 0 => vec![(seek.to_vec(), value)],
                _ => Vec::new(),
            },
            Comparator::Ne => {
                skip_exact(engine.scan(None, ScanDirection::Forward, limit.saturating_add(1))?)
            }
            Comparator::Gt | Comparator::After => skip_exact(engine.scan(
                Some(seek),
                ScanDirection::Forward,
                limit.saturating_add(1),
            )?),
            Comparator::Ge => engine.scan(Some(seek), ScanDirection::Forward, limit)?,
            Comparator::Lt | Comparator::Before => skip_exact(engine.scan(
                Some(seek),
                ScanDirection::Backward,
                limit.saturating_add(1),
            )?),
            Comparator::Le => engine.scan(Some(seek), ScanDirection::Backward, limit)?,
            Comparator::First => engine.scan(None, ScanDirection::Forward, limit)?,
            Comparator::Last => engine.scan(None, ScanDirection::Backward, limit)?,
        })
    }

    fn bdelete(&self, b: &BDeleteRequest) -> ResponseBody {
        let mut resp = BDeleteResponse::with_capacity(b.count());
        for i in 0..b.count() {
            let status = self.delete_one(&b.subjects[i], &b.predicates[i]);
            resp.add(
                b.datastore_ids[i],
                b.original_indexes[i],
                status,
                b.subjects[i].clone(),
                b.predicates[i].clone(),
            );
        }
        ResponseBody::Delete(resp)
    }

    fn delete_one(&self, subject: &Blob, predicate: &Blob) -> Status {
        let key = match key::compose(subject, predicate) {
            Ok(key) => key,
            Err(err) => {
                warn!(datastore = self.id, %err, "delete key composition failed");
                return Status::KindMismatch;
            }
        };
        match self.engine.delete(&key) {
            Ok(true) => Status::Ok,
            Ok(false) => Status::NotFound,
            Err(err) => {
                warn!(datastore = self.id, key = %hex::encode(&key), %err, "engine delete failed");
                Status::EngineError
            }
        }
    }

    fn bhistogram(&self, b: &BHistogramRequest) -> ResponseBody {
        let mut resp = BHistogramResponse::with_capacity(b.count());
        for i in 0..b.count() {
            let name = &b.names[i];
            let snapshot = {
                let map = self.histograms.read().expect("histogram map lock poisoned");
                map.get(name).map(|hist| {
                    hist.lock().expect("histogram lock poisoned").snapshot()
                })
            };
            let (status, snapshot) = match snapshot {
                Some(snapshot) => (Status::Ok, snapshot),
                None => (Status::NotFound, HistogramSnapshot::default()),
            };
            resp.add(
                b.datastore_ids[i],
                b.original_indexes[i],
                status,
                name.clone(),
                snapshot,
            );
        }
        ResponseBody::Histogram(resp)
    }

    /// Feeds a PUT object into the predicate's histogram, if the predicate
    /// names a registered histogram and the object is numeric.
    fn observe(&self, predicate: &Blob, object: &Blob) {
        if predicate.kind() != DataKind::ByteString || !object.kind().is_numeric() {
            return;
        }
        let Ok(name) = std::str::from_utf8(predicate.as_bytes()) else {
            return;
        };
        let Some(config) = self.registered.get(name) else {
            return;
        };
        let Ok(value) = object.to_f64() else {
            return;
        };
        if value.is_nan() {
            return;
        }

        let hist = {
            let map = self.histograms.read().expect("histogram map lock poisoned");
            map.get(name).cloned()
        };
        let hist = hist.unwrap_or_else(|| {
            let mut map = self.histograms.write().expect("histogram map lock poisoned");
            map.entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Histogram::new(config.clone()))))
                .clone()
        });
        hist.lock().expect("histogram lock poisoned").observe(value);
    }
}

/// Decodes a stored `kind:u8 || raw bytes` value back into a blob.
fn decode_value(value: &[u8]) -> Option<Blob> {
    let (&tag, payload) = value.split_first()?;
    let kind = DataKind::from_u8(tag)?;
    Some(Blob::new(Bytes::copy_from_slice(payload), kind))
}

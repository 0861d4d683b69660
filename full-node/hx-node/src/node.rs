//! The symmetric client/server node.
//!
//! Every instance both issues requests and hosts a shard of the data: the
//! enqueue methods stage triples in per-destination queues, full queues are
//! promoted to in-flight bulk messages immediately, and `flush` waits for
//! every in-flight bulk to be answered. Inbound traffic is drained by
//! listener threads and executed by a worker pool pinned by source rank so
//! one client's operations apply in order.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use hx_interface::messages::{
    wire, BDeleteResponse, BGetOpResponse, BGetResponse, BHistogramResponse, BPutResponse,
    Message, Request, RequestBody, Response, ResponseBody,
};
use hx_interface::{Blob, Comparator, DataKind, HistogramSnapshot, Status, Transport};
use hx_store::{open_engine, Datastore, EngineKind};
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::queue::{
    QueuedDelete, QueuedGet, QueuedGetOp, QueuedHistogram, QueuedPut, Queues,
};
use crate::results::Results;
use crate::router;
use crate::transport::from_config;

/// How long listeners block on the transport before re-checking shutdown.
const RECV_POLL: Duration = Duration::from_millis(50);

/// A promoted bulk awaiting its response. The body is kept so expired or
/// failed bulks can still produce per-item entries.
struct PendingBulk {
    body: RequestBody,
}

#[derive(Default)]
struct Inflight {
    /// FIFO of unanswered bulks per destination rank. The transport
    /// preserves order within a pair, so the oldest entry is always the
    /// one a response answers.
    pending: HashMap<i32, VecDeque<PendingBulk>>,
    /// Responses to swallow per rank: bulks that were expired by a flush
    /// deadline but whose answers may still arrive.
    discard: HashMap<i32, usize>,
    outstanding: usize,
    completed: Vec<Response>,
}

struct Shared {
    shutdown: AtomicBool,
    inflight: Mutex<Inflight>,
    completed_cv: Condvar,
}

/// One open instance of the store.
pub struct Node {
    config: NodeConfig,
    rank: i32,
    world_size: i32,
    total_datastores: u32,
    datastores: Vec<Arc<Datastore>>,
    transport: Arc<dyn Transport>,
    queues: Mutex<Queues>,
    /// Serializes concurrent flushes so each returns a coherent chain.
    flush_lock: Mutex<()>,
    shared: Arc<Shared>,
    worker_txs: Vec<Sender<Request>>,
    listeners: Vec<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
    closed: bool,
}

impl Node {
    /// Opens an instance with the transport named by the configuration.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        let transport = from_config(config.transport);
        Self::open_with_transport(config, transport)
    }

    /// Opens an instance over an injected transport (an in-process fabric
    /// endpoint, or an external MPI-style adapter).
    pub fn open_with_transport(
        config: NodeConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, NodeError> {
        if config.datastores_per_rank == 0 {
            return Err(NodeError::BadArg("datastores_per_rank must be positive".into()));
        }
        if config.listener_threads == 0 || config.worker_threads == 0 {
            return Err(NodeError::BadArg("listener and worker pools must be non-empty".into()));
        }
        let rank = transport.rank();
        let world_size = transport.world_size();
        if rank < 0 || world_size <= 0 || rank >= world_size {
            return Err(NodeError::BadArg(format!(
                "rank {rank} does not fit a world of {world_size}"
            )));
        }
        let total_datastores = world_size as u32 * config.datastores_per_rank;

        let mut datastores = Vec::with_capacity(config.datastores_per_rank as usize);
        for local in 0..config.datastores_per_rank {
            let global = rank as u32 * config.datastores_per_rank + local;
            let path = config.store_root.join(format!("datastore-{global}"));
            if config.engine == EngineKind::RocksDb {
                std::fs::create_dir_all(&path)
                    .map_err(|err| NodeError::Other(err.into()))?;
            }
            let engine = open_engine(config.engine, &path)?;
            datastores.push(Arc::new(Datastore::new(
                global,
                engine,
                config.histograms.clone(),
            )));
        }

        let shared = Arc::new(Shared {
            shutdown: AtomicBool::new(false),
            inflight: Mutex::new(Inflight::default()),
            completed_cv: Condvar::new(),
        });

        let mut worker_txs = Vec::with_capacity(config.worker_threads);
        let mut workers = Vec::with_capacity(config.worker_threads);
        for id in 0..config.worker_threads {
            let (tx, rx) = mpsc::channel::<Request>();
            worker_txs.push(tx);
            let datastores = datastores.clone();
            let transport = transport.clone();
            let shared = shared.clone();
            let dpr = config.datastores_per_rank;
            let handle = std::thread::Builder::new()
                .name(format!("hx-worker-{id}"))
                .spawn(move || worker_loop(rx, datastores, dpr, rank, transport, shared))
                .map_err(|err| NodeError::Other(err.into()))?;
            workers.push(handle);
        }

        let mut listeners = Vec::with_capacity(config.listener_threads);
        for id in 0..config.listener_threads {
            let transport = transport.clone();
            let shared = shared.clone();
            let worker_txs = worker_txs.clone();
            let handle = std::thread::Builder::new()
                .name(format!("hx-listener-{id}"))
                .spawn(move || listener_loop(transport, shared, worker_txs))
                .map_err(|err| NodeError::Other(err.into()))?;
            listeners.push(handle);
        }

        info!(
            rank,
            world_size,
            datastores = config.datastores_per_rank,
            "node open"
        );
        Ok(Node {
            queues: Mutex::new(Queues::new(total_datastores)),
            flush_lock: Mutex::new(()),
            config,
            rank,
            world_size,
            total_datastores,
            datastores,
            transport,
            shared,
            worker_txs,
            listeners,
            workers,
            closed: false,
        })
    }

    /// The rank this node occupies.
    pub fn rank(&self) -> i32 {
        self.rank
    }

    /// Number of ranks in the world.
    pub fn world_size(&self) -> i32 {
        self.world_size
    }

    /// Size of the global datastore id space.
    pub fn total_datastores(&self) -> u32 {
        self.total_datastores
    }

    /// Enqueues one triple for storage.
    pub fn put(&self, subject: Blob, predicate: Blob, object: Blob) -> Result<(), NodeError> {
        validate_key_component(&subject)?;
        validate_key_component(&predicate)?;
        validate_value(&object)?;
        let ds = self.route(&subject);
        let ready = {
            let mut queues = self.queues.lock().expect("queue lock poisoned");
            let index = queues.next_index();
            queues.push_put(
                ds,
                QueuedPut {
                    index,
                    subject,
                    predicate,
                    object,
                },
                self.config.max_ops_per_bulk,
            )
        };
        self.promote(ds, ready)
    }

    /// Enqueues one fetch of the object under `(subject, predicate)`.
    pub fn get(
        &self,
        subject: Blob,
        predicate: Blob,
        object_kind: DataKind,
    ) -> Result<(), NodeError> {
        validate_key_component(&subject)?;
        validate_key_component(&predicate)?;
        validate_object_kind(object_kind)?;
        let ds = self.route(&subject);
        let ready = {
            let mut queues = self.queues.lock().expect("queue lock poisoned");
            let index = queues.next_index();
            queues.push_get(
                ds,
                QueuedGet {
                    index,
                    subject,
                    predicate,
                    object_kind,
                },
                self.config.max_ops_per_bulk,
            )
        };
        self.promote(ds, ready)
    }

    /// Enqueues one ranged fetch seeded at `(subject, predicate)`.
    pub fn get_op(
        &self,
        subject: Blob,
        predicate: Blob,
        object_kind: DataKind,
        comparator: Comparator,
        num_records: u64,
    ) -> Result<(), NodeError> {
        validate_key_component(&subject)?;
        validate_key_component(&predicate)?;
        validate_object_kind(object_kind)?;
        let ds = self.route(&subject);
        let ready = {
            let mut queues = self.queues.lock().expect("queue lock poisoned");
            let index = queues.next_index();
            queues.push_getop(
                ds,
                QueuedGetOp {
                    index,
                    subject,
                    predicate,
                    object_kind,
                    comparator,
                    num_records,
                },
                self.config.max_ops_per_bulk,
            )
        };
        self.promote(ds, ready)
    }

    /// Enqueues one best-effort delete.
    pub fn delete(&self, subject: Blob, predicate: Blob) -> Result<(), NodeError> {
        validate_key_component(&subject)?;
        validate_key_component(&predicate)?;
        let ds = self.route(&subject);
        let ready = {
            let mut queues = self.queues.lock().expect("queue lock poisoned");
            let index = queues.next_index();
            queues.push_delete(
                ds,
                QueuedDelete {
                    index,
                    subject,
                    predicate,
                },
                self.config.max_ops_per_bulk,
            )
        };
        self.promote(ds, ready)
    }

    /// Enqueues a snapshot request for the named histogram on every
    /// datastore; the flush returns one entry per datastore.
    pub fn histogram(&self, name: &str) -> Result<(), NodeError> {
        if name.is_empty() {
            return Err(NodeError::BadArg("histogram name is empty".into()));
        }
        let mut promoted = Vec::new();
        {
            let mut queues = self.queues.lock().expect("queue lock poisoned");
            for ds in 0..self.total_datastores {
                let index = queues.next_index();
                if let Some(body) = queues.push_histogram(
                    ds,
                    QueuedHistogram {
                        index,
                        name: name.to_string(),
                    },
                    self.config.max_ops_per_bulk,
                ) {
                    promoted.push((ds, body));
                }
            }
        }
        for (ds, body) in promoted {
            self.dispatch(self.request_for(ds, body))?;
        }
        Ok(())
    }

    /// Bulk PUT over column arrays; the item's position is its original
    /// index offset.
    pub fn bput(
        &self,
        subjects: Vec<Blob>,
        predicates: Vec<Blob>,
        objects: Vec<Blob>,
    ) -> Result<(), NodeError> {
        if subjects.len() != predicates.len() || subjects.len() != objects.len() {
            return Err(NodeError::BadArg("bput columns differ in length".into()));
        }
        for (subject, predicate) in subjects.iter().zip(&predicates) {
            validate_key_component(subject)?;
            validate_key_component(predicate)?;
        }
        for object in &objects {
            validate_value(object)?;
        }
        let mut promoted = Vec::new();
        {
            let mut queues = self.queues.lock().expect("queue lock poisoned");
            for ((subject, predicate), object) in
                subjects.into_iter().zip(predicates).zip(objects)
            {
                let ds = self.route(&subject);
                let index = queues.next_index();
                if let Some(body) = queues.push_put(
                    ds,
                    QueuedPut {
                        index,
                        subject,
                        predicate,
                        object,
                    },
                    self.config.max_ops_per_bulk,
                ) {
                    promoted.push((ds, body));
                }
            }
        }
        for (ds, body) in promoted {
            self.dispatch(self.request_for(ds, body))?;
        }
        Ok(())
    }

    /// Bulk GET over column arrays.
    pub fn bget(
        &self,
        subjects: Vec<Blob>,
        predicates: Vec<Blob>,
        object_kinds: Vec<DataKind>,
    ) -> Result<(), NodeError> {
        if subjects.len() != predicates.len() || subjects.len() != object_kinds.len() {
            return Err(NodeError::BadArg("bget columns differ in length".into()));
        }
        for (subject, predicate) in subjects.iter().zip(&predicates) {
            validate_key_component(subject)?;
            validate_key_component(predicate)?;
        }
        for kind in &object_kinds {
            validate_object_kind(*kind)?;
        }
        let mut promoted = Vec::new();
        {
            let mut queues = self.queues.lock().expect("queue lock poisoned");
            for ((subject, predicate), object_kind) in
                subjects.into_iter().zip(predicates).zip(object_kinds)
            {
                let ds = self.route(&subject);
                let index = queues.next_index();
                if let Some(body) = queues.push_get(
                    ds,
                    QueuedGet {
                        index,
                        subject,
                        predicate,
                        object_kind,
                    },
                    self.config.max_ops_per_bulk,
                ) {
                    promoted.push((ds, body));
                }
            }
        }
        for (ds, body) in promoted {
            self.dispatch(self.request_for(ds, body))?;
        }
        Ok(())
    }

    /// Bulk DELETE over column arrays.
    pub fn bdelete(&self, subjects: Vec<Blob>, predicates: Vec<Blob>) -> Result<(), NodeError> {
        if subjects.len() != predicates.len() {
            return Err(NodeError::BadArg("bdelete columns differ in length".into()));
        }
        for (subject, predicate) in subjects.iter().zip(&predicates) {
            validate_key_component(subject)?;
            validate_key_component(predicate)?;
        }
        let mut promoted = Vec::new();
        {
            let mut queues = self.queues.lock().expect("queue lock poisoned");
            for (subject, predicate) in subjects.into_iter().zip(predicates) {
                let ds = self.route(&subject);
                let index = queues.next_index();
                if let Some(body) = queues.push_delete(
                    ds,
                    QueuedDelete {
                        index,
                        subject,
                        predicate,
                    },
                    self.config.max_ops_per_bulk,
                ) {
                    promoted.push((ds, body));
                }
            }
        }
        for (ds, body) in promoted {
            self.dispatch(self.request_for(ds, body))?;
        }
        Ok(())
    }

    /// Bulk GETOP over column arrays.
    pub fn bget_op(
        &self,
        subjects: Vec<Blob>,
        predicates: Vec<Blob>,
        object_kinds: Vec<DataKind>,
        comparators: Vec<Comparator>,
        num_records: Vec<u64>,
    ) -> Result<(), NodeError> {
        if subjects.len() != predicates.len()
            || subjects.len() != object_kinds.len()
            || subjects.len() != comparators.len()
            || subjects.len() != num_records.len()
        {
            return Err(NodeError::BadArg("bget_op columns differ in length".into()));
        }
        for (subject, predicate) in subjects.iter().zip(&predicates) {
            validate_key_component(subject)?;
            validate_key_component(predicate)?;
        }
        for kind in &object_kinds {
            validate_object_kind(*kind)?;
        }
        let mut promoted = Vec::new();
        {
            let mut queues = self.queues.lock().expect("queue lock poisoned");
            for ((((subject, predicate), object_kind), comparator), limit) in subjects
                .into_iter()
                .zip(predicates)
                .zip(object_kinds)
                .zip(comparators)
                .zip(num_records)
            {
                let ds = self.route(&subject);
                let index = queues.next_index();
                if let Some(body) = queues.push_getop(
                    ds,
                    QueuedGetOp {
                        index,
                        subject,
                        predicate,
                        object_kind,
                        comparator,
                        num_records: limit,
                    },
                    self.config.max_ops_per_bulk,
                ) {
                    promoted.push((ds, body));
                }
            }
        }
        for (ds, body) in promoted {
            self.dispatch(self.request_for(ds, body))?;
        }
        Ok(())
    }

    /// Bulk HISTOGRAM over a name column; like the single variant, every
    /// name is asked of every datastore.
    pub fn bhistogram(&self, names: Vec<String>) -> Result<(), NodeError> {
        if names.iter().any(|name| name.is_empty()) {
            return Err(NodeError::BadArg("histogram name is empty".into()));
        }
        let mut promoted = Vec::new();
        {
            let mut queues = self.queues.lock().expect("queue lock poisoned");
            for name in names {
                for ds in 0..self.total_datastores {
                    let index = queues.next_index();
                    if let Some(body) = queues.push_histogram(
                        ds,
                        QueuedHistogram {
                            index,
                            name: name.clone(),
                        },
                        self.config.max_ops_per_bulk,
                    ) {
                        promoted.push((ds, body));
                    }
                }
            }
        }
        for (ds, body) in promoted {
            self.dispatch(self.request_for(ds, body))?;
        }
        Ok(())
    }

    /// Drains every queue, ships the bulks, and blocks until all in-flight
    /// bulks are answered.
    pub fn flush(&self) -> Result<Results, NodeError> {
        self.flush_deadline(None)
    }

    /// [`flush`](Node::flush) with a deadline. On expiry the unanswered
    /// items come back with `Status::Timeout`, their late responses are
    /// dropped on arrival, and fresh traffic proceeds normally.
    pub fn flush_deadline(&self, deadline: Option<Duration>) -> Result<Results, NodeError> {
        let _guard = self.flush_lock.lock().expect("flush lock poisoned");
        let promoted = self.queues.lock().expect("queue lock poisoned").drain();
        for (ds, body) in promoted {
            self.dispatch(self.request_for(ds, body))?;
        }

        let deadline_at = deadline.map(|d| Instant::now() + d);
        let mut inflight = self.shared.inflight.lock().expect("inflight lock poisoned");
        while inflight.outstanding > 0 {
            if self.shared.shutdown.load(Ordering::Relaxed) {
                return Err(NodeError::Shutdown);
            }
            match deadline_at {
                None => {
                    inflight = self
                        .shared
                        .completed_cv
                        .wait(inflight)
                        .expect("inflight lock poisoned");
                }
                Some(at) => {
                    let now = Instant::now();
                    if now >= at {
                        expire(&mut inflight, self.rank);
                        break;
                    }
                    let (guard, _) = self
                        .shared
                        .completed_cv
                        .wait_timeout(inflight, at - now)
                        .expect("inflight lock poisoned");
                    inflight = guard;
                }
            }
        }
        let completed = std::mem::take(&mut inflight.completed);
        drop(inflight);
        let results = Results::new(completed);
        debug!(entries = results.len(), "flush complete");
        Ok(results)
    }

    /// Flush, persist every local datastore, and rendezvous with every
    /// other rank.
    pub fn sync(&self) -> Result<Results, NodeError> {
        let results = self.flush()?;
        for datastore in &self.datastores {
            datastore.sync()?;
        }
        self.transport.barrier().map_err(NodeError::Transport)?;
        Ok(results)
    }

    /// Flushes leftovers, persists local datastores, and stops the thread
    /// pools. Dropping the returned instance afterwards is `destroy`.
    pub fn close(mut self) -> Result<(), NodeError> {
        let leftovers = self.flush()?;
        if !leftovers.is_empty() {
            debug!(entries = leftovers.len(), "discarding unconsumed results at close");
        }
        for datastore in &self.datastores {
            datastore.sync()?;
        }
        self.shutdown_threads();
        info!(rank = self.rank, "node closed");
        Ok(())
    }

    fn route(&self, subject: &Blob) -> u32 {
        router::route(self.config.hash, subject, self.total_datastores)
    }

    fn request_for(&self, ds: u32, body: RequestBody) -> Request {
        Request {
            src_rank: self.rank,
            dst_rank: router::rank_of(ds, self.config.datastores_per_rank),
            body,
        }
    }

    fn promote(&self, ds: u32, ready: Option<RequestBody>) -> Result<(), NodeError> {
        let Some(body) = ready else {
            return Ok(());
        };
        debug!(datastore = ds, op = ?body.op(), "queue reached threshold, promoting");
        self.dispatch(self.request_for(ds, body))
    }

    /// Ships one promoted bulk: local destinations run inline against the
    /// local executor, remote ones enter the in-flight table and go out
    /// through the transport.
    fn dispatch(&self, request: Request) -> Result<(), NodeError> {
        let dst_rank = request.dst_rank;
        if dst_rank == self.rank {
            let body = match local_datastore(
                &self.datastores,
                self.config.datastores_per_rank,
                &request.body,
            ) {
                Some(datastore) => datastore.execute(&request.body),
                None => failure_body(&request.body, Status::EngineError),
            };
            let response = Response {
                src_rank: self.rank,
                dst_rank: self.rank,
                body,
            };
            let mut inflight = self.shared.inflight.lock().expect("inflight lock poisoned");
            inflight.completed.push(response);
            drop(inflight);
            self.shared.completed_cv.notify_all();
            return Ok(());
        }

        let body_echo = request.body.clone();
        let bytes = wire::pack(&Message::Request(request));

        // The in-flight lock stays held across the send so concurrent
        // promoters enter the per-rank FIFO in the same order their bytes
        // enter the fabric.
        let mut inflight = self.shared.inflight.lock().expect("inflight lock poisoned");
        while inflight.outstanding >= self.config.max_bulk_ops {
            if self.shared.shutdown.load(Ordering::Relaxed) {
                return Err(NodeError::Shutdown);
            }
            inflight = self
                .shared
                .completed_cv
                .wait(inflight)
                .expect("inflight lock poisoned");
        }
        match self.transport.send(dst_rank, bytes) {
            Ok(()) => {
                inflight
                    .pending
                    .entry(dst_rank)
                    .or_default()
                    .push_back(PendingBulk { body: body_echo });
                inflight.outstanding += 1;
            }
            Err(err) => {
                warn!(dst_rank, %err, "transport send failed, failing the bulk");
                inflight.completed.push(Response {
                    src_rank: dst_rank,
                    dst_rank: self.rank,
                    body: failure_body(&body_echo, Status::TransportError),
                });
                drop(inflight);
                self.shared.completed_cv.notify_all();
            }
        }
        Ok(())
    }

    fn shutdown_threads(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shared.shutdown.store(true, Ordering::Relaxed);
        self.shared.completed_cv.notify_all();
        for handle in self.listeners.drain(..) {
            let _ = handle.join();
        }
        // Workers exit once every sender (ours and the listeners') is gone.
        self.worker_txs.clear();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown_threads();
    }
}

fn listener_loop(transport: Arc<dyn Transport>, shared: Arc<Shared>, worker_txs: Vec<Sender<Request>>) {
    while !shared.shutdown.load(Ordering::Relaxed) {
        match transport.recv_timeout(RECV_POLL) {
            Ok(Some((src, bytes))) => match wire::unpack(&bytes) {
                Ok(Message::Request(request)) => {
                    // Pin each source rank to one worker so its requests
                    // execute in arrival order.
                    let worker = src.rem_euclid(worker_txs.len() as i32) as usize;
                    if worker_txs[worker].send(request).is_err() {
                        warn!("worker pool is gone, listener exiting");
                        break;
                    }
                }
                Ok(Message::Response(response)) => complete(&shared, response),
                Err(err) => warn!(src, %err, "discarding undecodable message"),
            },
            Ok(None) => {}
            Err(err) => {
                warn!(%err, "transport receive failed");
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

fn worker_loop(
    rx: Receiver<Request>,
    datastores: Vec<Arc<Datastore>>,
    datastores_per_rank: u32,
    my_rank: i32,
    transport: Arc<dyn Transport>,
    shared: Arc<Shared>,
) {
    while let Ok(request) = rx.recv() {
        let body = match local_datastore(&datastores, datastores_per_rank, &request.body) {
            Some(datastore) => datastore.execute(&request.body),
            None => failure_body(&request.body, Status::EngineError),
        };
        let response = Response {
            src_rank: my_rank,
            dst_rank: request.src_rank,
            body,
        };
        if request.src_rank == my_rank {
            complete(&shared, response);
        } else {
            let bytes = wire::pack(&Message::Response(response));
            if let Err(err) = transport.send(request.src_rank, bytes) {
                warn!(dst_rank = request.src_rank, %err, "failed to return a response");
            }
        }
    }
}

/// Matches an arriving response against the oldest in-flight bulk for its
/// rank, or swallows it if that bulk already expired.
fn complete(shared: &Shared, response: Response) {
    let mut inflight = shared.inflight.lock().expect("inflight lock poisoned");
    if let Some(count) = inflight.discard.get_mut(&response.src_rank) {
        if *count > 0 {
            *count -= 1;
            warn!(
                src = response.src_rank,
                "dropping response that arrived after its flush deadline"
            );
            return;
        }
    }
    match inflight
        .pending
        .get_mut(&response.src_rank)
        .and_then(|queue| queue.pop_front())
    {
        Some(bulk) => {
            if bulk.body.op() != response.body.op() {
                warn!(
                    src = response.src_rank,
                    sent = ?bulk.body.op(),
                    got = ?response.body.op(),
                    "response op does not match the oldest in-flight bulk"
                );
            }
            inflight.outstanding -= 1;
            inflight.completed.push(response);
            drop(inflight);
            shared.completed_cv.notify_all();
        }
        None => warn!(src = response.src_rank, "dropping unexpected response"),
    }
}

/// Expires every in-flight bulk: their items come back as `Timeout`
/// entries and their eventual responses are marked for discard.
fn expire(inflight: &mut Inflight, my_rank: i32) {
    warn!(
        outstanding = inflight.outstanding,
        "flush deadline expired, failing in-flight bulks"
    );
    let pending = std::mem::take(&mut inflight.pending);
    for (rank, bulks) in pending {
        if bulks.is_empty() {
            continue;
        }
        *inflight.discard.entry(rank).or_insert(0) += bulks.len();
        for bulk in bulks {
            inflight.completed.push(Response {
                src_rank: rank,
                dst_rank: my_rank,
                body: failure_body(&bulk.body, Status::Timeout),
            });
        }
    }
    inflight.outstanding = 0;
}

/// The local datastore a bulk addresses. Promotion builds one bulk per
/// destination datastore, so the first item names it for the whole body.
fn local_datastore<'a>(
    datastores: &'a [Arc<Datastore>],
    datastores_per_rank: u32,
    body: &RequestBody,
) -> Option<&'a Arc<Datastore>> {
    let ds_id = first_datastore_id(body).unwrap_or(0);
    datastores.get(router::local_index(ds_id, datastores_per_rank) as usize)
}

fn first_datastore_id(body: &RequestBody) -> Option<u32> {
    match body {
        RequestBody::Put(b) => b.datastore_ids.first().copied(),
        RequestBody::Get(b) => b.datastore_ids.first().copied(),
        RequestBody::GetOp(b) => b.datastore_ids.first().copied(),
        RequestBody::Delete(b) => b.datastore_ids.first().copied(),
        RequestBody::Histogram(b) => b.datastore_ids.first().copied(),
    }
}

/// Builds the response a bulk would have produced had every item failed
/// with `status`; used for transport failures and expired deadlines.
fn failure_body(body: &RequestBody, status: Status) -> ResponseBody {
    match body {
        RequestBody::Put(b) => {
            let mut resp = BPutResponse::with_capacity(b.count());
            for i in 0..b.count() {
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
        RequestBody::Get(b) => {
            let mut resp = BGetResponse::with_capacity(b.count());
            for i in 0..b.count() {
                resp.add(
                    b.datastore_ids[i],
                    b.original_indexes[i],
                    status,
                    b.subjects[i].clone(),
                    b.predicates[i].clone(),
                    Blob::empty(),
                );
            }
            ResponseBody::Get(resp)
        }
        RequestBody::GetOp(b) => {
            let mut resp = BGetOpResponse::with_capacity(b.count());
            for i in 0..b.count() {
                resp.add(
                    b.datastore_ids[i],
                    b.original_indexes[i],
                    status,
                    b.subjects[i].clone(),
                    b.predicates[i].clone(),
                    Vec::new(),
                );
            }
            ResponseBody::GetOp(resp)
        }
        RequestBody::Delete(b) => {
            let mut resp = BDeleteResponse::with_capacity(b.count());
            for i in 0..b.count() {
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
        RequestBody::Histogram(b) => {
            let mut resp = BHistogramResponse::with_capacity(b.count());
            for i in 0..b.count() {
                resp.add(
                    b.datastore_ids[i],
                    b.original_indexes[i],
                    status,
                    b.names[i].clone(),
                    HistogramSnapshot::default(),
                );
            }
            ResponseBody::Histogram(resp)
        }
    }
}

fn validate_key_component(blob: &Blob) -> Result<(), NodeError> {
    validate_value(blob)?;
    let nan = match blob.kind() {
        DataKind::F32 => blob.as_f32().map(f32::is_nan).unwrap_or(true),
        DataKind::F64 => blob.as_f64().map(f64::is_nan).unwrap_or(true),
        _ => false,
    };
    if nan {
        return Err(NodeError::BadArg("NaN cannot be ordered into a key".into()));
    }
    Ok(())
}

fn validate_value(blob: &Blob) -> Result<(), NodeError> {
    if blob.kind() == DataKind::Pointer {
        return Err(NodeError::BadArg("pointer blobs are process-local".into()));
    }
    if let Some(width) = blob.kind().fixed_width() {
        if blob.len() != width {
            return Err(NodeError::BadArg(format!(
                "{:?} payload must be {width} bytes, got {}",
                blob.kind(),
                blob.len()
            )));
        }
    }
    Ok(())
}

fn validate_object_kind(kind: DataKind) -> Result<(), NodeError> {
    if kind == DataKind::Pointer {
        return Err(NodeError::BadArg("pointer objects never travel".into()));
    }
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use hx_node::transport::InProcessFabric;
use hx_node::{Node, NodeConfig, NodeError};
use hx_interface::{Blob, Comparator, DataKind, Operation, Status, Transport};
use hx_store::{BucketStrategy, EngineKind, HistogramConfig};

fn memory_config() -> NodeConfig {
    NodeConfig {
        engine: EngineKind::InMemory,
        ..NodeConfig::default()
    }
}

fn open_local() -> Node {
    Node::open(memory_config()).unwrap()
}

#[test]
fn open_close() {
    let node = open_local();
    assert_eq!(node.rank(), 0);
    assert_eq!(node.world_size(), 1);
    assert_eq!(node.total_datastores(), 1);
    node.close().unwrap();
}

#[test]
fn put_then_get_round_trip() {
    let node = open_local();
    node.put(Blob::from("alice"), Blob::from("age"), Blob::from_u32(30)).unwrap();
    node.put(Blob::from("alice"), Blob::from("name"), Blob::from("ALICE")).unwrap();

    let mut results = node.flush().unwrap();
    assert_eq!(results.len(), 2);
    while let Some(entry) = results.next_entry().unwrap() {
        assert_eq!(entry.op, Operation::Put);
        assert_eq!(entry.status, Status::Ok);
    }

    node.get(Blob::from("alice"), Blob::from("age"), DataKind::U32).unwrap();
    let mut results = node.flush().unwrap();
    let entry = results.next_entry().unwrap().unwrap();
    assert_eq!(entry.op, Operation::Get);
    assert_eq!(entry.status, Status::Ok);
    assert_eq!(entry.subject.as_bytes(), b"alice");
    assert_eq!(entry.object.unwrap().as_u32().unwrap(), 30);
    assert!(results.next_entry().unwrap().is_none());

    node.close().unwrap();
}

#[test]
fn getop_streams_in_ascending_numeric_order() {
    let node = open_local();
    node.put(Blob::from_f64(-1.5), Blob::from("v"), Blob::from_u32(1)).unwrap();
    node.put(Blob::from_f64(2.25), Blob::from("v"), Blob::from_u32(2)).unwrap();
    node.flush().unwrap().for_each(drop);

    node.get_op(
        Blob::from_f64(f64::NEG_INFINITY),
        Blob::from("v"),
        DataKind::U32,
        Comparator::Gt,
        10,
    )
    .unwrap();
    let entries: Vec<_> = node.flush().unwrap().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].subject.as_f64().unwrap(), -1.5);
    assert_eq!(entries[0].object.as_ref().unwrap().as_u32().unwrap(), 1);
    assert_eq!(entries[1].subject.as_f64().unwrap(), 2.25);
    assert_eq!(entries[1].object.as_ref().unwrap().as_u32().unwrap(), 2);

    node.close().unwrap();
}

#[test]
fn delete_of_missing_key_is_not_found_but_flush_succeeds() {
    let node = open_local();
    node.delete(Blob::from("ghost"), Blob::from("p")).unwrap();
    let entries: Vec<_> = node.flush().unwrap().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].op, Operation::Delete);
    assert_eq!(entries[0].status, Status::NotFound);
    node.close().unwrap();
}

#[test]
fn histogram_trains_and_snapshots() {
    let config = NodeConfig {
        engine: EngineKind::InMemory,
        histograms: vec![HistogramConfig {
            name: "latency".to_string(),
            strategy: BucketStrategy::UniformLinear {
                n: 4,
                min: 0.0,
                max: 100.0,
            },
            training_size: 3,
            first_n_edges: None,
        }],
        ..NodeConfig::default()
    };
    let node = Node::open(config).unwrap();
    for (i, value) in [10.0, 55.0, 90.0, 40.0].into_iter().enumerate() {
        node.put(
            Blob::from_u64(i as u64),
            Blob::from("latency"),
            Blob::from_f64(value),
        )
        .unwrap();
    }
    node.flush().unwrap().for_each(drop);

    node.histogram("latency").unwrap();
    let entries: Vec<_> = node.flush().unwrap().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, Status::Ok);
    assert_eq!(entries[0].name.as_deref(), Some("latency"));
    let snapshot = entries[0].histogram.as_ref().unwrap();
    assert_eq!(snapshot.buckets, vec![0.0, 25.0, 50.0, 75.0]);
    assert_eq!(snapshot.counts, vec![1, 1, 1, 1]);

    node.close().unwrap();
}

#[test]
fn flush_accounts_for_every_enqueued_item() {
    let node = open_local();
    let n = 200;
    for i in 0..n {
        node.put(
            Blob::from_u64(i),
            Blob::from("p"),
            Blob::from_u64(i * 2),
        )
        .unwrap();
    }
    // 200 puts with a threshold of 64: some bulks promoted early, the rest
    // drained by the flush; every item must come back exactly once.
    let entries: Vec<_> = node.flush().unwrap().collect();
    assert_eq!(entries.len(), n as usize);
    let mut indexes: Vec<_> = entries.iter().map(|e| e.original_index).collect();
    indexes.sort_unstable();
    assert_eq!(indexes, (0..n).collect::<Vec<_>>());
    node.close().unwrap();
}

#[test]
fn results_report_exhaustion_once_consumed() {
    let node = open_local();
    node.put(Blob::from("s"), Blob::from("p"), Blob::from("o")).unwrap();
    let mut results = node.flush().unwrap();
    assert!(results.next_entry().unwrap().is_some());
    assert!(results.next_entry().unwrap().is_none());
    assert!(matches!(results.next_entry(), Err(NodeError::ResultExhausted)));
    node.close().unwrap();
}

#[test]
fn pointer_blobs_are_rejected_at_enqueue() {
    let node = open_local();
    let pointer = Blob::new(bytes::Bytes::from_static(&[0; 8]), DataKind::Pointer);
    assert!(matches!(
        node.put(pointer, Blob::from("p"), Blob::from("o")),
        Err(NodeError::BadArg(_))
    ));
    // Nothing was enqueued.
    assert_eq!(node.flush().unwrap().len(), 0);
    node.close().unwrap();
}

#[test]
fn nan_subjects_are_rejected_at_enqueue() {
    let node = open_local();
    assert!(matches!(
        node.put(Blob::from_f64(f64::NAN), Blob::from("p"), Blob::from("o")),
        Err(NodeError::BadArg(_))
    ));
    node.close().unwrap();
}

/// A two-rank world where nothing is ever delivered.
struct BlackholeTransport {
    rank: i32,
}

impl Transport for BlackholeTransport {
    fn rank(&self) -> i32 {
        self.rank
    }

    fn world_size(&self) -> i32 {
        2
    }

    fn send(&self, _dst_rank: i32, _payload: Vec<u8>) -> anyhow::Result<()> {
        Ok(())
    }

    fn recv_timeout(&self, timeout: Duration) -> anyhow::Result<Option<(i32, Vec<u8>)>> {
        std::thread::sleep(timeout);
        Ok(None)
    }

    fn barrier(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[test]
fn expired_flush_reports_timeouts_and_recovers() {
    let config = NodeConfig {
        engine: EngineKind::InMemory,
        hash: hx_node::HashKind::Sum,
        ..NodeConfig::default()
    };
    let node =
        Node::open_with_transport(config, Arc::new(BlackholeTransport { rank: 0 })).unwrap();

    // Byte sum 1 routes to datastore 1, hosted by the unreachable rank 1.
    let remote = Blob::copy_from_slice(&[1]);
    node.put(remote.clone(), Blob::from("p"), Blob::from("o")).unwrap();
    let entries: Vec<_> = node
        .flush_deadline(Some(Duration::from_millis(100)))
        .unwrap()
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, Status::Timeout);
    assert_eq!(entries[0].subject, remote);

    // Byte sum 2 routes to datastore 0, which is local: fresh queues flush
    // normally after the expiry.
    node.put(Blob::copy_from_slice(&[2]), Blob::from("p"), Blob::from("o")).unwrap();
    let entries: Vec<_> = node.flush().unwrap().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, Status::Ok);

    node.close().unwrap();
}

#[test]
fn two_ranks_exchange_triples_over_the_fabric() {
    let mut world = InProcessFabric::world(2).into_iter();
    let t0: Arc<dyn Transport> = Arc::new(world.next().unwrap());
    let t1: Arc<dyn Transport> = Arc::new(world.next().unwrap());

    let config = NodeConfig {
        engine: EngineKind::InMemory,
        hash: hx_node::HashKind::Sum,
        ..NodeConfig::default()
    };
    let a = Node::open_with_transport(config.clone(), t0).unwrap();
    let b = Node::open_with_transport(config, t1).unwrap();

    // Byte sums 0..4 spread over the two datastores: even sums stay on
    // rank 0, odd sums cross the fabric to rank 1.
    for i in 0u8..4 {
        a.put(Blob::copy_from_slice(&[i]), Blob::from("p"), Blob::from_u32(u32::from(i)))
            .unwrap();
    }
    let entries: Vec<_> = a.flush().unwrap().collect();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e.status == Status::Ok));
    let remote = entries.iter().filter(|e| e.datastore_id == 1).count();
    assert_eq!(remote, 2);

    // Rank 1 reads a triple that rank 0 wrote onto it.
    b.get(Blob::copy_from_slice(&[1]), Blob::from("p"), DataKind::U32).unwrap();
    let entries: Vec<_> = b.flush().unwrap().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, Status::Ok);
    assert_eq!(entries[0].object.as_ref().unwrap().as_u32().unwrap(), 1);

    a.close().unwrap();
    b.close().unwrap();
}

#[test]
fn bulk_variants_enqueue_by_column() {
    let node = open_local();
    node.bput(
        vec![Blob::from("s1"), Blob::from("s2")],
        vec![Blob::from("p"), Blob::from("p")],
        vec![Blob::from_u32(1), Blob::from_u32(2)],
    )
    .unwrap();
    node.flush().unwrap().for_each(drop);

    node.bget(
        vec![Blob::from("s1"), Blob::from("s2")],
        vec![Blob::from("p"), Blob::from("p")],
        vec![DataKind::U32, DataKind::U32],
    )
    .unwrap();
    let mut entries: Vec<_> = node.flush().unwrap().collect();
    entries.sort_by_key(|e| e.original_index);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].object.as_ref().unwrap().as_u32().unwrap(), 1);
    assert_eq!(entries[1].object.as_ref().unwrap().as_u32().unwrap(), 2);

    node.bdelete(
        vec![Blob::from("s1"), Blob::from("ghost")],
        vec![Blob::from("p"), Blob::from("p")],
    )
    .unwrap();
    let mut entries: Vec<_> = node.flush().unwrap().collect();
    entries.sort_by_key(|e| e.original_index);
    assert_eq!(entries[0].status, Status::Ok);
    assert_eq!(entries[1].status, Status::NotFound);

    node.close().unwrap();
}

#[test]
fn bulk_getop_and_histogram_variants() {
    let config = NodeConfig {
        engine: EngineKind::InMemory,
        histograms: vec![HistogramConfig {
            name: "latency".to_string(),
            strategy: BucketStrategy::UniformLinear {
                n: 4,
                min: 0.0,
                max: 100.0,
            },
            training_size: 1,
            first_n_edges: None,
        }],
        ..NodeConfig::default()
    };
    let node = Node::open(config).unwrap();
    for i in 0u64..3 {
        node.put(
            Blob::from_u64(i),
            Blob::from("latency"),
            Blob::from_f64(i as f64 * 30.0),
        )
        .unwrap();
    }
    node.flush().unwrap().for_each(drop);

    node.bget_op(
        vec![Blob::from_u64(1), Blob::from_u64(1)],
        vec![Blob::from("latency"), Blob::from("latency")],
        vec![DataKind::F64, DataKind::F64],
        vec![Comparator::Ge, Comparator::Lt],
        vec![10, 10],
    )
    .unwrap();
    let mut entries: Vec<_> = node.flush().unwrap().collect();
    entries.sort_by_key(|e| (e.original_index, e.subject.as_u64().unwrap()));
    assert_eq!(entries.len(), 3);
    // Item 0 ascends from subject 1, item 1 descends below it.
    assert_eq!(entries[0].subject.as_u64().unwrap(), 1);
    assert_eq!(entries[1].subject.as_u64().unwrap(), 2);
    assert_eq!(entries[2].subject.as_u64().unwrap(), 0);

    node.bhistogram(vec!["latency".to_string(), "memory".to_string()]).unwrap();
    let mut entries: Vec<_> = node.flush().unwrap().collect();
    entries.sort_by_key(|e| e.original_index);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name.as_deref(), Some("latency"));
    assert_eq!(entries[0].status, Status::Ok);
    assert_eq!(entries[0].histogram.as_ref().unwrap().total(), 3);
    assert_eq!(entries[1].name.as_deref(), Some("memory"));
    assert_eq!(entries[1].status, Status::NotFound);

    node.close().unwrap();
}

#[test]
fn mismatched_bulk_columns_are_rejected() {
    let node = open_local();
    assert!(matches!(
        node.bput(
            vec![Blob::from("s1")],
            vec![Blob::from("p"), Blob::from("p")],
            vec![Blob::from("o")],
        ),
        Err(NodeError::BadArg(_))
    ));
    node.close().unwrap();
}

#[test]
fn sync_flushes_and_rendezvouses() {
    let node = open_local();
    node.put(Blob::from("s"), Blob::from("p"), Blob::from("o")).unwrap();
    let results = node.sync().unwrap();
    assert_eq!(results.len(), 1);
    node.close().unwrap();
}

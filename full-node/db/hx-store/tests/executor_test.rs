use std::sync::Arc;

use hx_interface::messages::{
    BDeleteRequest, BGetOpRequest, BGetRequest, BHistogramRequest, BPutRequest, RequestBody,
    ResponseBody,
};
use hx_interface::{Blob, Comparator, DataKind, Status};
use hx_store::{BucketStrategy, Datastore, HistogramConfig, MemoryEngine};

fn datastore() -> Datastore {
    Datastore::new(0, Arc::new(MemoryEngine::new()), Vec::new())
}

fn datastore_with_latency_histogram() -> Datastore {
    Datastore::new(
        0,
        Arc::new(MemoryEngine::new()),
        vec![HistogramConfig {
            name: "latency".to_string(),
            strategy: BucketStrategy::UniformLinear {
                n: 4,
                min: 0.0,
                max: 100.0,
            },
            training_size: 3,
            first_n_edges: None,
        }],
    )
}

fn put(ds: &Datastore, subject: Blob, predicate: Blob, object: Blob) -> Status {
    let mut body = BPutRequest::with_capacity(1);
    body.add(0, 0, subject, predicate, object);
    let ResponseBody::Put(resp) = ds.execute(&RequestBody::Put(body)) else {
        panic!("put answered with a different op");
    };
    resp.statuses[0]
}

#[test]
fn put_then_get_recovers_typed_objects() {
    let ds = datastore();
    assert_eq!(put(&ds, Blob::from("alice"), Blob::from("age"), Blob::from_u32(30)), Status::Ok);
    assert_eq!(put(&ds, Blob::from("alice"), Blob::from("name"), Blob::from("ALICE")), Status::Ok);

    let mut body = BGetRequest::with_capacity(2);
    body.add(0, 0, Blob::from("alice"), Blob::from("age"), DataKind::U32);
    body.add(0, 1, Blob::from("alice"), Blob::from("name"), DataKind::ByteString);
    let ResponseBody::Get(resp) = ds.execute(&RequestBody::Get(body)) else {
        panic!("get answered with a different op");
    };
    assert_eq!(resp.statuses, vec![Status::Ok, Status::Ok]);
    assert_eq!(resp.objects[0].as_u32().unwrap(), 30);
    assert_eq!(resp.objects[1].as_bytes(), b"ALICE");
}

#[test]
fn get_reports_kind_mismatch_and_not_found() {
    let ds = datastore();
    put(&ds, Blob::from("alice"), Blob::from("age"), Blob::from_u32(30));

    let mut body = BGetRequest::with_capacity(2);
    body.add(0, 0, Blob::from("alice"), Blob::from("age"), DataKind::F64);
    body.add(0, 1, Blob::from("ghost"), Blob::from("age"), DataKind::U32);
    let ResponseBody::Get(resp) = ds.execute(&RequestBody::Get(body)) else {
        panic!("get answered with a different op");
    };
    assert_eq!(resp.statuses, vec![Status::KindMismatch, Status::NotFound]);
}

#[test]
fn getop_streams_in_numeric_subject_order() {
    let ds = datastore();
    put(&ds, Blob::from_f64(-1.5), Blob::from("v"), Blob::from_u32(1));
    put(&ds, Blob::from_f64(2.25), Blob::from("v"), Blob::from_u32(2));

    let mut body = BGetOpRequest::with_capacity(1);
    body.add(
        0,
        0,
        Blob::from_f64(f64::NEG_INFINITY),
        Blob::from("v"),
        DataKind::U32,
        Comparator::Gt,
        10,
    );
    let ResponseBody::GetOp(resp) = ds.execute(&RequestBody::GetOp(body)) else {
        panic!("getop answered with a different op");
    };
    assert_eq!(resp.statuses, vec![Status::Ok]);
    let records = &resp.records[0];
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].subject.as_f64().unwrap(), -1.5);
    assert_eq!(records[0].object.as_u32().unwrap(), 1);
    assert_eq!(records[1].subject.as_f64().unwrap(), 2.25);
    assert_eq!(records[1].object.as_u32().unwrap(), 2);
}

#[test]
fn getop_comparator_tie_breaks() {
    let ds = datastore();
    for i in [1u32, 2, 3] {
        put(&ds, Blob::from_u32(i), Blob::from("p"), Blob::from_u32(i * 10));
    }
    let seed = |cmp, n| {
        let mut body = BGetOpRequest::with_capacity(1);
        body.add(0, 0, Blob::from_u32(2), Blob::from("p"), DataKind::U32, cmp, n);
        let ResponseBody::GetOp(resp) = ds.execute(&RequestBody::GetOp(body)) else {
            panic!("getop answered with a different op");
        };
        resp.records[0]
            .iter()
            .map(|r| r.subject.as_u32().unwrap())
            .collect::<Vec<_>>()
    };

    assert_eq!(seed(Comparator::Eq, 10), vec![2]);
    assert_eq!(seed(Comparator::Ge, 10), vec![2, 3]);
    assert_eq!(seed(Comparator::Gt, 10), vec![3]);
    assert_eq!(seed(Comparator::After, 10), vec![3]);
    assert_eq!(seed(Comparator::Le, 10), vec![2, 1]);
    assert_eq!(seed(Comparator::Lt, 10), vec![1]);
    assert_eq!(seed(Comparator::Before, 10), vec![1]);
    assert_eq!(seed(Comparator::Ne, 10), vec![1, 3]);
    assert_eq!(seed(Comparator::First, 2), vec![1, 2]);
    assert_eq!(seed(Comparator::Last, 2), vec![3, 2]);
    assert_eq!(seed(Comparator::Ge, 1), vec![2]);
}

#[test]
fn delete_is_best_effort() {
    let ds = datastore();
    put(&ds, Blob::from("alice"), Blob::from("age"), Blob::from_u32(30));

    let mut body = BDeleteRequest::with_capacity(2);
    body.add(0, 0, Blob::from("ghost"), Blob::from("p"));
    body.add(0, 1, Blob::from("alice"), Blob::from("age"));
    let ResponseBody::Delete(resp) = ds.execute(&RequestBody::Delete(body)) else {
        panic!("delete answered with a different op");
    };
    // The missing key reports NOT_FOUND without aborting the batch.
    assert_eq!(resp.statuses, vec![Status::NotFound, Status::Ok]);
}

#[test]
fn registered_predicate_builds_a_histogram() {
    let ds = datastore_with_latency_histogram();
    for (i, value) in [10.0, 55.0, 90.0, 40.0].into_iter().enumerate() {
        put(&ds, Blob::from_u64(i as u64), Blob::from("latency"), Blob::from_f64(value));
    }

    let mut body = BHistogramRequest::with_capacity(1);
    body.add(0, 0, "latency".to_string());
    let ResponseBody::Histogram(resp) = ds.execute(&RequestBody::Histogram(body)) else {
        panic!("histogram answered with a different op");
    };
    assert_eq!(resp.statuses, vec![Status::Ok]);
    assert_eq!(resp.histograms[0].buckets, vec![0.0, 25.0, 50.0, 75.0]);
    assert_eq!(resp.histograms[0].counts, vec![1, 1, 1, 1]);
}

#[test]
fn unregistered_histogram_is_not_found() {
    let ds = datastore_with_latency_histogram();

    let mut body = BHistogramRequest::with_capacity(2);
    body.add(0, 0, "latency".to_string());
    body.add(0, 1, "memory".to_string());
    let ResponseBody::Histogram(resp) = ds.execute(&RequestBody::Histogram(body)) else {
        panic!("histogram answered with a different op");
    };
    // "latency" is registered but no PUT has named it yet, so it has not
    // been created; "memory" was never registered.
    assert_eq!(resp.statuses, vec![Status::NotFound, Status::NotFound]);
}

#[test]
fn non_numeric_objects_do_not_feed_histograms() {
    let ds = datastore_with_latency_histogram();
    put(&ds, Blob::from("s"), Blob::from("latency"), Blob::from("not a number"));
    for value in [10.0, 55.0, 90.0] {
        put(&ds, Blob::from("s"), Blob::from("latency"), Blob::from_f64(value));
    }

    let mut body = BHistogramRequest::with_capacity(1);
    body.add(0, 0, "latency".to_string());
    let ResponseBody::Histogram(resp) = ds.execute(&RequestBody::Histogram(body)) else {
        panic!("histogram answered with a different op");
    };
    // Only the three numeric observations count, exactly the training size.
    assert_eq!(resp.histograms[0].total(), 3);
}

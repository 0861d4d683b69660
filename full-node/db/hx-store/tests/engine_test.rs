use hx_interface::{ScanDirection, StorageEngine};
use hx_store::{MemoryEngine, RocksEngine};
use tempfile::TempDir;

fn populate(engine: &dyn StorageEngine) {
    for i in 0u8..10 {
        engine.put(&[i], &[i, i]).unwrap();
    }
}

fn check_contract(engine: &dyn StorageEngine) {
    populate(engine);

    assert_eq!(engine.get(&[3]).unwrap(), Some(vec![3, 3]));
    assert_eq!(engine.get(&[42]).unwrap(), None);

    // Forward scan from an inclusive start.
    let rows = engine.scan(Some(&[4]), ScanDirection::Forward, 3).unwrap();
    let keys: Vec<_> = rows.iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(keys, vec![vec![4], vec![5], vec![6]]);

    // Forward scan from a key that is absent seeks to the next one.
    engine.delete(&[5]).unwrap();
    let rows = engine.scan(Some(&[5]), ScanDirection::Forward, 2).unwrap();
    let keys: Vec<_> = rows.iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(keys, vec![vec![6], vec![7]]);

    // Backward scan from an inclusive start.
    let rows = engine.scan(Some(&[4]), ScanDirection::Backward, 3).unwrap();
    let keys: Vec<_> = rows.iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(keys, vec![vec![4], vec![3], vec![2]]);

    // Boundary scans.
    let rows = engine.scan(None, ScanDirection::Forward, 1).unwrap();
    assert_eq!(rows[0].0, vec![0]);
    let rows = engine.scan(None, ScanDirection::Backward, 1).unwrap();
    assert_eq!(rows[0].0, vec![9]);

    // Deletes report presence.
    assert!(engine.delete(&[0]).unwrap());
    assert!(!engine.delete(&[0]).unwrap());
    assert!(!engine.delete(&[42]).unwrap());

    engine.sync().unwrap();
}

#[test]
fn memory_engine_contract() {
    check_contract(&MemoryEngine::new());
}

#[test]
fn rocks_engine_contract() {
    let dir = TempDir::new().unwrap();
    let engine = RocksEngine::open(dir.path()).unwrap();
    check_contract(&engine);
}

#[test]
fn rocks_engine_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let engine = RocksEngine::open(dir.path()).unwrap();
        engine.put(b"k", b"v").unwrap();
        engine.sync().unwrap();
    }
    let engine = RocksEngine::open(dir.path()).unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
}

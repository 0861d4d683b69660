//! The in-memory ordered engine, used for tests and diskless deployments.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

use hx_interface::{ScanDirection, StorageEngine};

/// A [`StorageEngine`] over a `BTreeMap`. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    map: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryEngine {
    /// An empty engine.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageEngine for MemoryEngine {
    fn put(&self, key: &[u8], value: &[u8]) -> anyhow::Result<()> {
        self.map
            .lock()
            .expect("engine lock poisoned")
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.map.lock().expect("engine lock poisoned").get(key).cloned())
    }

    fn delete(&self, key: &[u8]) -> anyhow::Result<bool> {
        Ok(self
            .map
            .lock()
            .expect("engine lock poisoned")
            .remove(key)
            .is_some())
    }

    fn scan(
        &self,
        start: Option<&[u8]>,
        direction: ScanDirection,
        limit: usize,
    ) -> anyhow::Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let map = self.map.lock().expect("engine lock poisoned");
        let out = match direction {
            ScanDirection::Forward => {
                let lower = start.map_or(Bound::Unbounded, Bound::Included);
                map.range::<[u8], _>((lower, Bound::Unbounded))
                    .take(limit)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            }
            ScanDirection::Backward => {
                let upper = start.map_or(Bound::Unbounded, Bound::Included);
                map.range::<[u8], _>((Bound::Unbounded, upper))
                    .rev()
                    .take(limit)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            }
        };
        Ok(out)
    }

    fn sync(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

//! The narrow KV contract a storage engine must satisfy.

/// Direction of an ordered scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    /// Ascending key order.
    Forward,
    /// Descending key order.
    Backward,
}

/// One shard-local ordered key/value engine.
///
/// Keys and values are arbitrary byte strings; the engine imposes plain
/// lexicographic key order. Implementations are shared across worker
/// threads, so every method takes `&self`.
pub trait StorageEngine: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> anyhow::Result<()>;

    /// Fetches the value stored under `key`.
    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>>;

    /// Removes `key`. Returns whether the key was present.
    fn delete(&self, key: &[u8]) -> anyhow::Result<bool>;

    /// Walks up to `limit` entries in key order starting from `start`
    /// (inclusive when present). `start = None` begins at the keyspace
    /// boundary for the given direction.
    fn scan(
        &self,
        start: Option<&[u8]>,
        direction: ScanDirection,
        limit: usize,
    ) -> anyhow::Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Forces buffered writes down to durable storage.
    fn sync(&self) -> anyhow::Result<()>;
}

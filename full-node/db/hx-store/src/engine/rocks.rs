//! The on-disk ordered engine: one RocksDB instance per datastore
//! directory, default column family only.

use std::path::Path;

use hx_interface::{ScanDirection, StorageEngine};
use rocksdb::{BlockBasedOptions, DBCompressionType, Options, DB};
use tracing::debug;

/// A [`StorageEngine`] backed by RocksDB.
pub struct RocksEngine {
    db: DB,
}

impl RocksEngine {
    /// Opens (creating if missing) the engine at `path`.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let db = DB::open(&db_options(), path)?;
        debug!("opened rocksdb engine at {}", path.display());
        Ok(RocksEngine { db })
    }
}

/// Tuning for one datastore shard. Writes land as bulk batches, reads are
/// point GETs plus short ordered walks around a seek, and several shards
/// share the process with the listener and worker pools.
fn db_options() -> Options {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    // A memtable sized to absorb a few promoted bulks before flushing.
    opts.set_write_buffer_size(32 << 20);
    // Background work and the file budget are per shard, not per process.
    opts.increase_parallelism(2);
    opts.set_max_open_files(512);
    opts.set_compression_type(DBCompressionType::Lz4);

    let mut table = BlockBasedOptions::default();
    table.set_bloom_filter(10.0, false);
    opts.set_block_based_table_factory(&table);
    opts
}

impl StorageEngine for RocksEngine {
    fn put(&self, key: &[u8], value: &[u8]) -> anyhow::Result<()> {
        self.db.put(key, value)?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    fn delete(&self, key: &[u8]) -> anyhow::Result<bool> {
        // RocksDB deletes blindly; probe first so callers can report
        // missing keys.
        if self.db.get(key)?.is_none() {
            return Ok(false);
        }
        self.db.delete(key)?;
        Ok(true)
    }

    fn scan(
        &self,
        start: Option<&[u8]>,
        direction: ScanDirection,
        limit: usize,
    ) -> anyhow::Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut iter = self.db.raw_iterator();
        match (direction, start) {
            (ScanDirection::Forward, Some(key)) => iter.seek(key),
            (ScanDirection::Forward, None) => iter.seek_to_first(),
            (ScanDirection::Backward, Some(key)) => iter.seek_for_prev(key),
            (ScanDirection::Backward, None) => iter.seek_to_last(),
        }

        let mut out = Vec::with_capacity(limit.min(1024));
        while out.len() < limit && iter.valid() {
            let key = iter.key().expect("valid iterator has a key");
            let value = iter.value().expect("valid iterator has a value");
            out.push((key.to_vec(), value.to_vec()));
            match direction {
                ScanDirection::Forward => iter.next(),
                ScanDirection::Backward => iter.prev(),
            }
        }
        iter.status()?;
        Ok(out)
    }

    fn sync(&self) -> anyhow::Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

//! The two storage engines behind the datastore interface and the
//! configuration knob selecting between them.

use std::path::Path;
use std::sync::Arc;

use hx_interface::StorageEngine;
use serde::Deserialize;

mod memory;
mod rocks;

pub use memory::MemoryEngine;
pub use rocks::RocksEngine;

/// Which engine backs each datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// The on-disk ordered engine.
    #[default]
    RocksDb,
    /// The in-memory engine.
    InMemory,
}

/// Opens one engine instance rooted at `path`. The in-memory engine
/// ignores the path.
pub fn open_engine(kind: EngineKind, path: &Path) -> anyhow::Result<Arc<dyn StorageEngine>> {
    Ok(match kind {
        EngineKind::RocksDb => Arc::new(RocksEngine::open(path)?),
        EngineKind::InMemory => Arc::new(MemoryEngine::new()),
    })
}

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! The per-datastore layer of the pipeline.
//!
//! This crate owns everything that happens once a bulk request reaches the
//! rank hosting its data: the order-preserving numeric encoding ([`elen`]),
//! the subject/predicate key codec ([`key`]), the two storage engines
//! behind the [`StorageEngine`](hx_interface::StorageEngine) contract
//! ([`engine`]), per-predicate [`histogram`]s, and the [`Datastore`]
//! executor that dispatches bulk bodies against the engine.

pub mod elen;
pub mod engine;
mod executor;
pub mod histogram;
pub mod key;

pub use engine::{open_engine, EngineKind, MemoryEngine, RocksEngine};
pub use executor::Datastore;
pub use histogram::{BucketStrategy, Histogram, HistogramConfig};
pub use key::KeyError;

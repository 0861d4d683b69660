#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Core types and contracts shared by every crate in the workspace.
//!
//! This crate defines the currency the pipeline trades in (kind-tagged
//! [`Blob`]s, [`Operation`] and [`Status`] codes, and the bulk
//! [`messages`] with their wire codec) together with the two contracts
//! the core consumes but does not implement: the [`StorageEngine`] behind
//! each datastore and the rank-based [`Transport`] between processes.

mod blob;
mod histogram;
pub mod messages;
mod ops;
pub mod services;

pub use blob::{Blob, BlobError, DataKind};
pub use histogram::HistogramSnapshot;
pub use ops::{Comparator, Operation, Status};
pub use services::storage::{ScanDirection, StorageEngine};
pub use services::transport::Transport;

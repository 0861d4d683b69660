#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! The symmetric client/server node of the store.
//!
//! A [`Node`] both issues requests and hosts a shard of the data. Callers
//! enqueue triple operations ([`Node::put`], [`Node::get`],
//! [`Node::get_op`], [`Node::delete`], [`Node::histogram`] and their bulk
//! column variants); full per-destination queues promote to in-flight bulk
//! messages immediately, and [`Node::flush`] blocks until every in-flight
//! bulk is answered, returning a [`Results`] stream of per-item outcomes.

mod config;
mod error;
mod node;
mod queue;
pub mod router;
mod results;
pub mod transport;

pub use config::{from_toml_path, NodeConfig};
pub use error::NodeError;
pub use node::Node;
pub use results::{ResultEntry, Results};
pub use router::HashKind;
pub use transport::TransportKind;

//! Built-in transport adapters.
//!
//! The [`Transport`](hx_interface::Transport) contract is defined in
//! `hx-interface`; this module provides the single-process adapters. A
//! production MPI-style fabric implements the same trait outside this
//! workspace and is injected through
//! [`Node::open_with_transport`](crate::Node::open_with_transport).

use std::sync::Arc;

use hx_interface::Transport;
use serde::Deserialize;

mod fabric;
mod null;

pub use fabric::{FabricEndpoint, InProcessFabric};
pub use null::NullTransport;

/// Built-in transport selection for [`NodeConfig`](crate::NodeConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// A single-rank world with no peers.
    #[default]
    Null,
}

/// Builds the configured built-in transport.
pub fn from_config(kind: TransportKind) -> Arc<dyn Transport> {
    match kind {
        TransportKind::Null => Arc::new(NullTransport),
    }
}

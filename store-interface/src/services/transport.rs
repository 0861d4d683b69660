//! The point-to-point transport contract.

use std::time::Duration;

/// A rank-addressed message fabric.
///
/// The fabric may reorder messages between different `(src, dst)` pairs but
/// must preserve order within one pair. A packed buffer handed to [`send`]
/// is owned by the transport from submission to completion.
///
/// [`send`]: Transport::send
pub trait Transport: Send + Sync {
    /// The rank of this endpoint.
    fn rank(&self) -> i32;

    /// Number of ranks in the fabric.
    fn world_size(&self) -> i32;

    /// Queues `payload` for delivery to `dst_rank`.
    fn send(&self, dst_rank: i32, payload: Vec<u8>) -> anyhow::Result<()>;

    /// Waits up to `timeout` for an inbound message. `Ok(None)` means the
    /// timeout elapsed with nothing to deliver.
    fn recv_timeout(&self, timeout: Duration) -> anyhow::Result<Option<(i32, Vec<u8>)>>;

    /// Blocks until every rank has entered the barrier.
    fn barrier(&self) -> anyhow::Result<()>;
}

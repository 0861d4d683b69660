//! An in-process rank fabric over channels.
//!
//! Each endpoint owns an inbox and a sender to every peer, so a world of
//! `n` endpoints behaves like a message-passing fabric within one process:
//! order is preserved per `(src, dst)` pair, and the barrier rendezvouses
//! every rank. Used by multi-rank tests and single-machine deployments.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use hx_interface::Transport;

/// Builder for a fully-connected in-process world.
pub struct InProcessFabric;

impl InProcessFabric {
    /// Creates `world_size` connected endpoints, one per rank.
    pub fn world(world_size: usize) -> Vec<FabricEndpoint> {
        let mut senders = Vec::with_capacity(world_size);
        let mut inboxes = Vec::with_capacity(world_size);
        for _ in 0..world_size {
            let (tx, rx) = mpsc::channel();
            senders.push(tx);
            inboxes.push(rx);
        }
        let barrier = Arc::new(Barrier::new(world_size));
        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| FabricEndpoint {
                rank: rank as i32,
                world_size: world_size as i32,
                peers: senders.clone(),
                inbox: Mutex::new(inbox),
                barrier: barrier.clone(),
            })
            .collect()
    }
}

/// One rank's endpoint in an [`InProcessFabric`] world.
pub struct FabricEndpoint {
    rank: i32,
    world_size: i32,
    peers: Vec<Sender<(i32, Vec<u8>)>>,
    inbox: Mutex<Receiver<(i32, Vec<u8>)>>,
    barrier: Arc<Barrier>,
}

impl Transport for FabricEndpoint {
    fn rank(&self) -> i32 {
        self.rank
    }

    fn world_size(&self) -> i32 {
        self.world_size
    }

    fn send(&self, dst_rank: i32, payload: Vec<u8>) -> anyhow::Result<()> {
        let peer = self
            .peers
            .get(usize::try_from(dst_rank).unwrap_or(usize::MAX))
            .ok_or_else(|| anyhow!("rank {dst_rank} is outside the world"))?;
        peer.send((self.rank, payload))
            .map_err(|_| anyhow!("rank {dst_rank} has hung up"))
    }

    fn recv_timeout(&self, timeout: Duration) -> anyhow::Result<Option<(i32, Vec<u8>)>> {
        let inbox = self.inbox.lock().expect("inbox lock poisoned");
        match inbox.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            // Peers dropping their senders is a normal shutdown signal.
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn barrier(&self) -> anyhow::Result<()> {
        self.barrier.wait();
        Ok(())
    }
}

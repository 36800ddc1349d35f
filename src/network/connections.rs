//! The live set of local client connections.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{Notify, mpsc};
use tracing::debug;

use crate::metrics;

pub type ConnectionId = u64;

/// What the set keeps for each connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    /// Outbound line queue drained by the connection's writer.
    pub sender: mpsc::Sender<String>,
    /// Notified when the connection should shut down.
    pub kill: Arc<Notify>,
}

/// Live connections, keyed by id.
///
/// Broadcast takes a snapshot of the senders before delivering, so
/// connections may be added or removed concurrently.
#[derive(Default)]
pub struct ConnectionSet {
    next_id: AtomicU64,
    connections: DashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn insert(&self, id: ConnectionId, handle: ConnectionHandle) {
        self.connections.insert(id, handle);
        metrics::set_connected_clients(self.connections.len());
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.connections.remove(&id).is_some();
        if removed {
            metrics::set_connected_clients(self.connections.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Queue `line` on every live connection and return how many accepted it.
    ///
    /// A connection whose queue is closed or full is dropped from the set and
    /// told to shut down; delivery to the others continues.
    pub fn broadcast(&self, line: &str) -> usize {
        let snapshot: Vec<(ConnectionId, ConnectionHandle)> = self
            .connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        for (id, handle) in snapshot {
            match handle.sender.try_send(line.to_owned()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(connection = id, error = %e, "Dropping connection after failed broadcast");
                    self.remove(id);
                    handle.kill.notify_one();
                }
            }
        }
        metrics::record_fanout(delivered);
        delivered
    }
}

//! Registry of in-flight connection workers

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Completion flag shared between a worker and the registry.
///
/// The worker sets it after closing its socket; the registry reads it to
/// decide which handles can be joined without blocking.
#[derive(Debug, Clone, Default)]
pub struct DoneFlag(Arc<AtomicBool>);

impl DoneFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the worker complete
    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the worker has marked itself complete
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One accepted connection's bookkeeping entry
pub struct Connection {
    peer: SocketAddr,
    handle: JoinHandle<()>,
    done: DoneFlag,
}

impl Connection {
    /// Track a spawned worker
    pub fn new(peer: SocketAddr, handle: JoinHandle<()>, done: DoneFlag) -> Self {
        Self { peer, handle, done }
    }

    /// Remote address of the connection
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether the worker has finished
    pub fn is_done(&self) -> bool {
        self.done.is_set()
    }

    async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!("Worker for {} did not finish cleanly: {}", self.peer, e);
        }
    }
}

/// Unordered set of live workers, owned by the accept loop
#[derive(Default)]
pub struct Registry {
    connections: Vec<Connection>,
    joined: usize,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly spawned worker
    pub fn insert(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    /// Number of entries not yet reaped
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether every worker has been reaped
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Total workers joined over the registry's lifetime
    pub fn joined(&self) -> usize {
        self.joined
    }

    /// Join and remove every entry whose done flag is already set.
    ///
    /// Unfinished workers are left alone. Returns how many were reaped.
    pub async fn reap_finished(&mut self) -> usize {
        let (finished, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.connections)
            .into_iter()
            .partition(Connection::is_done);
        self.connections = pending;

        let reaped = finished.len();
        for connection in finished {
            debug!("Reaping worker for {}", connection.peer());
            connection.join().await;
        }
        self.joined += reaped;
        reaped
    }

    /// Wait for every outstanding worker, finished or not
    pub async fn drain(&mut self) -> usize {
        let outstanding = std::mem::take(&mut self.connections);
        let drained = outstanding.len();
        for connection in outstanding {
            connection.join().await;
        }
        self.joined += drained;
        drained
    }
}

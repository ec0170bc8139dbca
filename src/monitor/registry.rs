//! Fan-out of monitor frames to every open connection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{FolioError, Result};
use crate::monitor::frames::ServerFrame;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Unique per handshake; the only identity a connection has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0.simple())
    }
}

/// Handle to a live monitor socket.
///
/// Frames are queued and written by the connection's single writer task, so
/// broadcasts and command replies never interleave inside a frame. Broadcasts
/// never wait on a slow client; command replies do.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<Arc<str>>,
}

impl Connection {
    /// New handle plus the receiving end for the writer task
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: ConnectionId::new(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a payload without waiting; fails if the queue is closed or full
    pub fn send(&self, payload: Arc<str>) -> Result<()> {
        self.tx
            .try_send(payload)
            .map_err(|_| FolioError::ConnectionClosed(self.id.to_string()))
    }

    /// Queue a reply frame, waiting for room if the queue is full.
    ///
    /// Fails only once the writer side has gone away.
    pub async fn reply(&self, frame: &ServerFrame) -> Result<()> {
        let payload: Arc<str> = Arc::from(frame.to_json()?);
        self.tx
            .send(payload)
            .await
            .map_err(|_| FolioError::ConnectionClosed(self.id.to_string()))
    }
}

/// What happened during one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Set of open monitor connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection whose handshake has completed
    pub fn register(&self, connection: Connection) {
        let id = connection.id();
        let total = {
            let mut conns = self.connections.write();
            conns.insert(id, connection);
            conns.len()
        };
        debug!(conn_id = %id, total, "monitor connection registered");
    }

    /// Remove a connection; returns false if it was not registered
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        let (removed, total) = {
            let mut conns = self.connections.write();
            let removed = conns.remove(id).is_some();
            (removed, conns.len())
        };
        if removed {
            debug!(conn_id = %id, total, "monitor connection unregistered");
        }
        removed
    }

    /// Send `payload` to every connection in a snapshot of the set.
    ///
    /// A failed send is counted and skipped. The failed connection stays
    /// registered until its socket task unregisters it.
    pub fn broadcast(&self, payload: &str) -> BroadcastReport {
        let snapshot: Vec<Connection> = self.connections.read().values().cloned().collect();
        let payload: Arc<str> = Arc::from(payload);
        let mut report = BroadcastReport::default();

        for conn in &snapshot {
            match conn.send(Arc::clone(&payload)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    debug!(conn_id = %conn.id(), error = %e, "broadcast send failed");
                }
            }
        }

        report
    }

    /// Serialize once, then broadcast
    pub fn broadcast_frame(&self, frame: &ServerFrame) -> BroadcastReport {
        match frame.to_json() {
            Ok(json) => self.broadcast(&json),
            Err(e) => {
                warn!(error = %e, "failed to serialize monitor frame");
                BroadcastReport::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().contains_key(id)
    }
}

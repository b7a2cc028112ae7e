//! Connection identity and the per-listener open-connection set.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Keep a control handle to every open connection so a stopping
//!   listener can close it
//! - Forget connections that close on their own

use std::collections::HashMap;
use std::io;
use std::net::Shutdown;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::TcpStream;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Outcome of closing a connection set.
#[derive(Debug, Default)]
pub struct CloseReport {
    pub closed: usize,
    pub errors: Vec<io::Error>,
}

/// Open connections of one listener, keyed by ID.
///
/// Each entry is a duplicate handle of the socket handed to the data
/// plane; shutting it down ends the connection for both sides.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    open: Mutex<HashMap<ConnectionId, std::net::TcpStream>>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted stream. Returns the stream to serve and a guard
    /// that forgets the connection when dropped.
    pub fn admit(self: &Arc<Self>, stream: TcpStream) -> io::Result<(TcpStream, ConnectionGuard)> {
        let std_stream = stream.into_std()?;
        let control = std_stream.try_clone()?;
        let stream = TcpStream::from_std(std_stream)?;

        let id = ConnectionId::new();
        self.open.lock().insert(id, control);

        Ok((
            stream,
            ConnectionGuard {
                set: Arc::clone(self),
                id,
            },
        ))
    }

    pub fn len(&self) -> usize {
        self.open.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shut down every connection currently open.
    ///
    /// Each close is attempted independently. A connection the peer already
    /// closed is not an error.
    pub fn close_all(&self) -> CloseReport {
        let drained: Vec<_> = self.open.lock().drain().collect();
        let mut report = CloseReport::default();

        for (id, conn) in drained {
            match conn.shutdown(Shutdown::Both) {
                Ok(()) => report.closed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {
                    tracing::debug!(connection_id = %id, "Connection already closed");
                }
                Err(e) => {
                    tracing::warn!(connection_id = %id, error = %e, "Failed to close connection");
                    report.errors.push(e);
                }
            }
        }
        report
    }
}

/// Guard that tracks a connection's lifetime.
/// Removes the connection from its set when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    set: Arc<ConnectionSet>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.set.open.lock().remove(&self.id);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[tokio::test]
    async fn guard_forgets_and_close_all_ends_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let set = Arc::new(ConnectionSet::new());

        let mut c1 = TcpStream::connect(addr).await.unwrap();
        let (s1, _) = listener.accept().await.unwrap();
        let (_s1, g1) = set.admit(s1).unwrap();

        let _c2 = TcpStream::connect(addr).await.unwrap();
        let (s2, _) = listener.accept().await.unwrap();
        let (s2, g2) = set.admit(s2).unwrap();
        assert_eq!(set.len(), 2);

        drop(s2);
        drop(g2);
        assert_eq!(set.len(), 1);

        let report = set.close_all();
        assert_eq!(report.closed, 1);
        assert!(report.errors.is_empty());
        assert!(set.is_empty());

        let mut buf = [0u8; 8];
        let n = c1.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "peer sees EOF");

        drop(g1);
    }
}

//! TCP listener lifecycle: bind, serve, stop.
//!
//! # Responsibilities
//! - Bind one socket for a (port, frontend) pair
//! - Accept connections and hand them to the protocol handler
//! - Track open connections so stop can close them
//! - Stop exactly once: close the socket, then every tracked connection
//!
//! # States
//! ```text
//! Bound/Serving → Stopped (terminal)
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::config::{FrontendKind, RowId};
use crate::lifecycle::CancelToken;
use crate::net::connection::ConnectionSet;

/// Pause after an accept error (e.g. fd exhaustion) before retrying.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("No listener bound on port {0}")]
    NotBound(u16),
}

/// Protocol handler invoked once per accepted connection.
pub type ConnectionHandler = Arc<dyn Fn(TcpStream, SocketAddr) -> BoxFuture<'static, ()> + Send + Sync>;

/// Outcome of `Listener::stop`.
#[derive(Debug, Default)]
pub struct StopReport {
    /// True when the listener had already been stopped.
    pub already_stopped: bool,
    /// Connections shut down by this stop.
    pub closed: usize,
    /// Individual close failures; none of them aborted the stop.
    pub errors: Vec<io::Error>,
}

/// A bound socket serving one frontend port.
#[derive(Debug)]
pub struct Listener {
    frontend: RowId,
    kind: FrontendKind,
    local_addr: SocketAddr,
    connections: Arc<ConnectionSet>,
    cancel: CancelToken,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Listener {
    /// Bind `addr` and start accepting connections into `handler`.
    pub async fn bind(
        addr: SocketAddr,
        frontend: RowId,
        kind: FrontendKind,
        handler: ConnectionHandler,
    ) -> Result<Arc<Self>, ListenerError> {
        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;
        let local_addr = inner
            .local_addr()
            .map_err(|source| ListenerError::Bind { addr, source })?;

        let connections = Arc::new(ConnectionSet::new());
        let cancel = CancelToken::new();
        let task = tokio::spawn(accept_loop(
            inner,
            connections.clone(),
            cancel.clone(),
            handler,
            frontend,
        ));

        tracing::info!(
            frontend = %frontend,
            kind = %kind,
            address = %local_addr,
            "Listener bound"
        );

        Ok(Arc::new(Self {
            frontend,
            kind,
            local_addr,
            connections,
            cancel,
            accept_task: Mutex::new(Some(task)),
            stopped: AtomicBool::new(false),
        }))
    }

    pub fn frontend(&self) -> RowId {
        self.frontend
    }

    pub fn kind(&self) -> FrontendKind {
        self.kind
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Close the socket, then every connection still open.
    ///
    /// Idempotent: only the first call does anything. Once the accept loop
    /// has exited no connection can be admitted, so every connection open
    /// when stop began is closed.
    pub async fn stop(&self) -> StopReport {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return StopReport {
                already_stopped: true,
                ..StopReport::default()
            };
        }

        self.cancel.cancel();
        let task = self.accept_task.lock().take();
        let mut errors = Vec::new();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(address = %self.local_addr, error = %e, "Accept loop ended abnormally");
                errors.push(io::Error::other(e));
            }
        }

        let closed = self.connections.close_all();
        errors.extend(closed.errors);

        tracing::info!(
            frontend = %self.frontend,
            address = %self.local_addr,
            closed_connections = closed.closed,
            close_errors = errors.len(),
            "Listener stopped"
        );

        StopReport {
            already_stopped: false,
            closed: closed.closed,
            errors,
        }
    }
}

async fn accept_loop(
    inner: TcpListener,
    connections: Arc<ConnectionSet>,
    cancel: CancelToken,
    handler: ConnectionHandler,
    frontend: RowId,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = inner.accept() => match accepted {
                Ok((stream, peer)) => {
                    let (stream, guard) = match connections.admit(stream) {
                        Ok(admitted) => admitted,
                        Err(e) => {
                            tracing::warn!(peer_addr = %peer, error = %e, "Failed to track connection");
                            continue;
                        }
                    };
                    tracing::debug!(
                        frontend = %frontend,
                        peer_addr = %peer,
                        connection_id = %guard.id(),
                        "Connection accepted"
                    );
                    let serve = handler(stream, peer);
                    tokio::spawn(async move {
                        serve.await;
                        drop(guard);
                    });
                }
                Err(e) => {
                    tracing::warn!(frontend = %frontend, error = %e, "Failed to accept");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }
    // Dropping `inner` closes the socket.
    drop(inner);
}

//! Port → listener bookkeeping shared by the socket-owning transports.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::{FrontendKind, RowId};
use crate::net::{ConnectionHandler, Listener, ListenerError, StopReport};
use crate::observability::metrics;

/// Listeners of one transport keyed by bound port.
#[derive(Debug, Default)]
pub struct PortRegistry {
    listeners: DashMap<u16, Arc<Listener>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn bind(
        &self,
        addr: SocketAddr,
        frontend: RowId,
        kind: FrontendKind,
        handler: ConnectionHandler,
    ) -> Result<Arc<Listener>, ListenerError> {
        let listener = Listener::bind(addr, frontend, kind, handler).await?;
        self.listeners.insert(listener.port(), listener.clone());
        metrics::record_listener_started(kind.as_str());
        Ok(listener)
    }

    /// Stop and forget the listener bound on `port`.
    pub async fn remove_port(&self, port: u16) -> Result<StopReport, ListenerError> {
        let (_, listener) = self
            .listeners
            .remove(&port)
            .ok_or(ListenerError::NotBound(port))?;
        Ok(self.stop(&listener).await)
    }

    /// Stop `listener`, forgetting it if it is still the one on its port.
    pub async fn release(&self, listener: &Arc<Listener>) -> StopReport {
        self.listeners
            .remove_if(&listener.port(), |_, current| Arc::ptr_eq(current, listener));
        self.stop(listener).await
    }

    async fn stop(&self, listener: &Arc<Listener>) -> StopReport {
        let report = listener.stop().await;
        if !report.already_stopped {
            metrics::record_listener_stopped(listener.kind().as_str());
        }
        report
    }

    pub fn get(&self, port: u16) -> Option<Arc<Listener>> {
        self.listeners.get(&port).map(|entry| entry.value().clone())
    }

    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.listeners.iter().map(|entry| *entry.key()).collect();
        ports.sort_unstable();
        ports
    }
}

//! Protocol transports driven by the reconciler.
//!
//! # Data Flow
//! ```text
//! Reconciler
//!     → Transports::add_port(kind, addr, upstreams)
//!         http.rs → Listener + axum router (forward to pool)
//!         tcp.rs  → Listener + byte splice (forward to pool)
//!         udp.rs  → no-op
//!     → Transports::release(listener) on removal
//! ```
//!
//! # Design Decisions
//! - Every socket-owning transport keeps a port registry (registry.rs)
//! - Handlers resolve pools through `Upstreams`, never through the frontend

pub mod http;
pub mod registry;
pub mod tcp;
pub mod udp;

use std::net::SocketAddr;
use std::sync::Arc;

pub use http::HttpTransport;
pub use registry::PortRegistry;
pub use tcp::TcpTransport;
pub use udp::UdpTransport;

use crate::config::FrontendKind;
use crate::model::Upstreams;
use crate::net::{Listener, ListenerError, StopReport};

#[derive(Default)]
pub struct Transports {
    http: HttpTransport,
    tcp: TcpTransport,
    udp: UdpTransport,
}

impl Transports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn http(&self) -> &HttpTransport {
        &self.http
    }

    pub fn tcp(&self) -> &TcpTransport {
        &self.tcp
    }

    /// Open `addr` for a frontend of type `kind`. UDP binds nothing and
    /// yields no listener.
    pub async fn add_port(
        &self,
        kind: FrontendKind,
        addr: SocketAddr,
        upstreams: Arc<Upstreams>,
    ) -> Result<Option<Arc<Listener>>, ListenerError> {
        match kind {
            FrontendKind::Http => self.http.add_port(addr, upstreams).await.map(Some),
            FrontendKind::Tcp => self.tcp.add_port(addr, upstreams).await.map(Some),
            FrontendKind::Udp => {
                self.udp.add_port(addr);
                Ok(None)
            }
        }
    }

    pub async fn remove_port(&self, kind: FrontendKind, port: u16) -> Result<StopReport, ListenerError> {
        match kind {
            FrontendKind::Http => self.http.remove_port(port).await,
            FrontendKind::Tcp => self.tcp.remove_port(port).await,
            FrontendKind::Udp => Ok(self.udp.remove_port(port)),
        }
    }

    /// Stop a listener obtained from `add_port`.
    pub async fn release(&self, listener: &Arc<Listener>) -> StopReport {
        match listener.kind() {
            FrontendKind::Http => self.http.registry().release(listener).await,
            FrontendKind::Tcp => self.tcp.registry().release(listener).await,
            FrontendKind::Udp => listener.stop().await,
        }
    }
}

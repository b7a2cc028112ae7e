//! TCP transport: splice each client connection to a selected backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::copy_bidirectional;
use tokio::net::TcpStream;
use tokio::time;

use crate::config::FrontendKind;
use crate::model::Upstreams;
use crate::net::{ConnectionHandler, Listener, ListenerError, StopReport};
use crate::transport::registry::PortRegistry;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct TcpTransport {
    ports: PortRegistry,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting TCP on `addr` for `upstreams`.
    pub async fn add_port(
        &self,
        addr: SocketAddr,
        upstreams: Arc<Upstreams>,
    ) -> Result<Arc<Listener>, ListenerError> {
        let frontend = upstreams.frontend();
        self.ports
            .bind(addr, frontend, FrontendKind::Tcp, connection_handler(upstreams))
            .await
    }

    pub async fn remove_port(&self, port: u16) -> Result<StopReport, ListenerError> {
        self.ports.remove_port(port).await
    }

    pub fn registry(&self) -> &PortRegistry {
        &self.ports
    }
}

fn connection_handler(upstreams: Arc<Upstreams>) -> ConnectionHandler {
    Arc::new(move |mut inbound: TcpStream, peer: SocketAddr| -> BoxFuture<'static, ()> {
        let upstreams = upstreams.clone();
        Box::pin(async move {
            let request = match upstreams.route(peer) {
                Ok(r) => r,
                Err(_) => {
                    tracing::warn!(frontend = %upstreams.frontend(), peer_addr = %peer, "No healthy backends, dropping connection");
                    return;
                }
            };

            let mut outbound = match time::timeout(CONNECT_TIMEOUT, TcpStream::connect(request.backend)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    tracing::warn!(backend = %request.backend, error = %e, "Backend connect failed");
                    return;
                }
                Err(_) => {
                    tracing::warn!(backend = %request.backend, "Backend connect timed out");
                    return;
                }
            };

            match copy_bidirectional(&mut inbound, &mut outbound).await {
                Ok((to_backend, to_client)) => tracing::debug!(
                    peer_addr = %peer,
                    backend = %request.backend,
                    to_backend,
                    to_client,
                    "TCP session finished"
                ),
                Err(e) => tracing::debug!(peer_addr = %peer, error = %e, "TCP session ended with error"),
            }
        })
    })
}

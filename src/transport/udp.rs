//! UDP transport placeholder.
//!
//! Datagram frontends are served entirely by the datagram collaborator;
//! this layer binds nothing and has nothing to stop.

use std::net::SocketAddr;

use crate::net::StopReport;

#[derive(Debug, Default)]
pub struct UdpTransport;

impl UdpTransport {
    pub fn add_port(&self, addr: SocketAddr) {
        tracing::debug!(address = %addr, "UDP port left to the datagram handler");
    }

    pub fn remove_port(&self, port: u16) -> StopReport {
        tracing::debug!(port, "UDP port release is a no-op");
        StopReport::default()
    }
}

//! Per-request dispatch context.

use std::net::SocketAddr;

use crate::config::{FrontendKind, RowId};

/// Everything the data plane knows about one inbound request once a
/// server has been selected.
///
/// Frontend, pool and server are identifiers into the active tree, not
/// references; the request never keeps configuration alive.
#[derive(Debug)]
pub struct LbRequest<P> {
    pub kind: FrontendKind,
    pub frontend: RowId,
    /// Index of the pool inside the frontend.
    pub pool: usize,
    /// Index of the server inside the pool.
    pub server: usize,
    pub backend: SocketAddr,
    /// Sequence number drawn from the pool's shared counter.
    pub sequence: u64,
    /// Protocol-specific handle (HTTP request, peer address, ...).
    pub payload: P,
}

impl<P> LbRequest<P> {
    pub fn into_payload(self) -> P {
        self.payload
    }
}

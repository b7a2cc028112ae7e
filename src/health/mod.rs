//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs), one task per frontend:
//!     Periodic timer
//!     → Probe each backend (probe.rs), outside any lock
//!     → ServerPool::apply_health under the write lock
//!
//! State machine (model/state.rs):
//!     Healthy ←→ Unhealthy
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Every monitor owns a cancellation token; stopping a frontend fires it
//! - HTTP frontends probe with GET, TCP/UDP frontends with a TCP connect
//! - Health state is per-backend, not per-pool

pub mod active;
pub mod probe;

use std::sync::Arc;

pub use active::{HealthHandle, HealthMonitor};
pub use probe::{HttpProbe, Probe, TcpProbe};

use crate::config::{FrontendKind, HealthCheckConfig};

/// Probe matching a frontend's transport.
pub fn probe_for(kind: FrontendKind, config: &HealthCheckConfig) -> Arc<dyn Probe> {
    match kind {
        FrontendKind::Http => Arc::new(HttpProbe::new(config.path.clone())),
        FrontendKind::Tcp | FrontendKind::Udp => Arc::new(TcpProbe),
    }
}

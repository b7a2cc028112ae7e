//! Per-pool counters and per-backend health bookkeeping.
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy → Healthy: consecutive successes >= healthy_threshold
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping
//! - Records are plain data; the owning pool's lock guards them

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by everything dispatching into one pool.
///
/// Recreated with the pool on every reload.
#[derive(Debug, Default)]
pub struct SharedLbState {
    requests: AtomicU64,
}

impl SharedLbState {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn starting_at(requests: u64) -> Self {
        Self {
            requests: AtomicU64::new(requests),
        }
    }

    /// Count one request, returning the sequence number it was given.
    /// Wraps on overflow.
    pub fn record_request(&self) -> u64 {
        self.requests.fetch_add(1, Ordering::Relaxed)
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

/// A backend plus its health-check derived status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveServer {
    pub name: String,
    pub addr: SocketAddr,
    pub healthy: bool,
    pub successive_failures: u32,
    pub successive_successes: u32,
}

impl LiveServer {
    /// New servers start healthy so traffic flows before the first probe.
    pub fn new(name: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            addr,
            healthy: true,
            successive_failures: 0,
            successive_successes: 0,
        }
    }

    /// Record a passed probe. Returns true when the server became healthy.
    pub fn record_success(&mut self, healthy_threshold: u32) -> bool {
        self.successive_failures = 0;
        self.successive_successes = self.successive_successes.saturating_add(1);

        if !self.healthy && self.successive_successes >= healthy_threshold {
            self.healthy = true;
            return true;
        }
        false
    }

    /// Record a failed probe. Returns true when the server became unhealthy.
    pub fn record_failure(&mut self, unhealthy_threshold: u32) -> bool {
        self.successive_successes = 0;
        self.successive_failures = self.successive_failures.saturating_add(1);

        if self.healthy && self.successive_failures >= unhealthy_threshold {
            self.healthy = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> LiveServer {
        LiveServer::new("b1", "127.0.0.1:3000".parse().unwrap())
    }

    #[test]
    fn failures_flip_after_threshold() {
        let mut s = server();
        assert!(!s.record_failure(3));
        assert!(!s.record_failure(3));
        assert!(s.healthy);
        assert!(s.record_failure(3));
        assert!(!s.healthy);
        assert_eq!(s.successive_failures, 3);
    }

    #[test]
    fn success_resets_failure_streak() {
        let mut s = server();
        s.record_failure(3);
        s.record_failure(3);
        s.record_success(2);
        assert_eq!(s.successive_failures, 0);
        s.record_failure(3);
        assert!(s.healthy, "streak restarted");
    }

    #[test]
    fn recovery_needs_consecutive_successes() {
        let mut s = server();
        s.record_failure(1);
        assert!(!s.healthy);
        assert!(!s.record_success(2));
        s.record_failure(1);
        assert!(!s.record_success(2));
        assert!(s.record_success(2));
        assert!(s.healthy);
    }

    #[test]
    fn counter_wraps() {
        let state = SharedLbState::starting_at(u64::MAX);
        assert_eq!(state.record_request(), u64::MAX);
        assert_eq!(state.requests(), 0);
    }
}

//! Server pools: live servers behind one read/write lock plus shared counters.
//!
//! # Responsibilities
//! - Hold the `LiveServer` records of one pool
//! - Serve dispatch reads concurrently (read lock)
//! - Apply health results atomically per record (write lock)

use std::net::SocketAddr;

use parking_lot::RwLock;

use crate::config::ServerPoolConfig;
use crate::model::state::{LiveServer, SharedLbState};

/// Server chosen by a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Index of the server inside its pool.
    pub server: usize,
    pub addr: SocketAddr,
    /// Request sequence number drawn from the pool counter.
    pub sequence: u64,
}

/// Health transition produced by `apply_health`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthTransition {
    pub addr: SocketAddr,
    pub healthy: bool,
}

#[derive(Debug)]
pub struct ServerPool {
    name: String,
    servers: RwLock<Vec<LiveServer>>,
    shared: SharedLbState,
}

impl ServerPool {
    /// Build a fresh pool with zeroed counters.
    pub fn new(name: impl Into<String>, servers: Vec<LiveServer>) -> Self {
        Self {
            name: name.into(),
            servers: RwLock::new(servers),
            shared: SharedLbState::new(),
        }
    }

    pub fn from_config(config: &ServerPoolConfig) -> Self {
        let servers = config
            .backends
            .iter()
            .map(|b| LiveServer::new(b.name.clone(), b.address))
            .collect();
        Self::new(config.name.clone(), servers)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shared(&self) -> &SharedLbState {
        &self.shared
    }

    pub fn len(&self) -> usize {
        self.servers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pick the next healthy server in rotation and count the request.
    ///
    /// The rotation is driven by the pool's request counter. Both happen
    /// under the read lock, so a concurrent health update is never seen
    /// half-applied.
    pub fn dispatch(&self) -> Option<Selection> {
        let servers = self.servers.read();
        if servers.is_empty() {
            return None;
        }

        let sequence = self.shared.record_request();
        let len = servers.len();
        let start = (sequence % len as u64) as usize;

        (0..len)
            .map(|i| (start + i) % len)
            .find(|&i| servers[i].healthy)
            .map(|i| Selection {
                server: i,
                addr: servers[i].addr,
                sequence,
            })
    }

    /// Addresses to probe, in server order.
    pub fn probe_targets(&self) -> Vec<SocketAddr> {
        self.servers.read().iter().map(|s| s.addr).collect()
    }

    /// Apply one probe round, `results[i]` belonging to server `i`.
    pub fn apply_health(
        &self,
        results: &[bool],
        healthy_threshold: u32,
        unhealthy_threshold: u32,
    ) -> Vec<HealthTransition> {
        let mut servers = self.servers.write();
        let mut transitions = Vec::new();

        for (server, &passed) in servers.iter_mut().zip(results) {
            let flipped = if passed {
                server.record_success(healthy_threshold)
            } else {
                server.record_failure(unhealthy_threshold)
            };
            if flipped {
                transitions.push(HealthTransition {
                    addr: server.addr,
                    healthy: server.healthy,
                });
            }
        }
        transitions
    }

    /// Copy of the current records.
    pub fn snapshot(&self) -> Vec<LiveServer> {
        self.servers.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pool(n: u16) -> ServerPool {
        let servers = (0..n)
            .map(|i| LiveServer::new(format!("b{i}"), SocketAddr::from(([127, 0, 0, 1], 3000 + i))))
            .collect();
        ServerPool::new("web", servers)
    }

    #[test]
    fn rotates_and_counts() {
        let pool = pool(2);
        let a = pool.dispatch().unwrap();
        let b = pool.dispatch().unwrap();
        let c = pool.dispatch().unwrap();
        assert_eq!((a.server, b.server, c.server), (0, 1, 0));
        assert_eq!(pool.shared().requests(), 3);
    }

    #[test]
    fn skips_unhealthy_servers() {
        let pool = pool(3);
        let transitions = pool.apply_health(&[true, false, true], 1, 1);
        assert_eq!(transitions.len(), 1);
        assert!(!transitions[0].healthy);

        for _ in 0..6 {
            assert_ne!(pool.dispatch().unwrap().server, 1);
        }
    }

    #[test]
    fn all_unhealthy_yields_none() {
        let pool = pool(2);
        pool.apply_health(&[false, false], 1, 1);
        assert!(pool.dispatch().is_none());
        assert!(ServerPool::new("empty", Vec::new()).dispatch().is_none());
    }

    #[test]
    fn readers_never_see_torn_records() {
        let pool = Arc::new(pool(4));
        let writer = {
            let pool = pool.clone();
            std::thread::spawn(move || {
                for round in 0..2_000 {
                    let passed = round % 2 == 0;
                    pool.apply_health(&[passed; 4], 1, 1);
                }
            })
        };

        for _ in 0..2_000 {
            for s in pool.snapshot() {
                // Each update touches healthy and both streaks together.
                if s.healthy {
                    assert_eq!(s.successive_failures, 0);
                } else {
                    assert_eq!(s.successive_successes, 0);
                    assert!(s.successive_failures >= 1);
                }
            }
        }
        writer.join().unwrap();
    }
}

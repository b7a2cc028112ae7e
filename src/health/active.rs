//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend of one frontend
//! - Apply results to the pools under their write lock
//! - Exit when the frontend's cancellation token fires

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::{HealthCheckConfig, RowId};
use crate::lifecycle::CancelToken;
use crate::model::ServerPool;
use crate::health::probe::Probe;
use crate::observability::metrics;

/// Handle to a running monitor. Cancelling or dropping it ends the task.
#[derive(Debug)]
pub struct HealthHandle {
    cancel: CancelToken,
    task: JoinHandle<()>,
}

impl HealthHandle {
    /// Signal the task to stop at its next iteration boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "Health monitor ended abnormally");
        }
    }
}

impl Drop for HealthHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct HealthMonitor {
    frontend: RowId,
    pools: Vec<Arc<ServerPool>>,
    probe: Arc<dyn Probe>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(
        frontend: RowId,
        pools: Vec<Arc<ServerPool>>,
        probe: Arc<dyn Probe>,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            frontend,
            pools,
            probe,
            config,
        }
    }

    /// Start the monitor on the runtime.
    pub fn spawn(self) -> HealthHandle {
        let cancel = CancelToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        HealthHandle { cancel, task }
    }

    pub async fn run(self, cancel: CancelToken) {
        if !self.config.enabled {
            tracing::info!(frontend = %self.frontend, "Active health checks disabled");
            return;
        }

        tracing::info!(
            frontend = %self.frontend,
            interval_ms = self.config.interval_ms,
            pools = self.pools.len(),
            "Health monitor starting"
        );

        let interval = Duration::from_millis(self.config.interval_ms.max(1));
        let mut ticker = time::interval_at(Instant::now() + start_jitter(interval), interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = cancel.cancelled() => {
                    tracing::info!(frontend = %self.frontend, "Health monitor cancelled, exiting loop");
                    break;
                }
            }
        }
    }

    async fn check_all(&self) {
        let timeout = Duration::from_millis(self.config.timeout_ms);

        for pool in &self.pools {
            let targets = pool.probe_targets();
            let results = join_all(targets.iter().map(|&addr| self.probe.check(addr, timeout))).await;

            let transitions = pool.apply_health(
                &results,
                self.config.healthy_threshold,
                self.config.unhealthy_threshold,
            );
            for t in &transitions {
                tracing::info!(
                    frontend = %self.frontend,
                    pool = %pool.name(),
                    addr = %t.addr,
                    healthy = t.healthy,
                    "Backend health changed"
                );
            }
            for (addr, healthy) in targets.iter().zip(&results) {
                metrics::record_backend_health(addr, *healthy);
            }
        }
    }
}

/// Spread the first probe of each frontend over the first tenth of an interval.
fn start_jitter(interval: Duration) -> Duration {
    let range = interval.as_millis() as u64 / 10;
    if range == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use futures_util::future::BoxFuture;

    use crate::model::LiveServer;

    #[derive(Default)]
    struct Scripted {
        passing: AtomicBool,
        calls: AtomicUsize,
    }

    impl Probe for Scripted {
        fn check(&self, _addr: SocketAddr, _timeout: Duration) -> BoxFuture<'_, bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let passing = self.passing.load(Ordering::SeqCst);
            Box::pin(async move { passing })
        }
    }

    fn config() -> HealthCheckConfig {
        HealthCheckConfig {
            interval_ms: 10,
            unhealthy_threshold: 2,
            healthy_threshold: 1,
            ..HealthCheckConfig::default()
        }
    }

    fn pool() -> Arc<ServerPool> {
        Arc::new(ServerPool::new(
            "web",
            vec![LiveServer::new("b1", "127.0.0.1:3000".parse().unwrap())],
        ))
    }

    async fn wait_for(mut f: impl FnMut() -> bool) {
        for _ in 0..200 {
            if f() {
                return;
            }
            time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn marks_unhealthy_then_recovers() {
        let pool = pool();
        let probe = Arc::new(Scripted::default());
        let handle = HealthMonitor::new(RowId(1), vec![pool.clone()], probe.clone(), config()).spawn();

        wait_for(|| !pool.snapshot()[0].healthy).await;
        probe.passing.store(true, Ordering::SeqCst);
        wait_for(|| pool.snapshot()[0].healthy).await;

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn cancellation_stops_probing() {
        let probe = Arc::new(Scripted::default());
        let handle = HealthMonitor::new(RowId(1), vec![pool()], probe.clone(), config()).spawn();
        wait_for(|| probe.calls.load(Ordering::SeqCst) > 0).await;

        handle.cancel();
        wait_for(|| handle.is_finished()).await;
        let calls = probe.calls.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn disabled_monitor_exits() {
        let mut config = config();
        config.enabled = false;
        let handle = HealthMonitor::new(RowId(1), vec![pool()], Arc::new(Scripted::default()), config).spawn();
        wait_for(|| handle.is_finished()).await;
    }
}

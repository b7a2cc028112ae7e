//! Reconciliation engine.
//!
//! # Data Flow
//! ```text
//! Reconciler::activate(desired)
//!     → acquire activation lock (one activation at a time, FIFO)
//!     → Frontend::initialize for every desired frontend (fresh pools)
//!     → validate (pool cardinality, unique RowIDs); abort before side effects
//!     → first activation: bind every port, spawn health, install
//!     → otherwise plan.rs diff by RowID:
//!         removed  → stop listeners, cancel health
//!         retained → adopt runtime (sockets kept), stop dropped ports
//!         added    → bind ports, spawn health
//!         retained → bind new ports, restart health on the new pools
//!     → install desired as active, release lock
//! ```
//!
//! # Design Decisions
//! - The lock is owned by each `Reconciler`, so instances are independent
//! - Reloads are best-effort: bind failures after validation are reported
//!   in `ActivationReport`, never rolled back
//! - A first activation that fails to bind aborts and leaves already bound
//!   listeners open; `shutdown` sweeps them

pub mod plan;
pub mod report;

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

pub use plan::{plan, port_changes, Plan};
pub use report::{ActivationError, ActivationReport, Outcome, PortFailure};

use crate::config::validation::validate_frontends;
use crate::config::{HealthCheckConfig, LbConfig, RowId};
use crate::health::{probe_for, HealthMonitor};
use crate::model::{ActiveConfig, Frontend, ServerPool};
use crate::net::{Listener, ListenerError, StopReport};
use crate::observability::metrics;
use crate::transport::Transports;

#[derive(Default)]
struct EngineState {
    active: Option<ActiveConfig>,
    generation: u64,
}

/// Applies desired configurations against the running one.
pub struct Reconciler {
    state: Mutex<EngineState>,
    transports: Transports,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::with_transports(Transports::new())
    }

    pub fn with_transports(transports: Transports) -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            transports,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn transports(&self) -> &Transports {
        &self.transports
    }

    /// Reconcile the running configuration (if any) with `desired`.
    ///
    /// An error means either nothing was touched (validation) or a first
    /// activation stopped midway. A successful report may still list
    /// failures; inspect `outcome()`.
    pub async fn activate(&self, desired: LbConfig) -> Result<ActivationReport, ActivationError> {
        let mut state = self.state.lock().await;
        let _critical = InFlight::enter(&self.in_flight, &self.peak_in_flight);

        state.generation += 1;
        let generation = state.generation;
        let span = tracing::info_span!("activate", activation_id = %Uuid::new_v4(), generation);

        let result = self
            .apply(&mut state.active, desired, generation)
            .instrument(span)
            .await;

        match &result {
            Ok(report) => {
                metrics::record_activation(report.outcome().as_str());
                tracing::info!(
                    generation,
                    outcome = report.outcome().as_str(),
                    added = report.added.len(),
                    removed = report.removed.len(),
                    retained = report.retained.len(),
                    failures = report.failures.len(),
                    "Activation complete"
                );
            }
            Err(e) => {
                metrics::record_activation("rejected");
                tracing::error!(generation, error = %e, "Activation failed");
            }
        }
        result
    }

    async fn apply(
        &self,
        active: &mut Option<ActiveConfig>,
        desired: LbConfig,
        generation: u64,
    ) -> Result<ActivationReport, ActivationError> {
        let frontends = desired
            .frontends
            .iter()
            .map(Frontend::initialize)
            .collect::<Result<Vec<_>, _>>()?;
        validate_frontends(&desired.frontends)?;

        let next = ActiveConfig {
            listen_host: desired.listen_host,
            health_check: desired.health_check,
            frontends,
        };
        let mut report = ActivationReport {
            generation,
            ..ActivationReport::default()
        };

        if let Some(running) = active.as_mut() {
            self.reconcile(running, next, &mut report).await;
        } else {
            self.first_activation(&next).await?;
            report.added = next.frontends.iter().map(Frontend::row_id).collect();
            *active = Some(next);
        }
        Ok(report)
    }

    async fn first_activation(&self, next: &ActiveConfig) -> Result<(), ActivationError> {
        for frontend in &next.frontends {
            for &port in frontend.ports() {
                if frontend.listener(port).is_some() {
                    continue;
                }
                self.bind_port(frontend, next.listen_host, port)
                    .await
                    .map_err(|source| ActivationError::Listen {
                        frontend: frontend.row_id(),
                        port,
                        source,
                    })?;
            }
            self.start_health(frontend, &next.health_check);
        }
        Ok(())
    }

    async fn reconcile(&self, running: &mut ActiveConfig, mut next: ActiveConfig, report: &mut ActivationReport) {
        let plan = plan(&running.frontends, &next.frontends);
        let host = next.listen_host;
        let rebind_all = running.listen_host != host;

        for &(d, r) in &plan.retained {
            next.frontends[d].adopt(&running.frontends[r]);
        }

        for &r in &plan.removed {
            let frontend = &running.frontends[r];
            self.stop_frontend(frontend).await;
            report.removed.push(frontend.row_id());
        }

        let mut pending = Vec::with_capacity(plan.retained.len());
        for &(d, _) in &plan.retained {
            let frontend = &next.frontends[d];
            let bound = frontend.bound_ports();
            let (stop, bind) = if rebind_all {
                (bound, frontend.ports().to_vec())
            } else {
                port_changes(&bound, frontend.ports())
            };
            for port in stop {
                if let Some(listener) = frontend.runtime().take_listener(port) {
                    let stopped = self.transports.release(&listener).await;
                    log_stop(frontend.row_id(), &listener, &stopped);
                }
            }
            pending.push((d, bind));
            report.retained.push(frontend.row_id());
        }

        for &d in &plan.added {
            let frontend = &next.frontends[d];
            self.bind_ports(frontend, frontend.ports(), host, report).await;
            self.start_health(frontend, &next.health_check);
            report.added.push(frontend.row_id());
        }

        for (d, bind) in pending {
            let frontend = &next.frontends[d];
            self.bind_ports(frontend, &bind, host, report).await;
            self.start_health(frontend, &next.health_check);
        }

        *running = next;
    }

    async fn bind_port(&self, frontend: &Frontend, host: IpAddr, port: u16) -> Result<(), ListenerError> {
        let addr = SocketAddr::new(host, port);
        let upstreams = frontend.runtime().upstreams().clone();
        if let Some(listener) = self.transports.add_port(frontend.kind(), addr, upstreams).await? {
            frontend.runtime().insert_listener(port, listener);
        }
        Ok(())
    }

    /// Bind each port, recording failures instead of stopping.
    async fn bind_ports(&self, frontend: &Frontend, ports: &[u16], host: IpAddr, report: &mut ActivationReport) {
        for &port in ports {
            if frontend.listener(port).is_some() {
                continue;
            }
            if let Err(e) = self.bind_port(frontend, host, port).await {
                tracing::error!(frontend = %frontend.row_id(), port, error = %e, "Failed to start listener");
                report.failures.push(PortFailure {
                    frontend: frontend.row_id(),
                    port,
                    error: e.to_string(),
                });
            }
        }
    }

    fn start_health(&self, frontend: &Frontend, config: &HealthCheckConfig) {
        let monitor = HealthMonitor::new(
            frontend.row_id(),
            frontend.pools().to_vec(),
            probe_for(frontend.kind(), config),
            config.clone(),
        );
        if let Some(previous) = frontend.runtime().replace_health(Some(monitor.spawn())) {
            previous.cancel();
        }
    }

    async fn stop_frontend(&self, frontend: &Frontend) {
        if let Some(health) = frontend.runtime().replace_health(None) {
            health.cancel();
        }
        for (_, listener) in frontend.runtime().take_listeners() {
            let stopped = self.transports.release(&listener).await;
            log_stop(frontend.row_id(), &listener, &stopped);
        }
    }

    /// Stop every listener and health task and forget the active config.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let Some(active) = state.active.take() {
            for frontend in &active.frontends {
                self.stop_frontend(frontend).await;
            }
        }

        // Listeners left behind by an aborted first activation.
        for registry in [self.transports.http().registry(), self.transports.tcp().registry()] {
            for port in registry.ports() {
                if let Err(e) = registry.remove_port(port).await {
                    tracing::debug!(port, error = %e, "Listener already gone");
                }
            }
        }
        tracing::info!("Reconciler shut down");
    }

    pub async fn is_active(&self) -> bool {
        self.state.lock().await.active.is_some()
    }

    /// RowIDs of the active frontends in authored order.
    pub async fn row_ids(&self) -> Vec<RowId> {
        let state = self.state.lock().await;
        state
            .active
            .as_ref()
            .map(|a| a.frontends.iter().map(Frontend::row_id).collect())
            .unwrap_or_default()
    }

    pub async fn listener(&self, row_id: RowId, port: u16) -> Option<Arc<Listener>> {
        let state = self.state.lock().await;
        state.active.as_ref()?.frontend(row_id)?.listener(port)
    }

    pub async fn pools(&self, row_id: RowId) -> Option<Vec<Arc<ServerPool>>> {
        let state = self.state.lock().await;
        Some(state.active.as_ref()?.frontend(row_id)?.pools().to_vec())
    }

    /// Highest number of activations ever observed inside the critical
    /// section at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

fn log_stop(frontend: RowId, listener: &Listener, report: &StopReport) {
    for e in &report.errors {
        tracing::warn!(
            frontend = %frontend,
            address = %listener.local_addr(),
            error = %e,
            "Error while stopping listener"
        );
    }
}

struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

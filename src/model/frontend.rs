//! Activated frontends and the configuration tree they form.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::config::{parse_ports, FrontendConfig, FrontendKind, HealthCheckConfig, RowId, ValidationError};
use crate::health::HealthHandle;
use crate::model::pool::ServerPool;
use crate::model::request::LbRequest;
use crate::net::Listener;

/// The pool set a frontend's listeners dispatch into.
///
/// Listeners hold this rather than the frontend, so a reload can swap in
/// freshly built pools under a live socket.
#[derive(Debug)]
pub struct Upstreams {
    frontend: RowId,
    kind: FrontendKind,
    pools: ArcSwap<Vec<Arc<ServerPool>>>,
}

impl Upstreams {
    pub fn new(frontend: RowId, kind: FrontendKind, pools: Vec<Arc<ServerPool>>) -> Self {
        Self {
            frontend,
            kind,
            pools: ArcSwap::from_pointee(pools),
        }
    }

    /// A pool-less target, used by ports bound outside any frontend.
    pub fn detached(kind: FrontendKind) -> Self {
        Self::new(RowId(0), kind, Vec::new())
    }

    pub fn frontend(&self) -> RowId {
        self.frontend
    }

    pub fn kind(&self) -> FrontendKind {
        self.kind
    }

    pub fn pools(&self) -> Arc<Vec<Arc<ServerPool>>> {
        self.pools.load_full()
    }

    pub fn has_pools(&self) -> bool {
        !self.pools.load().is_empty()
    }

    pub fn replace(&self, pools: Vec<Arc<ServerPool>>) {
        self.pools.store(Arc::new(pools));
    }

    /// Select a server for `payload` from the first pool that has a
    /// healthy one. Hands the payload back when none does.
    pub fn route<P>(&self, payload: P) -> Result<LbRequest<P>, P> {
        let pools = self.pools.load();
        for (index, pool) in pools.iter().enumerate() {
            if let Some(selection) = pool.dispatch() {
                return Ok(LbRequest {
                    kind: self.kind,
                    frontend: self.frontend,
                    pool: index,
                    server: selection.server,
                    backend: selection.addr,
                    sequence: selection.sequence,
                    payload,
                });
            }
        }
        Err(payload)
    }
}

/// Runtime state carried across reloads for a frontend whose RowID survives.
#[derive(Debug)]
pub struct FrontendRuntime {
    upstreams: Arc<Upstreams>,
    listeners: Mutex<BTreeMap<u16, Arc<Listener>>>,
    health: Mutex<Option<HealthHandle>>,
}

impl FrontendRuntime {
    fn new(upstreams: Upstreams) -> Self {
        Self {
            upstreams: Arc::new(upstreams),
            listeners: Mutex::new(BTreeMap::new()),
            health: Mutex::new(None),
        }
    }

    pub fn upstreams(&self) -> &Arc<Upstreams> {
        &self.upstreams
    }

    pub fn insert_listener(&self, port: u16, listener: Arc<Listener>) {
        self.listeners.lock().insert(port, listener);
    }

    pub fn take_listener(&self, port: u16) -> Option<Arc<Listener>> {
        self.listeners.lock().remove(&port)
    }

    pub fn take_listeners(&self) -> Vec<(u16, Arc<Listener>)> {
        std::mem::take(&mut *self.listeners.lock()).into_iter().collect()
    }

    /// Install a new health task, returning the one it replaces.
    pub fn replace_health(&self, handle: Option<HealthHandle>) -> Option<HealthHandle> {
        std::mem::replace(&mut *self.health.lock(), handle)
    }
}

/// A frontend of the active configuration.
#[derive(Debug)]
pub struct Frontend {
    row_id: RowId,
    kind: FrontendKind,
    ports: Vec<u16>,
    pools: Vec<Arc<ServerPool>>,
    runtime: Arc<FrontendRuntime>,
}

impl Frontend {
    /// Build runtime structures for an authored frontend: parsed ports,
    /// fresh pools with zeroed counters and an empty listener map.
    pub fn initialize(config: &FrontendConfig) -> Result<Self, ValidationError> {
        let ports = parse_ports(&config.ports)?;
        let pools: Vec<Arc<ServerPool>> = config
            .server_pools
            .iter()
            .map(|p| Arc::new(ServerPool::from_config(p)))
            .collect();
        let upstreams = Upstreams::new(config.row_id, config.kind, pools.clone());

        Ok(Self {
            row_id: config.row_id,
            kind: config.kind,
            ports,
            pools,
            runtime: Arc::new(FrontendRuntime::new(upstreams)),
        })
    }

    /// Take over the runtime of the frontend this one replaces. Its
    /// listeners keep their sockets and start dispatching into our pools.
    pub fn adopt(&mut self, previous: &Frontend) {
        self.runtime = previous.runtime.clone();
        self.runtime.upstreams.replace(self.pools.clone());
    }

    pub fn row_id(&self) -> RowId {
        self.row_id
    }

    pub fn kind(&self) -> FrontendKind {
        self.kind
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn pools(&self) -> &[Arc<ServerPool>] {
        &self.pools
    }

    pub fn runtime(&self) -> &Arc<FrontendRuntime> {
        &self.runtime
    }

    pub fn listener(&self, port: u16) -> Option<Arc<Listener>> {
        self.runtime.listeners.lock().get(&port).cloned()
    }

    /// Declared ports with a bound listener.
    pub fn bound_ports(&self) -> Vec<u16> {
        self.runtime.listeners.lock().keys().copied().collect()
    }
}

/// The configuration currently serving traffic.
#[derive(Debug)]
pub struct ActiveConfig {
    pub listen_host: IpAddr,
    pub health_check: HealthCheckConfig,
    pub frontends: Vec<Frontend>,
}

impl ActiveConfig {
    pub fn frontend(&self, row_id: RowId) -> Option<&Frontend> {
        self.frontends.iter().find(|f| f.row_id == row_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerPoolConfig;

    fn config() -> FrontendConfig {
        FrontendConfig::new(3, FrontendKind::Http, "8080,8081")
            .with_pool(ServerPoolConfig::new("a"))
            .with_pool(ServerPoolConfig::new("b").with_backend("b1", "127.0.0.1:3000".parse().unwrap()))
    }

    #[test]
    fn initialize_builds_fresh_runtime() {
        let fe = Frontend::initialize(&config()).unwrap();
        assert_eq!(fe.ports(), &[8080, 8081]);
        assert_eq!(fe.pools().len(), 2);
        assert!(fe.bound_ports().is_empty());
        assert_eq!(fe.pools()[1].shared().requests(), 0);
    }

    #[test]
    fn route_falls_through_empty_pools() {
        let fe = Frontend::initialize(&config()).unwrap();
        let request = fe.runtime().upstreams().route("payload").unwrap();
        assert_eq!(request.pool, 1);
        assert_eq!(request.frontend, RowId(3));
        assert_eq!(request.backend, "127.0.0.1:3000".parse().unwrap());
    }

    #[test]
    fn detached_upstreams_return_payload() {
        let upstreams = Upstreams::detached(FrontendKind::Tcp);
        assert!(!upstreams.has_pools());
        assert_eq!(upstreams.route(7).unwrap_err(), 7);
    }

    #[test]
    fn adopt_swaps_pools_into_shared_runtime() {
        let old = Frontend::initialize(&config()).unwrap();
        let mut new = Frontend::initialize(&config()).unwrap();
        new.adopt(&old);

        assert!(Arc::ptr_eq(old.runtime(), new.runtime()));
        let live = old.runtime().upstreams().pools();
        assert!(Arc::ptr_eq(&live[1], &new.pools()[1]));
        assert!(!Arc::ptr_eq(&live[1], &old.pools()[1]));
    }
}

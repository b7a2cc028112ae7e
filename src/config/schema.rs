//! Configuration schema definitions.
//!
//! This module defines the authored configuration tree handed to the
//! reconciler. All types derive Serde traits for deserialization from
//! config files.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::validation::ValidationError;

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LbConfig {
    /// Address every frontend port is bound on.
    pub listen_host: IpAddr,

    /// Frontends in authored order.
    pub frontends: Vec<FrontendConfig>,

    /// Health check settings shared by every frontend.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for LbConfig {
    fn default() -> Self {
        Self {
            listen_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            frontends: Vec::new(),
            health_check: HealthCheckConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl LbConfig {
    /// Start an empty configuration bound on `listen_host`.
    pub fn on_host(listen_host: IpAddr) -> Self {
        Self {
            listen_host,
            ..Self::default()
        }
    }

    pub fn with_frontend(mut self, frontend: FrontendConfig) -> Self {
        self.frontends.push(frontend);
        self
    }
}

/// Stable identity of a frontend across reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fe-{}", self.0)
    }
}

/// Transport served by a frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendKind {
    Http,
    Tcp,
    Udp,
}

impl FrontendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrontendKind::Http => "http",
            FrontendKind::Tcp => "tcp",
            FrontendKind::Udp => "udp",
        }
    }
}

impl fmt::Display for FrontendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrontendKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(FrontendKind::Http),
            "tcp" => Ok(FrontendKind::Tcp),
            "udp" => Ok(FrontendKind::Udp),
            other => Err(ValidationError::UnknownType(other.to_string())),
        }
    }
}

/// A configured entry point: protocol, ports and the pools behind it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FrontendConfig {
    /// Identity used to match this frontend across reloads.
    pub row_id: RowId,

    #[serde(rename = "type")]
    pub kind: FrontendKind,

    /// Comma-separated port list (e.g., "80,8080").
    pub ports: String,

    #[serde(default)]
    pub server_pools: Vec<ServerPoolConfig>,
}

impl FrontendConfig {
    pub fn new(row_id: u64, kind: FrontendKind, ports: impl Into<String>) -> Self {
        Self {
            row_id: RowId(row_id),
            kind,
            ports: ports.into(),
            server_pools: Vec::new(),
        }
    }

    pub fn with_pool(mut self, pool: ServerPoolConfig) -> Self {
        self.server_pools.push(pool);
        self
    }
}

/// A named group of backend servers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerPoolConfig {
    pub name: String,

    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

impl ServerPoolConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backends: Vec::new(),
        }
    }

    pub fn with_backend(mut self, name: impl Into<String>, address: SocketAddr) -> Self {
        self.backends.push(BackendConfig {
            name: name.into(),
            address,
        });
        self
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend identifier for logging.
    pub name: String,

    /// Backend address (e.g., "127.0.0.1:3000").
    pub address: SocketAddr,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Probe interval in milliseconds.
    pub interval_ms: u64,

    /// Probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Path to probe for HTTP frontends.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 10_000,
            timeout_ms: 2_000,
            path: "/".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

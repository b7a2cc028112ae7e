//! Load balancer control plane.
//!
//! Reconciles a desired set of frontends (listeners bound to server pools)
//! against the running set without disturbing unchanged listeners.

pub mod config;
pub mod health;
pub mod lifecycle;
pub mod model;
pub mod net;
pub mod observability;
pub mod reconcile;
pub mod transport;

pub use config::LbConfig;
pub use reconcile::{ActivationError, ActivationReport, Reconciler};

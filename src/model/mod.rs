//! Runtime data model.
//!
//! # Ownership
//! ```text
//! ActiveConfig
//!     → Frontend (RowId, kind, ports, pools)
//!         → ServerPool (RwLock<Vec<LiveServer>> + SharedLbState)
//!         → FrontendRuntime (carried forward by RowId)
//!             → Upstreams (swappable pool set, read by listeners)
//!             → Listener map (port → Listener)
//!             → HealthHandle
//! ```
//!
//! # Design Decisions
//! - Pools are rebuilt on every reload; counters reset with them
//! - Listeners and requests refer to frontends by RowId, never by pointer
//! - Dispatch reads under the pool's read lock, health writes under its write lock

pub mod frontend;
pub mod pool;
pub mod request;
pub mod state;

pub use frontend::{ActiveConfig, Frontend, FrontendRuntime, Upstreams};
pub use pool::{HealthTransition, Selection, ServerPool};
pub use request::LbRequest;
pub use state::{LiveServer, SharedLbState};

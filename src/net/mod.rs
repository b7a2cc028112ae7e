//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop)
//!     → connection.rs (register in the open-connection set)
//!     → Hand off to the transport's connection handler
//!
//! Stop:
//!     cancel accept loop → socket closed → close_all on tracked connections
//! ```
//!
//! # Design Decisions
//! - A listener is never reused after stop
//! - Each connection is tracked for forced close on stop
//! - Close errors are reported, never fatal

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionSet};
pub use listener::{ConnectionHandler, Listener, ListenerError, StopReport};

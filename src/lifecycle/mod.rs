//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Activate → Watch for reloads
//!
//! Cancellation (shutdown.rs):
//!     Listener stop / frontend removal / Ctrl+C
//!     → CancelToken::cancel
//!     → accept loops and health monitors exit
//! ```
//!
//! # Design Decisions
//! - Every spawned loop owns a token checked at each iteration boundary
//! - Shutdown stops listeners through the reconciler, never by dropping

pub mod shutdown;

pub use shutdown::CancelToken;

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → LbConfig (validated, authored tree)
//!     → Reconciler::activate
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → Reconciler::activate diffs against the running config
//! ```
//!
//! # Design Decisions
//! - The authored tree carries no runtime state; the reconciler builds it
//! - All sections have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BackendConfig, FrontendConfig, FrontendKind, HealthCheckConfig, LbConfig,
    ObservabilityConfig, RowId, ServerPoolConfig,
};
pub use validation::{parse_ports, ValidationError};

//! Activation results.

use serde::Serialize;
use thiserror::Error;

use crate::config::{RowId, ValidationError};
use crate::net::ListenerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    FullyApplied,
    PartiallyApplied,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::FullyApplied => "fully_applied",
            Outcome::PartiallyApplied => "partially_applied",
        }
    }
}

/// A port that could not be bound during an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortFailure {
    pub frontend: RowId,
    pub port: u16,
    pub error: String,
}

/// What an activation changed. Reloads are not transactional: failures
/// listed here were not rolled back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivationReport {
    pub generation: u64,
    pub added: Vec<RowId>,
    pub removed: Vec<RowId>,
    pub retained: Vec<RowId>,
    pub failures: Vec<PortFailure>,
}

impl ActivationReport {
    pub fn outcome(&self) -> Outcome {
        if self.failures.is_empty() {
            Outcome::FullyApplied
        } else {
            Outcome::PartiallyApplied
        }
    }
}

#[derive(Debug, Error)]
pub enum ActivationError {
    /// Rejected before any side effect.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// First activation aborted; listeners opened before the failure stay open.
    #[error("frontend {frontend} failed to listen on port {port}: {source}")]
    Listen {
        frontend: RowId,
        port: u16,
        #[source]
        source: ListenerError,
    },
}

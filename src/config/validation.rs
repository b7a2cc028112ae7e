//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Pool cardinality per frontend type
//! - Port list parsing
//! - Unique frontend identities
//!
//! # Design Decisions
//! - `validate_config` returns all validation errors, not just first
//! - The reconciler stops at the first error before any side effect

use std::collections::HashSet;
use std::num::ParseIntError;

use thiserror::Error;

use crate::config::schema::{FrontendConfig, FrontendKind, LbConfig, RowId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Cannot have multiple server pools for non-HTTP frontends.")]
    MultiplePools { frontend: RowId },

    #[error("Must have a server pool to send traffic to.")]
    NoServerPool { frontend: RowId },

    #[error("Unknown config type: {0}")]
    UnknownType(String),

    #[error("invalid port list {input:?}: {source}")]
    Ports {
        input: String,
        #[source]
        source: ParseIntError,
    },

    #[error("duplicate frontend row id {0}")]
    DuplicateRowId(RowId),
}

/// Parse a comma-separated port list into ports in declared order.
///
/// Any malformed entry fails the whole list.
pub fn parse_ports(input: &str) -> Result<Vec<u16>, ValidationError> {
    input
        .split(',')
        .map(|part| {
            part.trim().parse::<u16>().map_err(|source| ValidationError::Ports {
                input: input.to_string(),
                source,
            })
        })
        .collect()
}

/// Check the pool cardinality rule for one frontend.
///
/// Non-HTTP frontends need exactly one pool. HTTP frontends take any
/// number, including none.
pub fn validate_frontend(frontend: &FrontendConfig) -> Result<(), ValidationError> {
    if frontend.kind == FrontendKind::Http {
        return Ok(());
    }
    match frontend.server_pools.len() {
        0 => Err(ValidationError::NoServerPool {
            frontend: frontend.row_id,
        }),
        1 => Ok(()),
        _ => Err(ValidationError::MultiplePools {
            frontend: frontend.row_id,
        }),
    }
}

/// Validate a frontend set, stopping at the first error.
pub fn validate_frontends(frontends: &[FrontendConfig]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for frontend in frontends {
        if !seen.insert(frontend.row_id) {
            return Err(ValidationError::DuplicateRowId(frontend.row_id));
        }
        validate_frontend(frontend)?;
    }
    Ok(())
}

/// Validate a whole configuration, collecting every error.
pub fn validate_config(config: &LbConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for frontend in &config.frontends {
        if !seen.insert(frontend.row_id) {
            errors.push(ValidationError::DuplicateRowId(frontend.row_id));
        }
        if let Err(e) = parse_ports(&frontend.ports) {
            errors.push(e);
        }
        if let Err(e) = validate_frontend(frontend) {
            errors.push(e);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServerPoolConfig;

    fn pool(name: &str) -> ServerPoolConfig {
        ServerPoolConfig::new(name).with_backend("b1", "127.0.0.1:3000".parse().unwrap())
    }

    #[test]
    fn parses_ports_in_order() {
        assert_eq!(parse_ports("8080,80, 443").unwrap(), vec![8080, 80, 443]);
        assert_eq!(parse_ports("9000").unwrap(), vec![9000]);
    }

    #[test]
    fn malformed_port_fails_whole_list() {
        assert!(matches!(parse_ports("80,abc,443"), Err(ValidationError::Ports { .. })));
        assert!(parse_ports("80,").is_err());
        assert!(parse_ports("70000").is_err());
    }

    #[test]
    fn non_http_requires_exactly_one_pool() {
        let none = FrontendConfig::new(1, FrontendKind::Tcp, "9000");
        let err = validate_frontend(&none).unwrap_err();
        assert_eq!(err.to_string(), "Must have a server pool to send traffic to.");

        let two = FrontendConfig::new(2, FrontendKind::Udp, "9000")
            .with_pool(pool("a"))
            .with_pool(pool("b"));
        let err = validate_frontend(&two).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot have multiple server pools for non-HTTP frontends."
        );
    }

    #[test]
    fn http_accepts_multiple_pools() {
        let fe = FrontendConfig::new(1, FrontendKind::Http, "80")
            .with_pool(pool("a"))
            .with_pool(pool("b"));
        assert!(validate_frontend(&fe).is_ok());
    }

    #[test]
    fn http_accepts_no_pools() {
        let fe = FrontendConfig::new(1, FrontendKind::Http, "80");
        assert!(validate_frontend(&fe).is_ok());
        assert!(validate_frontends(&[fe]).is_ok());
    }

    #[test]
    fn unknown_type_names_the_type() {
        let err = "sctp".parse::<FrontendKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown config type: sctp");
    }

    #[test]
    fn collects_every_error() {
        let config = LbConfig::default()
            .with_frontend(FrontendConfig::new(1, FrontendKind::Tcp, "x"))
            .with_frontend(FrontendConfig::new(1, FrontendKind::Http, "80").with_pool(pool("a")));
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::DuplicateRowId(RowId(1))));
    }
}

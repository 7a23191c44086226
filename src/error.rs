//! # Errors
//!
//! Crate-level error type. Port errors convert into it with `?`.
//!
//! Budget exhaustion and stagnation are not errors: a watchdog-terminated
//! solve still returns its partial result, tagged with a
//! [`SolutionStatus`](crate::engine::SolutionStatus).

use thiserror::Error;

use crate::ports::{Capability, NearError, OracleError, PlannerError};

/// Errors from merge and session calls
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed argument: subset cardinality, k, version, matrix shape
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Input graphs that cannot be flattened into an arena
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The configured index lacks a capability the strategy needs
    #[error("index backend '{backend}' does not support {capability}")]
    UnsupportedIndexOperation {
        backend: &'static str,
        capability: Capability,
    },

    /// The validity oracle failed; not retried
    #[error("oracle failure: {0}")]
    Oracle(#[from] OracleError),

    /// The external planner failed
    #[error("planner failure: {0}")]
    Planner(#[from] PlannerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl From<NearError> for Error {
    fn from(err: NearError) -> Self {
        match err {
            NearError::Unsupported {
                backend,
                capability,
            } => Error::UnsupportedIndexOperation {
                backend,
                capability,
            },
        }
    }
}

/// Result alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

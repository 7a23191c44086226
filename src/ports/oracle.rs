//! # Oracle Port
//!
//! The configuration-space validity oracle: metric, sampling, state validity
//! and motion validity. Supplied by whatever planning backend owns the
//! collision geometry; the core only calls through this trait.

use std::time::Duration;

use rand::RngCore;
use thiserror::Error;

/// Errors raised by an oracle implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("state has {got} coordinates, space has {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("collision checker failed: {0}")]
    Checker(String),
}

pub type OracleResult<T> = Result<T, OracleError>;

/// Cumulative counters an oracle keeps across its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OracleStats {
    /// Motions validated so far
    pub motion_checks: u64,

    /// Time spent validating motions
    pub motion_check_time: Duration,

    /// Discrete states checked while validating motions
    pub discrete_state_checks: u64,
}

/// Trait for configuration-space oracles
///
/// Methods take `&self`; implementations keep their counters behind
/// interior mutability since the solver may call them while the watchdog
/// reads [`Oracle::stats`].
pub trait Oracle {
    /// Coordinates per state
    fn dimension(&self) -> usize;

    /// Metric between two states
    fn distance(&self, a: &[f64], b: &[f64]) -> f64;

    /// Whether a single state is collision free
    fn is_valid(&self, state: &[f64]) -> OracleResult<bool>;

    /// Whether the motion from `a` to `b` is collision free
    fn check_motion(&self, a: &[f64], b: &[f64]) -> OracleResult<bool>;

    /// Draw a uniform sample from the space bounds. No validity filtering.
    fn sample_uniform(&self, rng: &mut dyn RngCore) -> Vec<f64>;

    /// Cumulative counters
    fn stats(&self) -> OracleStats;

    /// Shorthand for the motion-check counter the watchdog polls
    fn checked_motion_count(&self) -> u64 {
        self.stats().motion_checks
    }
}

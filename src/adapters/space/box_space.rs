//! # Box Space Oracle
//!
//! Axis-aligned box of `R^n` with the Euclidean metric.
//!
//! Motions are validated by walking the straight segment in steps no longer
//! than `resolution × extent`, where extent is the box diagonal, and
//! checking every step after the start state. The start state is assumed
//! valid, as sampling-based planners only extend from valid states.
//!
//! Good for:
//! - Tests and benchmarks of the merge engine
//! - Toy problems with analytic obstacles

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rand::{Rng, RngCore};

use crate::error::{Error, Result};
use crate::ports::{Oracle, OracleError, OracleResult, OracleStats};

/// State validity predicate
pub type ValidityFn = Box<dyn Fn(&[f64]) -> bool + Send + Sync>;

/// Euclidean box configuration space
pub struct BoxSpace {
    low: Vec<f64>,
    high: Vec<f64>,
    validity: ValidityFn,

    /// Longest unchecked step, as a fraction of the box diagonal
    resolution: f64,

    motion_checks: AtomicU64,
    motion_check_nanos: AtomicU64,
    state_checks: AtomicU64,
}

impl BoxSpace {
    /// Create a space where every state is valid
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> Result<Self> {
        if low.is_empty() || low.len() != high.len() {
            return Err(Error::InvalidArgument(format!(
                "bounds must be non-empty and equal length, got {} and {}",
                low.len(),
                high.len()
            )));
        }
        if low.iter().zip(&high).any(|(l, h)| !(l < h)) {
            return Err(Error::InvalidArgument(
                "every lower bound must be below its upper bound".to_string(),
            ));
        }

        Ok(Self {
            low,
            high,
            validity: Box::new(|_| true),
            resolution: 0.01,
            motion_checks: AtomicU64::new(0),
            motion_check_nanos: AtomicU64::new(0),
            state_checks: AtomicU64::new(0),
        })
    }

    /// Unit cube `[0, 1]^dimension` with every state valid
    pub fn unit(dimension: usize) -> Result<Self> {
        Self::new(vec![0.0; dimension], vec![1.0; dimension])
    }

    /// Replace the validity predicate
    pub fn with_validity(mut self, validity: impl Fn(&[f64]) -> bool + Send + Sync + 'static) -> Self {
        self.validity = Box::new(validity);
        self
    }

    /// Set the motion-check resolution. Clamped to a small positive value.
    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution.max(1e-9);
        self
    }

    /// Lower bounds
    pub fn low(&self) -> &[f64] {
        &self.low
    }

    /// Upper bounds
    pub fn high(&self) -> &[f64] {
        &self.high
    }

    fn extent(&self) -> f64 {
        self.distance(&self.low, &self.high)
    }

    fn check_dimension(&self, state: &[f64]) -> OracleResult<()> {
        if state.len() != self.low.len() {
            return Err(OracleError::DimensionMismatch {
                expected: self.low.len(),
                got: state.len(),
            });
        }
        Ok(())
    }

    fn in_bounds(&self, state: &[f64]) -> bool {
        state
            .iter()
            .zip(self.low.iter().zip(&self.high))
            .all(|(x, (l, h))| x >= l && x <= h)
    }

    fn walk(&self, a: &[f64], b: &[f64]) -> bool {
        let step = self.resolution * self.extent();
        let steps = (self.distance(a, b) / step).ceil().max(1.0) as u64;
        let mut point = vec![0.0; a.len()];
        for i in 1..=steps {
            let t = i as f64 / steps as f64;
            for (p, (x, y)) in point.iter_mut().zip(a.iter().zip(b)) {
                *p = x + (y - x) * t;
            }
            self.state_checks.fetch_add(1, Ordering::Relaxed);
            if !self.in_bounds(&point) || !(self.validity)(&point) {
                return false;
            }
        }
        true
    }
}

impl std::fmt::Debug for BoxSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxSpace")
            .field("low", &self.low)
            .field("high", &self.high)
            .field("resolution", &self.resolution)
            .finish_non_exhaustive()
    }
}

impl Oracle for BoxSpace {
    fn dimension(&self) -> usize {
        self.low.len()
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }

    fn is_valid(&self, state: &[f64]) -> OracleResult<bool> {
        self.check_dimension(state)?;
        Ok(self.in_bounds(state) && (self.validity)(state))
    }

    fn check_motion(&self, a: &[f64], b: &[f64]) -> OracleResult<bool> {
        self.check_dimension(a)?;
        self.check_dimension(b)?;

        let start = Instant::now();
        let ok = self.walk(a, b);
        let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);

        self.motion_checks.fetch_add(1, Ordering::Relaxed);
        self.motion_check_nanos.fetch_add(nanos, Ordering::Relaxed);
        Ok(ok)
    }

    fn sample_uniform(&self, rng: &mut dyn RngCore) -> Vec<f64> {
        self.low
            .iter()
            .zip(&self.high)
            .map(|(&l, &h)| rng.gen_range(l..h))
            .collect()
    }

    fn stats(&self) -> OracleStats {
        OracleStats {
            motion_checks: self.motion_checks.load(Ordering::Relaxed),
            motion_check_time: std::time::Duration::from_nanos(
                self.motion_check_nanos.load(Ordering::Relaxed),
            ),
            discrete_state_checks: self.state_checks.load(Ordering::Relaxed),
        }
    }
}

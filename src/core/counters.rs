//! # Performance Counters
//!
//! Per-call measurements for merges and solves. Each call starts from
//! zero; callers read the finished value from the call's report.

use std::time::Duration;

use crate::ports::OracleStats;

/// Measurements of one merge or solve call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceCounters {
    /// Wall time of the whole call
    pub planning_time: Duration,

    /// Cumulative time spent inside k-NN queries
    pub knn_query_time: Duration,

    /// Cumulative time spent rebuilding or deleting from indices
    pub knn_delete_time: Duration,

    /// Motion checks the oracle performed during the call
    pub motion_checks: u64,

    /// Time the oracle spent checking motions during the call
    pub motion_check_time: Duration,

    /// Discrete state checks performed while validating motions
    pub discrete_state_checks: u64,
}

impl PerformanceCounters {
    /// Fill the oracle-side fields from two snapshots taken around a call
    pub fn record_oracle_delta(&mut self, before: &OracleStats, after: &OracleStats) {
        self.motion_checks = after.motion_checks.saturating_sub(before.motion_checks);
        self.motion_check_time = after.motion_check_time.saturating_sub(before.motion_check_time);
        self.discrete_state_checks = after
            .discrete_state_checks
            .saturating_sub(before.discrete_state_checks);
    }
}

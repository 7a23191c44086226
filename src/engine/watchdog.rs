//! # Termination Watchdog
//!
//! Bounds a blocking solve by polling the oracle's cumulative motion-check
//! counter each time the planner asks whether it should stop.
//!
//! ```text
//! Running -> BudgetExhausted  (counter reached the budget)
//!         -> Stagnant         (counter flat for longer than the timeout)
//!         -> DeadlineExceeded (wall-clock deadline passed)
//!         -> Terminated       (finish() called)
//! ```
//!
//! Once the watchdog leaves `Running` it never returns.

use std::time::Duration;

use tracing::{error, info};

use crate::core::config::WatchdogConfig;
use crate::error::{Error, Result};
use crate::ports::Clock;

const SECONDS_PER_DAY: f64 = 24.0 * 3600.0;

/// What bounds a solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Budget {
    /// Wall-clock time from the start of the solve
    Deadline(Duration),

    /// Target number of oracle motion checks
    MotionChecks(u64),
}

impl Budget {
    /// Deadline budget expressed in days
    pub fn days(days: f64) -> Result<Self> {
        if !days.is_finite() || days <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "days budget must be positive, got {days}"
            )));
        }
        Duration::try_from_secs_f64(days * SECONDS_PER_DAY)
            .map(Budget::Deadline)
            .map_err(|e| Error::InvalidArgument(format!("days budget {days}: {e}")))
    }

    /// Motion-check budget
    pub fn motion_checks(count: u64) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidArgument(
                "motion-check budget must be positive".to_string(),
            ));
        }
        Ok(Budget::MotionChecks(count))
    }
}

/// Watchdog lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Running,
    BudgetExhausted,
    Stagnant,
    DeadlineExceeded,
    Terminated,
}

/// Why the watchdog stopped a solve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    BudgetExhausted,
    /// Fatal: the oracle counter stopped advancing
    Stagnant,
    DeadlineExceeded,
}

impl TerminationReason {
    fn state(self) -> WatchdogState {
        match self {
            TerminationReason::BudgetExhausted => WatchdogState::BudgetExhausted,
            TerminationReason::Stagnant => WatchdogState::Stagnant,
            TerminationReason::DeadlineExceeded => WatchdogState::DeadlineExceeded,
        }
    }
}

/// Polling termination condition for one solve
#[derive(Debug)]
pub struct Watchdog<C: Clock> {
    budget: Budget,
    report_interval: Duration,
    stagnation_timeout: Duration,
    clock: C,

    started: Duration,
    last_report: Duration,
    reports: u64,

    /// Counter value when the watchdog started; the budget covers checks
    /// made after it
    baseline: u64,
    last_count: u64,
    last_change: Duration,

    state: WatchdogState,
    reason: Option<TerminationReason>,
}

impl<C: Clock> Watchdog<C> {
    /// Start watching. `baseline` is the oracle's motion-check counter now.
    pub fn new(budget: Budget, config: &WatchdogConfig, clock: C, baseline: u64) -> Self {
        let now = clock.now();
        Self {
            budget,
            report_interval: Duration::from_secs(config.report_interval_secs),
            stagnation_timeout: Duration::from_secs(config.stagnation_timeout_secs),
            clock,
            started: now,
            last_report: now,
            reports: 0,
            baseline,
            last_count: baseline,
            last_change: now,
            state: WatchdogState::Running,
            reason: None,
        }
    }

    /// Current state
    pub fn state(&self) -> WatchdogState {
        self.state
    }

    /// Progress reports emitted so far
    pub fn reports(&self) -> u64 {
        self.reports
    }

    /// Motion checks made since the watchdog started
    pub fn checks_since_start(&self, count: u64) -> u64 {
        count.saturating_sub(self.baseline)
    }

    /// Why the watchdog stopped, if it has
    pub fn reason(&self) -> Option<TerminationReason> {
        self.reason
    }

    /// Observe the counter. Returns true when the solve must stop.
    pub fn poll(&mut self, count: u64) -> bool {
        if self.state != WatchdogState::Running {
            return true;
        }

        let now = self.clock.now();
        let reason = match self.budget {
            Budget::Deadline(limit) => {
                (now - self.started >= limit).then_some(TerminationReason::DeadlineExceeded)
            }
            Budget::MotionChecks(budget) => self.poll_counter(now, count, budget),
        };

        match reason {
            Some(reason) => {
                self.state = reason.state();
                self.reason = Some(reason);
                true
            }
            None => false,
        }
    }

    fn poll_counter(&mut self, now: Duration, count: u64, budget: u64) -> Option<TerminationReason> {
        let used = self.checks_since_start(count);
        if now - self.last_report > self.report_interval {
            info!(
                motion_checks = used,
                budget,
                percent = used.saturating_mul(100) / budget.max(1),
                "solve progress"
            );
            self.last_report = now;
            self.reports += 1;
        }

        if count == self.last_count {
            if now - self.last_change > self.stagnation_timeout {
                error!(
                    counter = count,
                    flat_secs = (now - self.last_change).as_secs(),
                    "motion-check counter stagnated, cancelling solve"
                );
                return Some(TerminationReason::Stagnant);
            }
        } else {
            self.last_count = count;
            self.last_change = now;
        }

        (used >= budget).then_some(TerminationReason::BudgetExhausted)
    }

    /// Close the watchdog. Returns the reason it fired, if it did.
    pub fn finish(&mut self) -> Option<TerminationReason> {
        self.state = WatchdogState::Terminated;
        self.reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ManualClock;

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(60 * m)
    }

    fn checks_watchdog(budget: u64, clock: &ManualClock) -> Watchdog<ManualClock> {
        Watchdog::new(
            Budget::motion_checks(budget).unwrap(),
            &WatchdogConfig::default(),
            clock.clone(),
            0,
        )
    }

    #[test]
    fn test_budget_validation() {
        assert!(Budget::days(0.0).is_err());
        assert!(Budget::days(f64::NAN).is_err());
        assert!(Budget::motion_checks(0).is_err());
        assert_eq!(
            Budget::days(0.5).unwrap(),
            Budget::Deadline(Duration::from_secs(12 * 3600))
        );
    }

    #[test]
    fn test_stagnation_never_before_timeout() {
        let clock = ManualClock::new();
        let mut dog = checks_watchdog(1000, &clock);

        for _ in 0..15 {
            clock.advance(minutes(1));
            assert!(!dog.poll(0));
        }
        // Exactly 15 minutes flat: not yet
        assert_eq!(dog.state(), WatchdogState::Running);

        clock.advance(Duration::from_millis(1));
        assert!(dog.poll(0));
        assert_eq!(dog.state(), WatchdogState::Stagnant);
        assert_eq!(dog.reason(), Some(TerminationReason::Stagnant));
    }

    #[test]
    fn test_progress_resets_stagnation() {
        let clock = ManualClock::new();
        let mut dog = checks_watchdog(1000, &clock);

        clock.advance(minutes(14));
        assert!(!dog.poll(10));
        clock.advance(minutes(14));
        assert!(!dog.poll(10));
        clock.advance(minutes(2));
        assert!(dog.poll(10));
        assert_eq!(dog.state(), WatchdogState::Stagnant);
    }

    #[test]
    fn test_budget_exhausted_at_budget() {
        let clock = ManualClock::new();
        let mut dog = checks_watchdog(100, &clock);

        assert!(!dog.poll(99));
        assert!(dog.poll(100));
        assert_eq!(dog.state(), WatchdogState::BudgetExhausted);
    }

    #[test]
    fn test_states_are_sticky() {
        let clock = ManualClock::new();
        let mut dog = checks_watchdog(5, &clock);

        assert!(dog.poll(7));
        // Counter moves on but the watchdog stays down
        assert!(dog.poll(8));
        assert_eq!(dog.state(), WatchdogState::BudgetExhausted);

        assert_eq!(dog.finish(), Some(TerminationReason::BudgetExhausted));
        assert_eq!(dog.state(), WatchdogState::Terminated);
        assert!(dog.poll(0));
    }

    #[test]
    fn test_deadline() {
        let clock = ManualClock::new();
        let budget = Budget::Deadline(minutes(30));
        let mut dog = Watchdog::new(budget, &WatchdogConfig::default(), clock.clone(), 0);

        // A flat counter is irrelevant under a deadline
        clock.advance(minutes(29));
        assert!(!dog.poll(0));
        clock.advance(minutes(1));
        assert!(dog.poll(0));
        assert_eq!(dog.state(), WatchdogState::DeadlineExceeded);
    }

    #[test]
    fn test_finish_without_firing() {
        let clock = ManualClock::new();
        let mut dog = checks_watchdog(5, &clock);
        assert!(!dog.poll(1));
        assert_eq!(dog.finish(), None);
        assert_eq!(dog.state(), WatchdogState::Terminated);
    }

    #[test]
    fn test_budget_counts_from_baseline() {
        let clock = ManualClock::new();
        let budget = Budget::motion_checks(50).unwrap();
        let mut dog = Watchdog::new(budget, &WatchdogConfig::default(), clock.clone(), 1000);

        // The oracle already made 1000 checks before this solve
        assert!(!dog.poll(1000));
        assert!(!dog.poll(1049));
        assert_eq!(dog.checks_since_start(1049), 49);
        assert!(dog.poll(1050));
        assert_eq!(dog.state(), WatchdogState::BudgetExhausted);
    }

    #[test]
    fn test_reports_once_per_interval() {
        let clock = ManualClock::new();
        let mut dog = checks_watchdog(1_000_000, &clock);

        // Many polls inside the first minute: silent
        for i in 0..100 {
            clock.advance(Duration::from_millis(500));
            assert!(!dog.poll(i + 1));
        }
        assert_eq!(dog.reports(), 0);

        // Crossing the minute boundary reports once
        clock.advance(Duration::from_secs(11));
        assert!(!dog.poll(200));
        assert_eq!(dog.reports(), 1);
        for i in 0..50 {
            clock.advance(Duration::from_secs(1));
            assert!(!dog.poll(201 + i));
        }
        assert_eq!(dog.reports(), 1);

        // Next minute, next report
        clock.advance(Duration::from_secs(11));
        assert!(!dog.poll(300));
        assert_eq!(dog.reports(), 2);
    }

    #[test]
    fn test_zero_budget_variant_does_not_panic() {
        let clock = ManualClock::new();
        let mut dog = Watchdog::new(Budget::MotionChecks(0), &WatchdogConfig::default(), clock.clone(), 0);

        clock.advance(minutes(2));
        assert!(dog.poll(0));
        assert_eq!(dog.reports(), 1);
        assert_eq!(dog.state(), WatchdogState::BudgetExhausted);
    }

    #[test]
    fn test_custom_timeout() {
        let clock = ManualClock::new();
        let config = WatchdogConfig {
            report_interval_secs: 1,
            stagnation_timeout_secs: 10,
        };
        let mut dog = Watchdog::new(Budget::MotionChecks(50), &config, clock.clone(), 3);

        clock.advance(Duration::from_secs(10));
        assert!(!dog.poll(3));
        clock.advance(Duration::from_secs(1));
        assert!(dog.poll(3));
    }
}

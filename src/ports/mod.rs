//! # Ports
//!
//! Trait contracts between the engine and everything it does not own.
//!
//! - [`Near`]: incremental nearest-neighbor index over arena nodes
//! - [`Oracle`]: configuration-space metric, sampling and validity checks
//! - [`RoadmapPlanner`] / [`PlannerFactory`]: the external solver
//! - [`PathSimplifier`]: path post-processing
//! - [`Clock`]: time source for the watchdog

mod clock;
mod near;
mod oracle;
mod planner;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use near::{Capability, MaskFn, Metric, Near, NearError, NearResult, SearchResult};
pub use oracle::{Oracle, OracleError, OracleResult, OracleStats};
pub use planner::{
    CompactTree, PathSimplifier, PlannerData, PlannerError, PlannerFactory, PlannerResult,
    PlannerStatus, RoadmapPlanner, SampleSet,
};

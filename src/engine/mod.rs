//! # Engine
//!
//! The orchestration layer that wires everything together.
//!
//! This is where:
//! - Input trees become one node arena
//! - Index adapters are chosen per merge strategy
//! - External solves are bounded by the watchdog

pub mod forest;
pub mod merge;
pub mod session;
pub mod watchdog;

pub use forest::Forest;
pub use merge::{merge_graphs, MergeEngine, MergeReport};
pub use session::{PlanningSession, SolutionStatus, SolveOutcome};
pub use watchdog::{Budget, TerminationReason, Watchdog, WatchdogState};

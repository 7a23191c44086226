//! # forest-merge - Roadmap Forest Merging
//!
//! > "Grow trees apart, connect them later"
//!
//! forest-merge connects independently grown planning trees ("blooming
//! trees") into one roadmap. Each node queries its k nearest neighbors in
//! the other trees and every candidate motion is validated by an external
//! configuration-space oracle. It also drives external sampling-based
//! planners under a motion-check budget with a stagnation watchdog.
//!
//! ## Philosophy
//!
//! - **Index strategy is a choice** - Seven merge strategies, same edges contract
//! - **Arena, not pointers** - Nodes are indices into one flat arena per call
//! - **Capabilities up front** - Mask and removal support checked before a merge runs
//! - **Pure core, swappable adapters** - Hexagonal architecture
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      FOREST-MERGE                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  CORE (pure data, no I/O)                                   │
//! │    NodeId, MotionRecord, EdgeRecord, Config, Counters       │
//! │                                                              │
//! │  PORTS (trait contracts)                                     │
//! │    Near, Oracle, RoadmapPlanner, PathSimplifier, Clock      │
//! │                                                              │
//! │  ADAPTERS (swappable implementations)                       │
//! │    Index: Linear, GNAT                                      │
//! │    Space: BoxSpace                                          │
//! │    Simplify: Shortcut                                       │
//! │                                                              │
//! │  ENGINE (orchestration)                                      │
//! │    Forest, MergeEngine, Watchdog, PlanningSession           │
//! │                                                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use forest_merge::{BoxSpace, MergeConfig, MergeEngine, MergeStrategy};
//!
//! let space = BoxSpace::unit(2)?;
//! let config = MergeConfig::new(8, MergeStrategy::SingleSourceMask).with_subset(vec![0]);
//!
//! // trees: Vec<Array2<f64>>, one state per row
//! let report = MergeEngine::new(&space).merge(&trees, &config)?;
//! let edges = report.edge_matrix(); // N x 4: forest_i, motion_i, forest_j, motion_j
//! ```

// ============================================================================
// MODULES
// ============================================================================

/// Core domain - pure data, no I/O
/// Contains: NodeId, MotionRecord, EdgeRecord, config, counters
pub mod core;

/// Crate error type
pub mod error;

/// Port definitions - trait contracts for adapters
/// Contains: Near, Oracle, RoadmapPlanner, PathSimplifier, Clock
pub mod ports;

/// Adapter implementations - swappable components
/// Contains: index, space, simplify submodules
pub mod adapters;

/// Engine - orchestration layer
/// Contains: Forest, MergeEngine, Watchdog, PlanningSession
pub mod engine;

// ============================================================================
// RE-EXPORTS (public API)
// ============================================================================

// Core types
pub use crate::core::config::{
    IndexBackend, MergeConfig, MergeStrategy, PlannerConfig, SessionConfig, WatchdogConfig,
};
pub use crate::core::counters::PerformanceCounters;
pub use crate::core::{edges_to_matrix, EdgeMatrix, EdgeRecord, MotionRecord, NodeId, VertexMatrix};
pub use crate::error::{Error, Result};

// Port traits
pub use crate::ports::{
    Capability, Clock, ManualClock, MonotonicClock, Near, Oracle, OracleError, OracleStats,
    PathSimplifier, PlannerData, PlannerError, PlannerFactory, PlannerStatus, RoadmapPlanner,
    SampleSet,
};

// Adapters
pub use crate::adapters::index::{GnatIndex, LinearIndex};
pub use crate::adapters::simplify::ShortcutSimplifier;
pub use crate::adapters::space::BoxSpace;

// Engine
pub use crate::engine::{
    merge_graphs, Budget, Forest, MergeEngine, MergeReport, PlanningSession, SolutionStatus,
    SolveOutcome, TerminationReason, Watchdog, WatchdogState,
};

//! # Configuration
//!
//! Everything tunable lives here: merge strategy and k, which index backend
//! to build, watchdog cadence, and the planner settings handed to the
//! external solver.
//!
//! All types deserialize from TOML with defaults for missing fields:
//!
//! ```toml
//! seed = 7
//! return_graph = true
//!
//! [watchdog]
//! stagnation_timeout_secs = 900
//!
//! [planner]
//! planner = "rdt"
//! state_check_resolution = 0.001
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// MERGE
// ============================================================================

/// How the merge engine organizes its nearest-neighbor indices.
///
/// The discriminants are the stable numeric version ids callers pass in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// 0: one shared index holding every node of every tree
    SharedIndex = 0,
    /// 1: one index per tree, candidates pooled and re-ranked to the global top-k
    PooledPerTree = 1,
    /// 2: one index per tree, each other tree queried directly
    PerTree = 2,
    /// 3: one shared index over every tree but the source
    SingleSource = 3,
    /// 4: as 3, rebuilding the index without trees once they are reached
    SingleSourceRebuild = 4,
    /// 5: as 3, physically removing reached trees from the index
    SingleSourceRemove = 5,
    /// 6: as 3, masking reached trees out of query results
    SingleSourceMask = 6,
}

impl MergeStrategy {
    /// All strategies in version order
    pub const ALL: [MergeStrategy; 7] = [
        MergeStrategy::SharedIndex,
        MergeStrategy::PooledPerTree,
        MergeStrategy::PerTree,
        MergeStrategy::SingleSource,
        MergeStrategy::SingleSourceRebuild,
        MergeStrategy::SingleSourceRemove,
        MergeStrategy::SingleSourceMask,
    ];

    /// Numeric version id
    pub fn version(self) -> i64 {
        self as i64
    }

    /// Strategies 3-6 merge exactly one source tree into the rest
    pub fn is_single_source(self) -> bool {
        self.version() >= 3
    }
}

impl TryFrom<i64> for MergeStrategy {
    type Error = Error;

    fn try_from(version: i64) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.version() == version)
            .ok_or_else(|| {
                Error::InvalidArgument(format!("merge version must be in 0..=6, got {version}"))
            })
    }
}

/// Parameters of one merge call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Neighbors requested per query
    pub k: usize,

    /// Index topology and maintenance policy
    pub strategy: MergeStrategy,

    /// Trees whose nodes are used as queries.
    ///
    /// Empty means every tree for strategies 0-2. Strategies 3-6 require
    /// exactly one entry, the source tree.
    pub subset: Vec<usize>,

    /// Nearest-neighbor backend to build
    pub index: IndexBackend,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            k: 8,
            strategy: MergeStrategy::SharedIndex,
            subset: Vec::new(),
            index: IndexBackend::default(),
        }
    }
}

impl MergeConfig {
    /// Create a config with the given k and strategy, defaults elsewhere
    pub fn new(k: usize, strategy: MergeStrategy) -> Self {
        Self {
            k,
            strategy,
            ..Self::default()
        }
    }

    /// Restrict the query trees
    pub fn with_subset(mut self, subset: Vec<usize>) -> Self {
        self.subset = subset;
        self
    }

    /// Choose the index backend
    pub fn with_index(mut self, index: IndexBackend) -> Self {
        self.index = index;
        self
    }
}

/// Which nearest-neighbor structure backs the merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexBackend {
    /// Brute-force scan. Masks yes, removal cache no.
    Linear,

    /// Pivot tree with lazy removal
    Gnat {
        /// Pivots per internal node
        degree: usize,
        /// Leaf bucket size that triggers a split
        max_leaf_size: usize,
        /// Removed nodes tolerated before a full rebuild
        removed_cache_size: usize,
    },
}

impl IndexBackend {
    /// GNAT with default tuning
    pub fn gnat() -> Self {
        IndexBackend::Gnat {
            degree: 8,
            max_leaf_size: 50,
            removed_cache_size: 500,
        }
    }
}

impl Default for IndexBackend {
    fn default() -> Self {
        Self::gnat()
    }
}

// ============================================================================
// WATCHDOG
// ============================================================================

/// Cadence of the termination watchdog
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Minimum seconds between progress reports
    pub report_interval_secs: u64,

    /// Seconds the motion-check counter may stay flat before the run is
    /// declared stagnant
    pub stagnation_timeout_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 60,
            stagnation_timeout_secs: 15 * 60,
        }
    }
}

// ============================================================================
// PLANNER / SESSION
// ============================================================================

/// Settings handed to the external planner factory.
///
/// The core never interprets these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Planner identifier understood by the factory
    pub planner: String,

    /// Planner-specific numeric options
    pub options: Vec<f64>,

    /// Resolution for discretized motion validation, as a fraction of the
    /// space extent
    pub state_check_resolution: f64,

    /// Lower translation bounds
    pub bounds_low: Vec<f64>,

    /// Upper translation bounds
    pub bounds_high: Vec<f64>,

    /// Use continuous collision checking instead of discretized checks
    pub continuous: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            planner: "rdt".to_string(),
            options: Vec::new(),
            state_check_resolution: 0.01,
            bounds_low: Vec::new(),
            bounds_high: Vec::new(),
            continuous: false,
        }
    }
}

/// Configuration of a planning session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    pub planner: PlannerConfig,

    pub watchdog: WatchdogConfig,

    /// Write the planner data graph here after each solve
    pub output_path: Option<PathBuf>,

    /// Return the planner data graph from each solve
    pub return_graph: bool,

    /// Retrieve the compact tree after a solve. Requires a sample set.
    pub record_compact_tree: bool,

    /// Seed for presampling. Entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl SessionConfig {
    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

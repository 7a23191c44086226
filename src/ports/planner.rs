//! # Planner Port
//!
//! Capability interface for the external sampling-based planner, plus the
//! path simplifier used by `optimize`.
//!
//! A planner is produced by a [`PlannerFactory`] from the session's
//! [`PlannerConfig`]. A factory that cannot build a planner with the
//! required capabilities fails there, at configuration time.

use std::io::Write;

use ndarray::Array2;
use thiserror::Error;

use crate::core::config::PlannerConfig;
use crate::core::{EdgeMatrix, VertexMatrix};

/// Errors raised by the external planner
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    #[error("planner '{0}' is not available")]
    UnknownPlanner(String),

    #[error("planner setup failed: {0}")]
    Setup(String),

    #[error("planner failed: {0}")]
    Failed(String),
}

pub type PlannerResult<T> = Result<T, PlannerError>;

/// Outcome reported by the planner itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerStatus {
    ExactSolution,
    ApproximateSolution,
    Timeout,
    Unknown,
}

impl PlannerStatus {
    /// Whether a path is available
    pub fn is_solved(self) -> bool {
        matches!(
            self,
            PlannerStatus::ExactSolution | PlannerStatus::ApproximateSolution
        )
    }
}

/// Predefined samples injected into the planner.
///
/// `tree_bases`, `edges` and `edge_bases` describe compact-tree recording:
/// the per-tree base offsets into `samples` and the edge list with its own
/// per-tree offsets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleSet {
    pub samples: VertexMatrix,
    pub flags: Option<Vec<u32>>,
    pub tree_bases: Option<Vec<usize>>,
    pub edges: Option<EdgeMatrix>,
    pub edge_bases: Option<Vec<usize>>,
}

impl SampleSet {
    /// A sample set without flags or compact-tree tables
    pub fn new(samples: VertexMatrix) -> Self {
        Self {
            samples,
            ..Self::default()
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.nrows()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The planner's full roadmap after a solve
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlannerData {
    pub vertices: VertexMatrix,
    /// `N × 2` vertex index pairs
    pub edges: EdgeMatrix,
    pub start_indices: Vec<usize>,
    pub goal_indices: Vec<usize>,
}

impl PlannerData {
    /// Write as text rows: `v` per vertex (17 significant digits), `e` per
    /// edge, then `s` and `g` rows for start and goal vertices.
    pub fn write_text<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for row in self.vertices.rows() {
            write!(out, "v")?;
            for x in row {
                write!(out, " {:.17e}", x)?;
            }
            writeln!(out)?;
        }
        for row in self.edges.rows() {
            write!(out, "e")?;
            for i in row {
                write!(out, " {}", i)?;
            }
            writeln!(out)?;
        }
        for s in &self.start_indices {
            writeln!(out, "s {}", s)?;
        }
        for g in &self.goal_indices {
            writeln!(out, "g {}", g)?;
        }
        Ok(())
    }
}

/// Compact record of the trees grown from a sample set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompactTree {
    /// Sample index each tree node refers to
    pub nodes: Vec<usize>,
    /// Parent of each node in `nodes`, `None` for roots
    pub parents: Vec<Option<usize>>,
}

/// Trait for planners the session can drive
pub trait RoadmapPlanner {
    /// Seed the planner with a pre-existing graph
    fn add_graph(&mut self, vertices: &VertexMatrix, edges: &EdgeMatrix) -> PlannerResult<()>;

    /// Inject a predefined sample set
    fn set_sample_set(&mut self, samples: &SampleSet) -> PlannerResult<()>;

    /// Run until solved or until `terminate` returns true.
    ///
    /// `terminate` is polled at the planner's own cadence.
    fn solve(&mut self, terminate: &mut dyn FnMut() -> bool) -> PlannerResult<PlannerStatus>;

    /// The latest solution, one state per row
    fn solution_path(&self) -> Option<VertexMatrix>;

    /// Full roadmap
    fn planner_data(&self) -> PlannerData;

    /// Per-sample connectivity after a solve with a sample set
    fn sample_set_connectivity(&self) -> Option<Array2<i64>> {
        None
    }

    /// Compact tree after a solve with a sample set
    fn compact_tree(&self) -> Option<CompactTree> {
        None
    }

    /// Name/value pairs describing the planner's progress
    fn progress_properties(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Builds planners from configuration
pub trait PlannerFactory {
    type Planner: RoadmapPlanner;

    fn create(&self, config: &PlannerConfig) -> PlannerResult<Self::Planner>;
}

/// Trait for time-bounded path post-processing
pub trait PathSimplifier {
    /// Simplify `path` until done or until `terminate` returns true
    fn simplify(
        &self,
        path: VertexMatrix,
        terminate: &mut dyn FnMut() -> bool,
    ) -> PlannerResult<VertexMatrix>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_planner_data_text_format() {
        let data = PlannerData {
            vertices: array![[0.5, 1.0], [2.0, -3.0]],
            edges: array![[0, 1]],
            start_indices: vec![0],
            goal_indices: vec![1],
        };

        let mut buf = Vec::new();
        data.write_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("v 5.00000000000000000e-1"));
        assert_eq!(lines[2], "e 0 1");
        assert_eq!(lines[3], "s 0");
        assert_eq!(lines[4], "g 1");
    }

    #[test]
    fn test_planner_status_solved() {
        assert!(PlannerStatus::ExactSolution.is_solved());
        assert!(PlannerStatus::ApproximateSolution.is_solved());
        assert!(!PlannerStatus::Timeout.is_solved());
        assert!(!PlannerStatus::Unknown.is_solved());
    }
}

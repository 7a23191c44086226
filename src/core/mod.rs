//! # Core
//!
//! Pure data types. No I/O, no planning, no indexing.
//!
//! - [`NodeId`]: handle into the flat node arena of one merge call
//! - [`MotionRecord`]: a node's state plus its tree membership
//! - [`EdgeRecord`]: a validated connection between two trees
//! - [`VertexMatrix`] / [`EdgeMatrix`]: the matrix forms callers exchange

pub mod config;
pub mod counters;

use ndarray::Array2;

/// One configuration per row.
pub type VertexMatrix = Array2<f64>;

/// Integer matrix of edges.
///
/// For merge results this is `N × 4`: `(forest_i, motion_i, forest_j, motion_j)`.
/// For planner graphs it is `N × 2`: `(from_vertex, to_vertex)`.
pub type EdgeMatrix = Array2<i64>;

/// Handle to a node in a merge arena.
///
/// Only meaningful for the arena that issued it. Handles are dense:
/// `0..arena.len()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Position in the arena
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node of a blooming tree, borrowed from the arena that owns it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionRecord<'a> {
    /// Configuration-space point, interpreted by the oracle
    pub state: &'a [f64],

    /// Which input tree the node came from
    pub forest_index: usize,

    /// Row of this node in its source tree's vertex matrix
    pub motion_index: usize,
}

/// A validated connection between node `motion_i` of tree `forest_i` and
/// node `motion_j` of tree `forest_j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeRecord {
    pub forest_i: usize,
    pub motion_i: usize,
    pub forest_j: usize,
    pub motion_j: usize,
}

impl EdgeRecord {
    /// Build an edge between two arena nodes
    pub fn between(from: &MotionRecord<'_>, to: &MotionRecord<'_>) -> Self {
        Self {
            forest_i: from.forest_index,
            motion_i: from.motion_index,
            forest_j: to.forest_index,
            motion_j: to.motion_index,
        }
    }

    /// The row form used by [`EdgeMatrix`]
    pub fn as_row(&self) -> [i64; 4] {
        [
            self.forest_i as i64,
            self.motion_i as i64,
            self.forest_j as i64,
            self.motion_j as i64,
        ]
    }
}

/// Flatten edges into an `N × 4` matrix, preserving discovery order.
pub fn edges_to_matrix(edges: &[EdgeRecord]) -> EdgeMatrix {
    let mut out = EdgeMatrix::zeros((edges.len(), 4));
    for (mut row, edge) in out.rows_mut().into_iter().zip(edges) {
        for (dst, src) in row.iter_mut().zip(edge.as_row()) {
            *dst = src;
        }
    }
    out
}

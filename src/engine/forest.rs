//! # Forest Registry
//!
//! Flattens N blooming trees into one node arena.
//!
//! Nodes are laid out tree by tree, each tree's nodes in their original row
//! order. The offset table has `num_trees + 1` entries and tree `t` owns
//! handles `offsets[t]..offsets[t + 1]`. Handles are indices, so the whole
//! arena is freed at once when the merge call drops it.

use std::ops::Range;

use crate::core::{MotionRecord, NodeId, VertexMatrix};
use crate::error::{Error, Result};

/// Node arena plus offset table for one merge call
#[derive(Debug, Clone)]
pub struct Forest {
    dimension: usize,

    /// States, `dimension` coordinates per node
    states: Vec<f64>,

    /// Source tree of each node
    forest_of: Vec<usize>,

    /// Row of each node in its source tree
    motion_of: Vec<usize>,

    offsets: Vec<usize>,
}

impl Forest {
    /// Build the arena from vertex matrices, one row per state.
    ///
    /// Empty trees are allowed. Non-empty trees must have `dimension`
    /// columns and finite coordinates.
    pub fn from_trees(trees: &[VertexMatrix], dimension: usize) -> Result<Self> {
        let total: usize = trees.iter().map(|t| t.nrows()).sum();

        let mut forest = Self {
            dimension,
            states: Vec::with_capacity(total * dimension),
            forest_of: Vec::with_capacity(total),
            motion_of: Vec::with_capacity(total),
            offsets: Vec::with_capacity(trees.len() + 1),
        };

        for (t, tree) in trees.iter().enumerate() {
            forest.offsets.push(forest.forest_of.len());
            if tree.nrows() == 0 {
                continue;
            }
            if tree.ncols() != dimension {
                return Err(Error::InvalidInput(format!(
                    "tree {t} has {} columns, space has {dimension}",
                    tree.ncols()
                )));
            }
            for (j, row) in tree.rows().into_iter().enumerate() {
                if row.iter().any(|x| !x.is_finite()) {
                    return Err(Error::InvalidInput(format!(
                        "tree {t} row {j} has a non-finite coordinate"
                    )));
                }
                forest.states.extend(row.iter());
                forest.forest_of.push(t);
                forest.motion_of.push(j);
            }
        }
        forest.offsets.push(forest.forest_of.len());

        Ok(forest)
    }

    /// Total number of nodes
    pub fn len(&self) -> usize {
        self.forest_of.len()
    }

    /// Check if the arena holds no nodes
    pub fn is_empty(&self) -> bool {
        self.forest_of.is_empty()
    }

    /// Number of input trees
    pub fn num_trees(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Coordinates per state
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The offset table
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Handle range of a tree
    pub fn tree_range(&self, tree: usize) -> Range<usize> {
        self.offsets[tree]..self.offsets[tree + 1]
    }

    /// Nodes in a tree
    pub fn tree_len(&self, tree: usize) -> usize {
        self.offsets[tree + 1] - self.offsets[tree]
    }

    /// Handles of a tree's nodes, in row order
    pub fn tree_nodes(&self, tree: usize) -> impl Iterator<Item = NodeId> {
        self.tree_range(tree).map(NodeId)
    }

    /// All handles, in arena order
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.len()).map(NodeId)
    }

    /// State of a node
    pub fn state(&self, node: NodeId) -> &[f64] {
        let start = node.index() * self.dimension;
        &self.states[start..start + self.dimension]
    }

    /// Source tree of a node
    pub fn forest_of(&self, node: NodeId) -> usize {
        self.forest_of[node.index()]
    }

    /// Full record of a node
    pub fn motion(&self, node: NodeId) -> MotionRecord<'_> {
        MotionRecord {
            state: self.state(node),
            forest_index: self.forest_of[node.index()],
            motion_index: self.motion_of[node.index()],
        }
    }
}

//! # Near Port
//!
//! Contract for incremental nearest-neighbor indices over arena nodes.
//!
//! An index stores [`NodeId`] handles and measures them with a caller
//! supplied [`Metric`]; it never sees states directly. Two capabilities are
//! optional and report [`NearError::Unsupported`] when a backend lacks them:
//!
//! - **Masking** ([`Near::set_mask`]): a predicate evaluated per candidate at
//!   query time, so membership can flip in O(1) without reinsertion.
//! - **Removal cache sizing** ([`Near::set_removed_cache_size`]): how many
//!   logically removed nodes the backend tolerates before rebuilding.

use std::ops::Range;
use std::time::Duration;

use thiserror::Error;

use crate::core::NodeId;

/// Distance between two arena nodes
pub type Metric<'a> = Box<dyn Fn(NodeId, NodeId) -> f64 + 'a>;

/// Query-time membership predicate. `false` hides the node.
pub type MaskFn<'a> = Box<dyn Fn(NodeId) -> bool + 'a>;

/// A neighbor returned by a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    pub node: NodeId,
    pub distance: f64,
}

/// Optional index capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Mask,
    RemovedCache,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Mask => write!(f, "query masks"),
            Capability::RemovedCache => write!(f, "removal cache sizing"),
        }
    }
}

/// Errors from index operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NearError {
    #[error("{backend} does not support {capability}")]
    Unsupported {
        backend: &'static str,
        capability: Capability,
    },
}

pub type NearResult<T> = Result<T, NearError>;

/// Trait for nearest-neighbor indices over arena nodes
pub trait Near<'a> {
    /// Backend name, for logs and errors
    fn name(&self) -> &'static str;

    /// Insert a node. Re-adding a present node is a no-op.
    fn add(&mut self, node: NodeId);

    /// Remove a node. Returns false if it was not present.
    fn remove(&mut self, node: NodeId) -> bool;

    /// Remove every node in a handle range, skipping absent ones.
    ///
    /// Returns how many were actually removed.
    fn remove_range(&mut self, nodes: Range<usize>) -> usize {
        nodes.filter(|&i| self.remove(NodeId(i))).count()
    }

    /// Drop all nodes. Mask and tuning survive.
    fn clear(&mut self);

    /// Number of nodes present (removed excluded, masked included)
    fn len(&self) -> usize;

    /// Check if empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a node is present
    fn contains(&self, node: NodeId) -> bool;

    /// The `k` nearest present, unmasked nodes, ascending by distance.
    ///
    /// Never returns `query` itself. Returns fewer than `k` when fewer are
    /// available.
    fn near(&self, query: NodeId, k: usize) -> Vec<SearchResult>;

    /// Install a query mask
    fn set_mask(&mut self, _mask: MaskFn<'a>) -> NearResult<()> {
        Err(NearError::Unsupported {
            backend: self.name(),
            capability: Capability::Mask,
        })
    }

    /// Current removed-node cache size, if the backend has one
    fn removed_cache_size(&self) -> Option<usize> {
        None
    }

    /// Resize the removed-node cache
    fn set_removed_cache_size(&mut self, _size: usize) -> NearResult<()> {
        Err(NearError::Unsupported {
            backend: self.name(),
            capability: Capability::RemovedCache,
        })
    }

    /// Cumulative time spent answering [`Near::near`]
    fn query_time(&self) -> Duration;
}

//! # Index Adapters
//!
//! Implementations of the [`Near`] port.
//!
//! - [`LinearIndex`]: brute-force scan. Supports masks.
//! - [`GnatIndex`]: pivot tree with lazy removal. Supports masks and
//!   removal cache sizing.

mod gnat;
mod linear;

pub use gnat::GnatIndex;
pub use linear::LinearIndex;

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::config::IndexBackend;
use crate::core::NodeId;
use crate::ports::{Capability, Metric, Near, NearResult, SearchResult};

/// Build an index for the configured backend
pub fn build<'a>(backend: &IndexBackend, metric: Metric<'a>) -> Box<dyn Near<'a> + 'a> {
    match *backend {
        IndexBackend::Linear => Box::new(LinearIndex::new(metric)),
        IndexBackend::Gnat {
            degree,
            max_leaf_size,
            removed_cache_size,
        } => Box::new(GnatIndex::with_tuning(
            metric,
            degree,
            max_leaf_size,
            removed_cache_size,
        )),
    }
}

/// Check that the configured backend offers `capability`.
///
/// Exercises the capability on an empty index, so the answer always comes
/// from the adapter itself.
pub fn check_capability(backend: &IndexBackend, capability: Capability) -> NearResult<()> {
    let mut scratch = build(backend, Box::new(|_: NodeId, _: NodeId| 0.0));
    match capability {
        Capability::Mask => scratch.set_mask(Box::new(|_: NodeId| true)),
        Capability::RemovedCache => {
            let size = scratch.removed_cache_size().unwrap_or(0);
            scratch.set_removed_cache_size(size)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f64,
    node: NodeId,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Ties on distance fall back to the handle so results are deterministic.
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.node.cmp(&other.node))
    }
}

/// Bounded max-heap keeping the `k` best candidates seen so far
#[derive(Debug)]
pub(crate) struct KnnHeap {
    k: usize,
    heap: BinaryHeap<Candidate>,
}

impl KnnHeap {
    pub(crate) fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
        }
    }

    pub(crate) fn consider(&mut self, node: NodeId, distance: f64) {
        if self.k == 0 {
            return;
        }
        let cand = Candidate { distance, node };
        if self.heap.len() < self.k {
            self.heap.push(cand);
        } else if let Some(worst) = self.heap.peek() {
            if cand < *worst {
                self.heap.pop();
                self.heap.push(cand);
            }
        }
    }

    /// Distance a candidate must beat to enter. Infinite until full.
    pub(crate) fn radius(&self) -> f64 {
        if self.heap.len() < self.k {
            f64::INFINITY
        } else {
            self.heap.peek().map_or(f64::INFINITY, |c| c.distance)
        }
    }

    pub(crate) fn into_results(self) -> Vec<SearchResult> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| SearchResult {
                node: c.node,
                distance: c.distance,
            })
            .collect()
    }
}

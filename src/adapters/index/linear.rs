//! # Linear Index
//!
//! Brute-force nearest-neighbor search. O(n) per query, O(1) insert and
//! remove.
//!
//! Good for:
//! - Small forests
//! - Checking the tree index against ground truth
//!
//! Supports query masks. Has no removal cache, so strategies that presize
//! one reject it.

use std::cell::Cell;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::KnnHeap;
use crate::core::NodeId;
use crate::ports::{MaskFn, Metric, Near, NearResult, SearchResult};

/// Flat list of nodes scanned on every query
pub struct LinearIndex<'a> {
    metric: Metric<'a>,
    mask: Option<MaskFn<'a>>,

    /// Present nodes, unordered
    nodes: Vec<NodeId>,

    /// Node -> position in `nodes`
    slots: HashMap<NodeId, usize>,

    query_time: Cell<Duration>,
}

impl<'a> LinearIndex<'a> {
    pub fn new(metric: Metric<'a>) -> Self {
        Self {
            metric,
            mask: None,
            nodes: Vec::new(),
            slots: HashMap::new(),
            query_time: Cell::new(Duration::ZERO),
        }
    }
}

impl std::fmt::Debug for LinearIndex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearIndex")
            .field("len", &self.nodes.len())
            .field("masked", &self.mask.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> Near<'a> for LinearIndex<'a> {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn add(&mut self, node: NodeId) {
        if self.slots.contains_key(&node) {
            return;
        }
        self.slots.insert(node, self.nodes.len());
        self.nodes.push(node);
    }

    fn remove(&mut self, node: NodeId) -> bool {
        let Some(slot) = self.slots.remove(&node) else {
            return false;
        };
        self.nodes.swap_remove(slot);
        if let Some(&moved) = self.nodes.get(slot) {
            self.slots.insert(moved, slot);
        }
        true
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.slots.clear();
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn contains(&self, node: NodeId) -> bool {
        self.slots.contains_key(&node)
    }

    fn near(&self, query: NodeId, k: usize) -> Vec<SearchResult> {
        let start = Instant::now();
        let mut heap = KnnHeap::new(k);

        for &node in &self.nodes {
            if node == query {
                continue;
            }
            if let Some(mask) = &self.mask {
                if !mask(node) {
                    continue;
                }
            }
            heap.consider(node, (self.metric)(query, node));
        }

        self.query_time.set(self.query_time.get() + start.elapsed());
        heap.into_results()
    }

    fn set_mask(&mut self, mask: MaskFn<'a>) -> NearResult<()> {
        self.mask = Some(mask);
        Ok(())
    }

    fn query_time(&self) -> Duration {
        self.query_time.get()
    }
}

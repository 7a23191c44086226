//! # GNAT Index
//!
//! Geometric near-neighbor access tree over an arbitrary metric.
//!
//! Each internal node keeps `degree` pivots, one per child, plus a range
//! table: `ranges[i][j]` is the min/max distance from pivot `i` to anything
//! stored under child `j`. A query measures itself against the pivots and
//! drops every child whose range cannot intersect the current k-th best
//! radius (triangle inequality). Leaves are plain buckets that split once
//! they exceed `max_leaf_size`.
//!
//! ## Removal
//!
//! Removal is lazy. A removed node stays in the tree and is filtered out of
//! results until the removed cache holds `removed_cache_size` nodes; then
//! the tree is rebuilt from the survivors. Adding a node back while it is
//! still cached just un-removes it.

use std::cell::Cell;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::trace;

use super::KnnHeap;
use crate::core::NodeId;
use crate::ports::{MaskFn, Metric, Near, NearResult, SearchResult};

#[derive(Debug, Clone, Copy)]
struct Tuning {
    degree: usize,
    max_leaf_size: usize,
}

#[derive(Debug, Default)]
struct GnatNode {
    /// Leaf bucket. Empty once the node has split.
    data: Vec<NodeId>,

    /// One pivot per child. Pivots are elements themselves.
    pivots: Vec<NodeId>,

    children: Vec<GnatNode>,

    /// `ranges[i][j]`: (min, max) distance from `pivots[i]` to `pivots[j]`
    /// and everything under `children[j]`
    ranges: Vec<Vec<(f64, f64)>>,
}

fn widen(range: &mut (f64, f64), d: f64) {
    if d < range.0 {
        range.0 = d;
    }
    if d > range.1 {
        range.1 = d;
    }
}

fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(i, _)| i)
}

impl GnatNode {
    fn is_leaf(&self) -> bool {
        self.pivots.is_empty()
    }

    fn insert(&mut self, x: NodeId, metric: &dyn Fn(NodeId, NodeId) -> f64, tuning: Tuning) {
        if self.is_leaf() {
            self.data.push(x);
            if self.data.len() > tuning.max_leaf_size {
                self.split(metric, tuning);
            }
            return;
        }

        let dists: Vec<f64> = self.pivots.iter().map(|&p| metric(x, p)).collect();
        let j = argmin(&dists);
        for (i, &d) in dists.iter().enumerate() {
            widen(&mut self.ranges[i][j], d);
        }
        self.children[j].insert(x, metric, tuning);
    }

    /// Turn an overfull leaf into an internal node.
    ///
    /// Pivots are picked farthest-first. A bucket of coincident points
    /// cannot be separated and stays a leaf.
    fn split(&mut self, metric: &dyn Fn(NodeId, NodeId) -> f64, tuning: Tuning) {
        let items = std::mem::take(&mut self.data);
        let want = tuning.degree.min(items.len());

        let mut chosen = vec![0usize];
        let mut nearest_pivot: Vec<f64> = items.iter().map(|&x| metric(items[0], x)).collect();
        while chosen.len() < want {
            let (far, far_d) = nearest_pivot
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map_or((0, 0.0), |(i, d)| (i, *d));
            if far_d <= 0.0 {
                break;
            }
            chosen.push(far);
            for (i, &x) in items.iter().enumerate() {
                let d = metric(items[far], x);
                if d < nearest_pivot[i] {
                    nearest_pivot[i] = d;
                }
            }
        }

        if chosen.len() < 2 {
            self.data = items;
            return;
        }

        let pivots: Vec<NodeId> = chosen.iter().map(|&i| items[i]).collect();
        let m = pivots.len();
        let mut ranges = vec![vec![(0.0, 0.0); m]; m];
        for i in 0..m {
            for j in 0..m {
                if i != j {
                    let d = metric(pivots[i], pivots[j]);
                    ranges[i][j] = (d, d);
                }
            }
        }

        let mut is_pivot = vec![false; items.len()];
        for &i in &chosen {
            is_pivot[i] = true;
        }

        let mut children: Vec<GnatNode> = (0..m).map(|_| GnatNode::default()).collect();
        for (idx, &x) in items.iter().enumerate() {
            if is_pivot[idx] {
                continue;
            }
            let dists: Vec<f64> = pivots.iter().map(|&p| metric(x, p)).collect();
            let j = argmin(&dists);
            for (i, &d) in dists.iter().enumerate() {
                widen(&mut ranges[i][j], d);
            }
            children[j].data.push(x);
        }

        for child in &mut children {
            if child.data.len() > tuning.max_leaf_size {
                child.split(metric, tuning);
            }
        }

        self.pivots = pivots;
        self.children = children;
        self.ranges = ranges;
    }

    fn search(
        &self,
        query: NodeId,
        heap: &mut KnnHeap,
        metric: &dyn Fn(NodeId, NodeId) -> f64,
        accept: &dyn Fn(NodeId) -> bool,
    ) {
        for &x in &self.data {
            if accept(x) {
                heap.consider(x, metric(query, x));
            }
        }
        if self.is_leaf() {
            return;
        }

        let m = self.pivots.len();
        let mut alive = vec![true; m];
        let mut dist = vec![f64::INFINITY; m];
        for i in 0..m {
            if !alive[i] {
                continue;
            }
            let d = metric(query, self.pivots[i]);
            dist[i] = d;
            if accept(self.pivots[i]) {
                heap.consider(self.pivots[i], d);
            }
            let r = heap.radius();
            for j in 0..m {
                if j == i || !alive[j] {
                    continue;
                }
                let (lo, hi) = self.ranges[i][j];
                if d - r > hi || d + r < lo {
                    alive[j] = false;
                }
            }
        }

        let mut order: Vec<usize> = (0..m).filter(|&j| alive[j]).collect();
        order.sort_by(|&a, &b| dist[a].total_cmp(&dist[b]));
        for j in order {
            if dist[j] - heap.radius() > self.ranges[j][j].1 {
                continue;
            }
            self.children[j].search(query, heap, metric, accept);
        }
    }

    fn depth(&self) -> usize {
        1 + self.children.iter().map(GnatNode::depth).max().unwrap_or(0)
    }
}

/// Pivot-tree index with lazy removal
pub struct GnatIndex<'a> {
    metric: Metric<'a>,
    mask: Option<MaskFn<'a>>,
    tuning: Tuning,
    removed_cache_size: usize,

    root: GnatNode,

    /// Live nodes
    present: HashSet<NodeId>,

    /// Nodes still in the tree but logically removed
    removed: HashSet<NodeId>,

    query_time: Cell<Duration>,
    rebuilds: usize,
}

impl<'a> GnatIndex<'a> {
    /// Create with default tuning: degree 8, leaves of 50, cache of 500
    pub fn new(metric: Metric<'a>) -> Self {
        Self::with_tuning(metric, 8, 50, 500)
    }

    /// Create with explicit tuning. Degree is at least 2, leaves hold at
    /// least one node.
    pub fn with_tuning(
        metric: Metric<'a>,
        degree: usize,
        max_leaf_size: usize,
        removed_cache_size: usize,
    ) -> Self {
        Self {
            metric,
            mask: None,
            tuning: Tuning {
                degree: degree.max(2),
                max_leaf_size: max_leaf_size.max(1),
            },
            removed_cache_size,
            root: GnatNode::default(),
            present: HashSet::new(),
            removed: HashSet::new(),
            query_time: Cell::new(Duration::ZERO),
            rebuilds: 0,
        }
    }

    /// Removed nodes still physically in the tree
    pub fn pending_removals(&self) -> usize {
        self.removed.len()
    }

    /// How many times the removed cache has forced a rebuild
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    /// Height of the tree
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    fn rebuild(&mut self) {
        let mut survivors: Vec<NodeId> = self.present.iter().copied().collect();
        survivors.sort_unstable();
        trace!(
            survivors = survivors.len(),
            dropped = self.removed.len(),
            "rebuilding gnat"
        );

        self.removed.clear();
        self.root = GnatNode {
            data: survivors,
            ..GnatNode::default()
        };
        if self.root.data.len() > self.tuning.max_leaf_size {
            self.root.split(&*self.metric, self.tuning);
        }
        self.rebuilds += 1;
    }
}

impl std::fmt::Debug for GnatIndex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GnatIndex")
            .field("len", &self.present.len())
            .field("pending_removals", &self.removed.len())
            .field("removed_cache_size", &self.removed_cache_size)
            .field("masked", &self.mask.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> Near<'a> for GnatIndex<'a> {
    fn name(&self) -> &'static str {
        "gnat"
    }

    fn add(&mut self, node: NodeId) {
        if self.present.contains(&node) {
            return;
        }
        self.present.insert(node);
        if self.removed.remove(&node) {
            return;
        }
        self.root.insert(node, &*self.metric, self.tuning);
    }

    fn remove(&mut self, node: NodeId) -> bool {
        if !self.present.remove(&node) {
            return false;
        }
        self.removed.insert(node);
        if self.removed.len() >= self.removed_cache_size {
            self.rebuild();
        }
        true
    }

    fn clear(&mut self) {
        self.root = GnatNode::default();
        self.present.clear();
        self.removed.clear();
    }

    fn len(&self) -> usize {
        self.present.len()
    }

    fn contains(&self, node: NodeId) -> bool {
        self.present.contains(&node)
    }

    fn near(&self, query: NodeId, k: usize) -> Vec<SearchResult> {
        let start = Instant::now();
        let mut heap = KnnHeap::new(k);

        let accept = |x: NodeId| {
            x != query
                && !self.removed.contains(&x)
                && self.mask.as_ref().map_or(true, |mask| mask(x))
        };
        self.root.search(query, &mut heap, &*self.metric, &accept);

        self.query_time.set(self.query_time.get() + start.elapsed());
        heap.into_results()
    }

    fn set_mask(&mut self, mask: MaskFn<'a>) -> NearResult<()> {
        self.mask = Some(mask);
        Ok(())
    }

    fn removed_cache_size(&self) -> Option<usize> {
        Some(self.removed_cache_size)
    }

    fn set_removed_cache_size(&mut self, size: usize) -> NearResult<()> {
        self.removed_cache_size = size;
        if !self.removed.is_empty() && self.removed.len() >= size {
            self.rebuild();
        }
        Ok(())
    }

    fn query_time(&self) -> Duration {
        self.query_time.get()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{line_metric, plane_metric};
    use super::super::LinearIndex;
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_points(n: usize, seed: u64) -> Vec<[f64; 2]> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)])
            .collect()
    }

    #[test]
    fn test_gnat_matches_linear() {
        let points = random_points(400, 11);
        let mut gnat = GnatIndex::with_tuning(plane_metric(&points), 4, 8, 500);
        let mut linear = LinearIndex::new(plane_metric(&points));
        for i in 0..points.len() {
            gnat.add(NodeId(i));
            linear.add(NodeId(i));
        }

        assert!(gnat.depth() > 1);
        for q in (0..points.len()).step_by(37) {
            let a = gnat.near(NodeId(q), 7);
            let b = linear.near(NodeId(q), 7);
            assert_eq!(a, b, "query {q}");
        }
    }

    #[test]
    fn test_gnat_never_returns_query() {
        let points = random_points(100, 3);
        let mut gnat = GnatIndex::with_tuning(plane_metric(&points), 3, 4, 500);
        for i in 0..points.len() {
            gnat.add(NodeId(i));
        }

        for q in 0..points.len() {
            assert!(gnat.near(NodeId(q), 5).iter().all(|r| r.node != NodeId(q)));
        }
    }

    #[test]
    fn test_gnat_lazy_removal_then_rebuild() {
        let positions: Vec<f64> = (0..20).map(f64::from).collect();
        let mut gnat = GnatIndex::with_tuning(line_metric(&positions), 2, 3, 3);
        for i in 0..20 {
            gnat.add(NodeId(i));
        }

        assert!(gnat.remove(NodeId(1)));
        assert!(gnat.remove(NodeId(2)));
        assert_eq!(gnat.pending_removals(), 2);
        assert_eq!(gnat.rebuilds(), 0);

        let near: Vec<usize> = gnat.near(NodeId(0), 2).iter().map(|r| r.node.0).collect();
        assert_eq!(near, vec![3, 4]);

        assert!(gnat.remove(NodeId(3)));
        assert_eq!(gnat.rebuilds(), 1);
        assert_eq!(gnat.pending_removals(), 0);
        assert_eq!(gnat.len(), 17);

        let near: Vec<usize> = gnat.near(NodeId(0), 2).iter().map(|r| r.node.0).collect();
        assert_eq!(near, vec![4, 5]);
    }

    #[test]
    fn test_gnat_remove_absent_is_noop() {
        let positions = [0.0, 1.0];
        let mut gnat = GnatIndex::new(line_metric(&positions));
        gnat.add(NodeId(0));

        assert!(!gnat.remove(NodeId(1)));
        assert_eq!(gnat.remove_range(0..2), 1);
        assert_eq!(gnat.remove_range(0..2), 0);
        assert!(gnat.is_empty());
    }

    #[test]
    fn test_gnat_readd_cached_node() {
        let positions = [0.0, 1.0, 2.0];
        let mut gnat = GnatIndex::new(line_metric(&positions));
        for i in 0..3 {
            gnat.add(NodeId(i));
        }

        gnat.remove(NodeId(1));
        assert_eq!(gnat.near(NodeId(0), 1)[0].node, NodeId(2));

        gnat.add(NodeId(1));
        assert_eq!(gnat.pending_removals(), 0);
        assert_eq!(gnat.near(NodeId(0), 1)[0].node, NodeId(1));
    }

    #[test]
    fn test_gnat_mask_hides_nodes() {
        let points = random_points(200, 5);
        let hidden = |n: NodeId| n.0 < 100;
        let mut gnat = GnatIndex::with_tuning(plane_metric(&points), 4, 6, 500);
        for i in 0..points.len() {
            gnat.add(NodeId(i));
        }
        gnat.set_mask(Box::new(move |n| !hidden(n))).unwrap();

        for q in 0..20 {
            let results = gnat.near(NodeId(q), 10);
            assert_eq!(results.len(), 10);
            assert!(results.iter().all(|r| r.node.0 >= 100));
        }
    }

    #[test]
    fn test_gnat_coincident_points_stay_in_leaf() {
        let positions = vec![1.0; 30];
        let mut gnat = GnatIndex::with_tuning(line_metric(&positions), 4, 5, 500);
        for i in 0..30 {
            gnat.add(NodeId(i));
        }

        assert_eq!(gnat.depth(), 1);
        assert_eq!(gnat.near(NodeId(0), 50).len(), 29);
    }

    #[test]
    fn test_gnat_clear_keeps_mask_and_tuning() {
        let positions = [0.0, 1.0, 2.0];
        let mut gnat = GnatIndex::new(line_metric(&positions));
        gnat.set_mask(Box::new(|n: NodeId| n != NodeId(1))).unwrap();
        gnat.set_removed_cache_size(42).unwrap();
        for i in 0..3 {
            gnat.add(NodeId(i));
        }

        gnat.clear();
        assert!(gnat.is_empty());
        assert_eq!(gnat.removed_cache_size(), Some(42));

        for i in 0..3 {
            gnat.add(NodeId(i));
        }
        let near: Vec<usize> = gnat.near(NodeId(0), 5).iter().map(|r| r.node.0).collect();
        assert_eq!(near, vec![2]);
    }

    #[test]
    fn test_gnat_shrinking_cache_flushes() {
        let positions: Vec<f64> = (0..10).map(f64::from).collect();
        let mut gnat = GnatIndex::new(line_metric(&positions));
        for i in 0..10 {
            gnat.add(NodeId(i));
        }
        gnat.remove(NodeId(4));
        gnat.remove(NodeId(5));

        gnat.set_removed_cache_size(2).unwrap();

        assert_eq!(gnat.pending_removals(), 0);
        assert_eq!(gnat.rebuilds(), 1);
    }
}

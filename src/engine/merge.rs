//! # Merge Engine
//!
//! Connects independently grown trees by discovering valid motions between
//! nodes of different trees.
//!
//! Every strategy follows the same loop: query k nearest neighbors of a
//! node, validate each candidate motion through the oracle, and emit an
//! [`EdgeRecord`] for each valid one. Strategies only differ in how many
//! indices exist and how trees enter and leave them:
//!
//! | Strategy | Indices | Contents | Maintenance |
//! |---|---|---|---|
//! | 0 `SharedIndex` | one | all trees | static |
//! | 1 `PooledPerTree` | one per tree | own tree | static, candidates re-ranked |
//! | 2 `PerTree` | one per tree | own tree | static |
//! | 3 `SingleSource` | one | all but source | static |
//! | 4 `SingleSourceRebuild` | one | all but source | rebuilt without reached trees |
//! | 5 `SingleSourceRemove` | one | all but source | reached trees removed |
//! | 6 `SingleSourceMask` | one | all but source | reached trees masked |
//!
//! A merge is all-or-nothing: an oracle failure aborts the call and the
//! edges found so far are dropped.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::adapters::index;
use crate::core::config::{MergeConfig, MergeStrategy};
use crate::core::counters::PerformanceCounters;
use crate::core::{edges_to_matrix, EdgeMatrix, EdgeRecord, NodeId, VertexMatrix};
use crate::engine::forest::Forest;
use crate::error::{Error, Result};
use crate::ports::{Capability, Metric, Near, Oracle, SearchResult};

/// Result of one merge call
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    /// Validated edges in discovery order
    pub edges: Vec<EdgeRecord>,

    /// Candidate motions sent to the oracle
    pub candidates: u64,

    pub counters: PerformanceCounters,
}

impl MergeReport {
    /// Edges as an `N × 4` matrix
    pub fn edge_matrix(&self) -> EdgeMatrix {
        edges_to_matrix(&self.edges)
    }
}

/// Edges and candidate count accumulated during a merge
#[derive(Debug, Default)]
struct Tally {
    edges: Vec<EdgeRecord>,
    candidates: u64,
    knn_query_time: Duration,
    knn_delete_time: Duration,
}

/// Coarse percentage progress over a run of query nodes
struct Progress {
    label: String,
    total: usize,
    last: Option<usize>,
}

impl Progress {
    fn new(label: String, total: usize) -> Self {
        Self {
            label,
            total,
            last: None,
        }
    }

    fn update(&mut self, done: usize) {
        if self.total == 0 {
            return;
        }
        let pc = done * 100 / self.total;
        if self.last != Some(pc) {
            debug!(target: "forest_merge::progress", "{} {}%", self.label, pc);
            self.last = Some(pc);
        }
    }
}

/// Merges blooming trees through a validity oracle
pub struct MergeEngine<'o, O: ?Sized> {
    oracle: &'o O,
}

impl<'o, O: Oracle + ?Sized> MergeEngine<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self { oracle }
    }

    /// Merge `trees` according to `config`.
    ///
    /// Arguments are validated before anything is built. Edges come back in
    /// discovery order: query trees in subset order, nodes in row order.
    pub fn merge(&self, trees: &[VertexMatrix], config: &MergeConfig) -> Result<MergeReport> {
        validate(trees.len(), config)?;

        let before = self.oracle.stats();
        let start = Instant::now();

        let forest = Forest::from_trees(trees, self.oracle.dimension())?;
        info!(
            strategy = ?config.strategy,
            trees = forest.num_trees(),
            nodes = forest.len(),
            k = config.k,
            "merging forest"
        );

        let mut tally = Tally::default();
        match config.strategy {
            MergeStrategy::SharedIndex => self.run_shared(&forest, config, &mut tally)?,
            MergeStrategy::PooledPerTree | MergeStrategy::PerTree => {
                self.run_per_tree(&forest, config, &mut tally)?
            }
            MergeStrategy::SingleSource
            | MergeStrategy::SingleSourceRebuild
            | MergeStrategy::SingleSourceRemove
            | MergeStrategy::SingleSourceMask => {
                self.run_single_source(&forest, config, &mut tally)?
            }
        }

        let mut counters = PerformanceCounters {
            planning_time: start.elapsed(),
            knn_query_time: tally.knn_query_time,
            knn_delete_time: tally.knn_delete_time,
            ..PerformanceCounters::default()
        };
        counters.record_oracle_delta(&before, &self.oracle.stats());

        info!(
            edges = tally.edges.len(),
            candidates = tally.candidates,
            elapsed_ms = counters.planning_time.as_millis() as u64,
            "merge done"
        );

        Ok(MergeReport {
            edges: tally.edges,
            candidates: tally.candidates,
            counters,
        })
    }

    fn metric<'a>(&self, forest: &'a Forest) -> Metric<'a>
    where
        'o: 'a,
        O: 'a,
    {
        let oracle = self.oracle;
        Box::new(move |a: NodeId, b: NodeId| oracle.distance(forest.state(a), forest.state(b)))
    }

    /// Validate `from -> to`, recording an edge on success
    fn connect(&self, forest: &Forest, from: NodeId, to: NodeId, tally: &mut Tally) -> Result<bool> {
        tally.candidates += 1;
        if !self.oracle.check_motion(forest.state(from), forest.state(to))? {
            return Ok(false);
        }
        let edge = EdgeRecord::between(&forest.motion(from), &forest.motion(to));
        trace!(?edge, "edge");
        tally.edges.push(edge);
        Ok(true)
    }

    // ========================================================================
    // STRATEGY 0
    // ========================================================================

    fn run_shared(&self, forest: &Forest, config: &MergeConfig, tally: &mut Tally) -> Result<()> {
        let mut nn = index::build(&config.index, self.metric(forest));
        for node in forest.nodes() {
            nn.add(node);
        }

        for (i, &source) in query_trees(forest, config).iter().enumerate() {
            let mut progress = Progress::new(format!("[tree {source}]"), forest.tree_len(source));
            debug!(tree = source, order = i, "querying shared index");
            for (done, m) in forest.tree_nodes(source).enumerate() {
                for n in nn.near(m, config.k) {
                    if forest.forest_of(n.node) == source {
                        continue;
                    }
                    self.connect(forest, m, n.node, tally)?;
                }
                progress.update(done);
            }
        }

        tally.knn_query_time += nn.query_time();
        Ok(())
    }

    // ========================================================================
    // STRATEGIES 1-2
    // ========================================================================

    fn run_per_tree(&self, forest: &Forest, config: &MergeConfig, tally: &mut Tally) -> Result<()> {
        let indices: Vec<Box<dyn Near<'_> + '_>> = (0..forest.num_trees())
            .map(|t| {
                let mut nn = index::build(&config.index, self.metric(forest));
                for node in forest.tree_nodes(t) {
                    nn.add(node);
                }
                nn
            })
            .collect();
        debug!(indices = indices.len(), "built per-tree indices");

        let pooled = config.strategy == MergeStrategy::PooledPerTree;
        let mut pool: Vec<SearchResult> = Vec::new();
        for (i, &source) in query_trees(forest, config).iter().enumerate() {
            let mut progress = Progress::new(format!("[subset {}]", i + 1), forest.tree_len(source));
            for (done, m) in forest.tree_nodes(source).enumerate() {
                pool.clear();
                for (t, nn) in indices.iter().enumerate() {
                    if t == source {
                        continue;
                    }
                    let found = nn.near(m, config.k);
                    if pooled {
                        pool.extend(found);
                    } else {
                        for n in found {
                            self.connect(forest, m, n.node, tally)?;
                        }
                    }
                }
                if pooled {
                    select_nearest(&mut pool, config.k);
                    for n in &pool {
                        self.connect(forest, m, n.node, tally)?;
                    }
                }
                progress.update(done);
            }
        }

        tally.knn_query_time += indices.iter().map(|nn| nn.query_time()).sum::<Duration>();
        Ok(())
    }

    // ========================================================================
    // STRATEGIES 3-6
    // ========================================================================

    fn run_single_source(
        &self,
        forest: &Forest,
        config: &MergeConfig,
        tally: &mut Tally,
    ) -> Result<()> {
        let strategy = config.strategy;
        let source = config.subset[0];
        let included: Vec<Cell<bool>> = (0..forest.num_trees())
            .map(|t| Cell::new(t != source))
            .collect();

        let mut nn = index::build(&config.index, self.metric(forest));
        match strategy {
            MergeStrategy::SingleSourceRemove => {
                let current = nn.removed_cache_size().unwrap_or(0);
                let size = current.max(forest.len() / 10);
                nn.set_removed_cache_size(size)?;
                debug!(backend = nn.name(), size, "presized removed cache");
            }
            MergeStrategy::SingleSourceMask => {
                let included = &included;
                nn.set_mask(Box::new(move |n: NodeId| included[forest.forest_of(n)].get()))?;
            }
            _ => {}
        }

        fill_included(&mut *nn, forest, &included);

        let mut progress = Progress::new(format!("[source {source}]"), forest.tree_len(source));
        for (done, m) in forest.tree_nodes(source).enumerate() {
            let found = nn.near(m, config.k);
            progress.update(done);

            let mut dirty = false;
            let mut to_remove = BTreeSet::new();
            for n in found {
                if !self.connect(forest, m, n.node, tally)? {
                    continue;
                }
                let t = forest.forest_of(n.node);
                match strategy {
                    MergeStrategy::SingleSourceRebuild | MergeStrategy::SingleSourceMask => {
                        if included[t].replace(false) {
                            dirty = true;
                            trace!(tree = t, "tree reached, excluding");
                        }
                    }
                    MergeStrategy::SingleSourceRemove => {
                        to_remove.insert(t);
                    }
                    _ => {}
                }
            }

            if strategy == MergeStrategy::SingleSourceRebuild && dirty {
                let started = Instant::now();
                rebuild_included(&mut *nn, forest, &included);
                tally.knn_delete_time += started.elapsed();
            }

            if !to_remove.is_empty() {
                let started = Instant::now();
                for t in to_remove {
                    let removed = nn.remove_range(forest.tree_range(t));
                    included[t].set(false);
                    trace!(tree = t, removed, "tree reached, removed");
                }
                tally.knn_delete_time += started.elapsed();
            }
        }

        tally.knn_query_time += nn.query_time();
        Ok(())
    }
}

/// Add every node of every included tree
fn fill_included<'a, N: Near<'a> + ?Sized>(nn: &mut N, forest: &Forest, included: &[Cell<bool>]) {
    for (t, inc) in included.iter().enumerate() {
        if inc.get() {
            for node in forest.tree_nodes(t) {
                nn.add(node);
            }
        }
    }
}

/// Clear the index and refill it with the included trees only
fn rebuild_included<'a, N: Near<'a> + ?Sized>(nn: &mut N, forest: &Forest, included: &[Cell<bool>]) {
    nn.clear();
    fill_included(nn, forest, included);
}

/// Keep the `k` nearest of a candidate pool, ascending
fn select_nearest(pool: &mut Vec<SearchResult>, k: usize) {
    let by_distance = |a: &SearchResult, b: &SearchResult| {
        a.distance.total_cmp(&b.distance).then(a.node.cmp(&b.node))
    };
    if pool.len() > k {
        pool.select_nth_unstable_by(k, by_distance);
        pool.truncate(k);
    }
    pool.sort_by(by_distance);
}

/// Trees whose nodes are queried. Empty subset means all.
fn query_trees(forest: &Forest, config: &MergeConfig) -> Vec<usize> {
    if config.subset.is_empty() {
        (0..forest.num_trees()).collect()
    } else {
        config.subset.clone()
    }
}

/// Reject bad arguments before building anything
fn validate(num_trees: usize, config: &MergeConfig) -> Result<()> {
    if config.k == 0 {
        return Err(Error::InvalidArgument("k must be positive".to_string()));
    }
    if let Some(&bad) = config.subset.iter().find(|&&t| t >= num_trees) {
        return Err(Error::InvalidArgument(format!(
            "subset names tree {bad}, only {num_trees} trees given"
        )));
    }
    if config.strategy.is_single_source() && config.subset.len() != 1 {
        return Err(Error::InvalidArgument(format!(
            "merge version {} needs exactly one source tree in subset, got {}",
            config.strategy.version(),
            config.subset.len()
        )));
    }

    let needed = match config.strategy {
        MergeStrategy::SingleSourceRemove => Some(Capability::RemovedCache),
        MergeStrategy::SingleSourceMask => Some(Capability::Mask),
        _ => None,
    };
    if let Some(capability) = needed {
        index::check_capability(&config.index, capability)?;
    }
    Ok(())
}

/// Merge trees using numeric arguments.
///
/// `version` selects the strategy (0-6). Returns an `N × 4` edge matrix of
/// `(forest_i, motion_i, forest_j, motion_j)` rows.
pub fn merge_graphs<O: Oracle + ?Sized>(
    oracle: &O,
    trees: &[VertexMatrix],
    k: i64,
    version: i64,
    subset: &[i64],
) -> Result<EdgeMatrix> {
    let k = usize::try_from(k)
        .ok()
        .filter(|&k| k > 0)
        .ok_or_else(|| Error::InvalidArgument(format!("k must be positive, got {k}")))?;
    let strategy = MergeStrategy::try_from(version)?;
    let subset = subset
        .iter()
        .map(|&t| {
            usize::try_from(t)
                .map_err(|_| Error::InvalidArgument(format!("negative tree id {t} in subset")))
        })
        .collect::<Result<Vec<_>>>()?;

    let config = MergeConfig::new(k, strategy).with_subset(subset);
    Ok(MergeEngine::new(oracle).merge(trees, &config)?.edge_matrix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::space::BoxSpace;
    use crate::core::config::IndexBackend;
    use crate::ports::{OracleError, OracleResult, OracleStats};
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};
    use std::collections::HashSet;

    fn random_trees(sizes: &[usize], seed: u64) -> Vec<VertexMatrix> {
        let space = BoxSpace::unit(2).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        sizes
            .iter()
            .map(|&n| {
                let mut tree = Array2::zeros((n, 2));
                for mut row in tree.rows_mut() {
                    let s = space.sample_uniform(&mut rng);
                    row[0] = s[0];
                    row[1] = s[1];
                }
                tree
            })
            .collect()
    }

    /// Oracle that fails after a fixed number of motion checks
    struct FlakyOracle {
        inner: BoxSpace,
        fail_after: u64,
    }

    impl Oracle for FlakyOracle {
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
        fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
            self.inner.distance(a, b)
        }
        fn is_valid(&self, state: &[f64]) -> OracleResult<bool> {
            self.inner.is_valid(state)
        }
        fn check_motion(&self, a: &[f64], b: &[f64]) -> OracleResult<bool> {
            if self.inner.checked_motion_count() >= self.fail_after {
                return Err(OracleError::Checker("checker crashed".to_string()));
            }
            self.inner.check_motion(a, b)
        }
        fn sample_uniform(&self, rng: &mut dyn RngCore) -> Vec<f64> {
            self.inner.sample_uniform(rng)
        }
        fn stats(&self) -> OracleStats {
            self.inner.stats()
        }
    }

    #[test]
    fn test_per_tree_scenario_counts() {
        let space = BoxSpace::unit(2).unwrap();
        let trees = random_trees(&[10, 10, 10], 1);
        let config = MergeConfig::new(3, MergeStrategy::PerTree).with_subset(vec![0, 1, 2]);

        let report = MergeEngine::new(&space).merge(&trees, &config).unwrap();

        // 30 nodes, each querying 2 other trees for 3 neighbors
        assert_eq!(report.candidates, 30 * 2 * 3);
        assert_eq!(report.counters.motion_checks, 180);
        assert_eq!(report.edges.len(), 180);
        assert!(report.edges.iter().all(|e| e.forest_i != e.forest_j));
    }

    #[test]
    fn test_pooled_per_tree_keeps_k_per_node() {
        let space = BoxSpace::unit(2).unwrap();
        let trees = random_trees(&[8, 8, 8], 2);
        let config = MergeConfig::new(3, MergeStrategy::PooledPerTree);

        let report = MergeEngine::new(&space).merge(&trees, &config).unwrap();

        assert_eq!(report.candidates, 24 * 3);
        assert!(report.edges.iter().all(|e| e.forest_i != e.forest_j));
    }

    #[test]
    fn test_pooled_picks_global_nearest() {
        let space = BoxSpace::new(vec![-10.0], vec![10.0]).unwrap();
        let trees = vec![
            Array2::from_shape_vec((1, 1), vec![0.0]).unwrap(),
            Array2::from_shape_vec((2, 1), vec![1.0, 5.0]).unwrap(),
            Array2::from_shape_vec((2, 1), vec![-2.0, 9.0]).unwrap(),
        ];
        let config = MergeConfig::new(2, MergeStrategy::PooledPerTree).with_subset(vec![0]);

        let report = MergeEngine::new(&space).merge(&trees, &config).unwrap();

        let targets: Vec<(usize, usize)> =
            report.edges.iter().map(|e| (e.forest_j, e.motion_j)).collect();
        assert_eq!(targets, vec![(1, 0), (2, 0)]);
    }

    #[test]
    fn test_shared_index_skips_same_tree() {
        let space = BoxSpace::unit(2).unwrap();
        let trees = random_trees(&[15, 15], 3);
        let config = MergeConfig::new(4, MergeStrategy::SharedIndex);

        let report = MergeEngine::new(&space).merge(&trees, &config).unwrap();

        assert!(report.candidates <= 30 * 4);
        assert!(report.edges.iter().all(|e| e.forest_i != e.forest_j));
    }

    #[test]
    fn test_single_source_reaches_every_other_tree() {
        let space = BoxSpace::unit(2).unwrap();
        let trees = random_trees(&[5, 6, 7, 8], 4);
        let config = MergeConfig::new(50, MergeStrategy::SingleSource).with_subset(vec![2]);

        let report = MergeEngine::new(&space).merge(&trees, &config).unwrap();

        // k exceeds the 19 indexed nodes: every one is returned, no error
        assert_eq!(report.candidates, 7 * 19);
        assert!(report.edges.iter().all(|e| e.forest_i == 2 && e.forest_j != 2));
    }

    #[test]
    fn test_dynamic_strategies_agree() {
        let space = BoxSpace::unit(2).unwrap();
        let trees = random_trees(&[20, 12, 9, 30, 4], 5);

        let run = |strategy, index: IndexBackend| {
            let config = MergeConfig::new(4, strategy)
                .with_subset(vec![0])
                .with_index(index);
            MergeEngine::new(&space).merge(&trees, &config).unwrap().edges
        };

        let rebuild = run(MergeStrategy::SingleSourceRebuild, IndexBackend::gnat());
        let remove = run(MergeStrategy::SingleSourceRemove, IndexBackend::gnat());
        let mask = run(MergeStrategy::SingleSourceMask, IndexBackend::gnat());
        let mask_linear = run(MergeStrategy::SingleSourceMask, IndexBackend::Linear);

        assert_eq!(rebuild, remove);
        assert_eq!(rebuild, mask);
        assert_eq!(rebuild, mask_linear);
    }

    #[test]
    fn test_mask_never_returns_excluded_tree() {
        let space = BoxSpace::unit(2).unwrap();
        let trees = random_trees(&[25, 10, 10, 10, 10, 10], 6);
        let config = MergeConfig::new(2, MergeStrategy::SingleSourceMask).with_subset(vec![0]);

        let report = MergeEngine::new(&space).merge(&trees, &config).unwrap();

        // Once a query reaches tree T, later queries never see T
        let mut reached: HashSet<usize> = HashSet::new();
        let mut current = None;
        let mut reached_now = HashSet::new();
        for e in &report.edges {
            if current != Some(e.motion_i) {
                reached.extend(reached_now.drain());
                current = Some(e.motion_i);
            }
            assert!(!reached.contains(&e.forest_j), "tree {} came back", e.forest_j);
            reached_now.insert(e.forest_j);
        }
    }

    #[test]
    fn test_remove_needs_removed_cache() {
        let space = BoxSpace::unit(2).unwrap();
        let trees = random_trees(&[3, 3], 7);
        let config = MergeConfig::new(2, MergeStrategy::SingleSourceRemove)
            .with_subset(vec![0])
            .with_index(IndexBackend::Linear);

        let err = MergeEngine::new(&space).merge(&trees, &config).unwrap_err();

        assert!(matches!(
            err,
            Error::UnsupportedIndexOperation {
                backend: "linear",
                capability: Capability::RemovedCache
            }
        ));
        assert_eq!(space.checked_motion_count(), 0);
    }

    #[test]
    fn test_single_source_needs_one_tree() {
        let space = BoxSpace::unit(2).unwrap();
        let trees = random_trees(&[3, 3, 3], 8);
        let engine = MergeEngine::new(&space);

        for subset in [vec![], vec![0, 1]] {
            let config = MergeConfig::new(2, MergeStrategy::SingleSource).with_subset(subset);
            assert!(matches!(
                engine.merge(&trees, &config),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_rejects_zero_k_and_bad_subset() {
        let space = BoxSpace::unit(2).unwrap();
        let trees = random_trees(&[3, 3], 9);
        let engine = MergeEngine::new(&space);

        let zero_k = MergeConfig::new(0, MergeStrategy::SharedIndex);
        assert!(matches!(engine.merge(&trees, &zero_k), Err(Error::InvalidArgument(_))));

        let bad_subset = MergeConfig::new(2, MergeStrategy::PerTree).with_subset(vec![5]);
        assert!(matches!(engine.merge(&trees, &bad_subset), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_oracle_failure_aborts_merge() {
        let oracle = FlakyOracle {
            inner: BoxSpace::unit(2).unwrap(),
            fail_after: 5,
        };
        let trees = random_trees(&[10, 10], 10);
        let config = MergeConfig::new(3, MergeStrategy::SharedIndex);

        let err = MergeEngine::new(&oracle).merge(&trees, &config).unwrap_err();
        assert!(matches!(err, Error::Oracle(OracleError::Checker(_))));
    }

    #[test]
    fn test_obstacles_reduce_edges() {
        // Wall splits the square; trees live on opposite sides
        let space = BoxSpace::unit(2)
            .unwrap()
            .with_validity(|s| !(s[0] > 0.45 && s[0] < 0.55))
            .with_resolution(0.005);
        let left = Array2::from_shape_vec((3, 2), vec![0.1, 0.1, 0.2, 0.5, 0.3, 0.9]).unwrap();
        let right = Array2::from_shape_vec((3, 2), vec![0.7, 0.1, 0.8, 0.5, 0.9, 0.9]).unwrap();
        let config = MergeConfig::new(3, MergeStrategy::PerTree);

        let report = MergeEngine::new(&space).merge(&[left, right], &config).unwrap();

        assert_eq!(report.candidates, 18);
        assert!(report.edges.is_empty());
    }

    #[test]
    fn test_merge_graphs_numeric_api() {
        let space = BoxSpace::unit(2).unwrap();
        let trees = random_trees(&[4, 4], 11);

        let edges = merge_graphs(&space, &trees, 2, 3, &[1]).unwrap();
        assert_eq!(edges.ncols(), 4);
        assert_eq!(edges.nrows(), 8);
        assert!(edges.rows().into_iter().all(|r| r[0] == 1 && r[2] == 0));

        assert!(merge_graphs(&space, &trees, 0, 0, &[]).is_err());
        assert!(merge_graphs(&space, &trees, 2, 7, &[]).is_err());
        assert!(merge_graphs(&space, &trees, 2, 3, &[-1]).is_err());
    }

    #[test]
    fn test_rebuild_drops_excluded_trees() {
        let forest = Forest::from_trees(&random_trees(&[5, 12, 9, 7], 3), 2).unwrap();
        let dist = |a: NodeId, b: NodeId| {
            let (p, q) = (forest.state(a), forest.state(b));
            p.iter().zip(q).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
        };
        let mut nn = index::build(&IndexBackend::gnat(), Box::new(dist));
        let included: Vec<Cell<bool>> = (0..forest.num_trees()).map(|t| Cell::new(t != 0)).collect();
        fill_included(&mut *nn, &forest, &included);
        assert_eq!(nn.len(), forest.len() - forest.tree_len(0));

        // Tree 2 is reached: the next rebuild leaves it out
        included[2].set(false);
        rebuild_included(&mut *nn, &forest, &included);

        assert_eq!(nn.len(), forest.len() - forest.tree_len(0) - forest.tree_len(2));
        for t in 0..forest.num_trees() {
            for node in forest.tree_nodes(t) {
                assert_eq!(nn.contains(node), included[t].get());
            }
        }
        let found = nn.near(NodeId(0), forest.len());
        assert!(found.iter().all(|r| included[forest.forest_of(r.node)].get()));
    }

    #[test]
    fn test_rebuild_records_delete_time() {
        let space = BoxSpace::unit(2).unwrap();
        let trees = random_trees(&[10, 40, 40], 12);
        let config = MergeConfig::new(3, MergeStrategy::SingleSourceRebuild).with_subset(vec![0]);

        let report = MergeEngine::new(&space).merge(&trees, &config).unwrap();

        assert!(!report.edges.is_empty());
        assert!(report.counters.knn_delete_time > Duration::ZERO);
    }
}

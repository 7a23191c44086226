//! # Planning Session
//!
//! Drives one external planner per solve: seeds it with pre-existing graphs
//! and a predefined sample set, runs it under a [`Watchdog`], and collects
//! the solution path and roadmap. Also hosts the batch pass-throughs to the
//! oracle (`presample`, `validate_states`, `validate_motion_pairs`) and
//! path optimization.
//!
//! The session owns the seeded graphs, so [`PlanningSession::merge_existing_graphs`]
//! can connect them without the caller handing them over again.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::time::Instant;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::adapters::simplify::ShortcutSimplifier;
use crate::core::config::{MergeConfig, MergeStrategy, SessionConfig};
use crate::core::counters::PerformanceCounters;
use crate::core::{EdgeMatrix, VertexMatrix};
use crate::engine::merge::{MergeEngine, MergeReport};
use crate::engine::watchdog::{Budget, TerminationReason, Watchdog};
use crate::error::{Error, Result};
use crate::ports::{
    Clock, CompactTree, MonotonicClock, Oracle, PathSimplifier, PlannerData, PlannerFactory,
    PlannerStatus, RoadmapPlanner, SampleSet,
};

/// Outcome of a solve as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    ExactSolution,
    ApproximateSolution,
    /// Budget or deadline ran out before a solution
    Timeout,
    /// The watchdog aborted a stuck solver
    Stagnant,
    Unknown,
}

impl SolutionStatus {
    fn from_planner(status: PlannerStatus, reason: Option<TerminationReason>) -> Self {
        if reason == Some(TerminationReason::Stagnant) {
            return SolutionStatus::Stagnant;
        }
        match status {
            PlannerStatus::ExactSolution => SolutionStatus::ExactSolution,
            PlannerStatus::ApproximateSolution => SolutionStatus::ApproximateSolution,
            PlannerStatus::Timeout => SolutionStatus::Timeout,
            PlannerStatus::Unknown if reason.is_some() => SolutionStatus::Timeout,
            PlannerStatus::Unknown => SolutionStatus::Unknown,
        }
    }

    /// Whether a path was found
    pub fn is_solved(self) -> bool {
        matches!(
            self,
            SolutionStatus::ExactSolution | SolutionStatus::ApproximateSolution
        )
    }
}

/// Everything a solve produces
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Solution path, one state per row. Partial paths survive stagnation.
    pub path: Option<VertexMatrix>,
    pub status: SolutionStatus,

    /// Roadmap, when `return_graph` is set
    pub graph: Option<PlannerData>,

    /// Sample-set connectivity, when a sample set was injected
    pub connectivity: Option<Array2<i64>>,

    /// Compact tree, when `record_compact_tree` is set
    pub compact_tree: Option<CompactTree>,

    pub counters: PerformanceCounters,

    /// Why the watchdog stopped the solver, if it did
    pub termination: Option<TerminationReason>,
}

/// Orchestrates planners, seeded graphs and batch oracle queries
pub struct PlanningSession<O, F> {
    oracle: Arc<O>,
    factory: F,
    config: SessionConfig,

    seed_vertices: Vec<VertexMatrix>,
    seed_edges: Vec<EdgeMatrix>,
    sample_set: Option<SampleSet>,

    rng: StdRng,
}

impl<O: Oracle, F: PlannerFactory> PlanningSession<O, F> {
    pub fn new(oracle: Arc<O>, factory: F, config: SessionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            oracle,
            factory,
            config,
            seed_vertices: Vec::new(),
            seed_edges: Vec::new(),
            sample_set: None,
            rng,
        }
    }

    pub fn oracle(&self) -> &Arc<O> {
        &self.oracle
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    // ========================================================================
    // SEEDING
    // ========================================================================

    /// Add a pre-existing graph: vertices plus `N × 2` vertex index pairs
    pub fn add_seed_graph(&mut self, vertices: VertexMatrix, edges: EdgeMatrix) -> Result<()> {
        self.check_columns("seed graph", &vertices)?;
        if edges.nrows() > 0 && edges.ncols() != 2 {
            return Err(Error::InvalidArgument(format!(
                "seed graph edges need 2 columns, got {}",
                edges.ncols()
            )));
        }
        let n = vertices.nrows() as i64;
        if edges.iter().any(|&i| i < 0 || i >= n) {
            return Err(Error::InvalidArgument(
                "seed graph edge refers to a missing vertex".to_string(),
            ));
        }
        self.seed_vertices.push(vertices);
        self.seed_edges.push(edges);
        Ok(())
    }

    /// Drop every seeded graph
    pub fn clear_seed_graphs(&mut self) {
        self.seed_vertices.clear();
        self.seed_edges.clear();
    }

    /// Number of seeded graphs
    pub fn seed_graph_count(&self) -> usize {
        self.seed_vertices.len()
    }

    /// Inject a predefined sample set into future solves
    pub fn set_sample_set(&mut self, samples: SampleSet) -> Result<()> {
        self.check_columns("sample set", &samples.samples)?;
        if let Some(flags) = &samples.flags {
            if flags.len() != samples.len() {
                return Err(Error::InvalidArgument(format!(
                    "{} flags for {} samples",
                    flags.len(),
                    samples.len()
                )));
            }
        }
        if samples.tree_bases.is_some() != samples.edge_bases.is_some()
            || samples.tree_bases.is_some() != samples.edges.is_some()
        {
            return Err(Error::InvalidArgument(
                "tree bases, edges and edge bases come together".to_string(),
            ));
        }
        self.sample_set = Some(samples);
        Ok(())
    }

    /// Forget the sample set
    pub fn clear_sample_set(&mut self) {
        self.sample_set = None;
    }

    // ========================================================================
    // MERGE
    // ========================================================================

    /// Connect the seeded graphs with the default index
    pub fn merge_existing_graphs(
        &self,
        k: usize,
        strategy: MergeStrategy,
        subset: Vec<usize>,
    ) -> Result<MergeReport> {
        self.merge_with(&MergeConfig::new(k, strategy).with_subset(subset))
    }

    /// Connect the seeded graphs
    pub fn merge_with(&self, config: &MergeConfig) -> Result<MergeReport> {
        MergeEngine::new(&*self.oracle).merge(&self.seed_vertices, config)
    }

    // ========================================================================
    // SOLVE
    // ========================================================================

    /// Solve under `budget` on the wall clock
    pub fn solve(&mut self, budget: Budget) -> Result<SolveOutcome> {
        self.solve_with_clock(budget, MonotonicClock::new())
    }

    /// Solve under `budget`, timing the watchdog with `clock`
    pub fn solve_with_clock<C: Clock>(&mut self, budget: Budget, clock: C) -> Result<SolveOutcome> {
        if self.config.record_compact_tree && self.sample_set.is_none() {
            return Err(Error::InvalidArgument(
                "record_compact_tree requires a sample set".to_string(),
            ));
        }

        let mut planner = self.factory.create(&self.config.planner)?;
        info!(
            planner = %self.config.planner.planner,
            seeds = self.seed_vertices.len(),
            samples = self.sample_set.as_ref().map_or(0, SampleSet::len),
            ?budget,
            "starting solve"
        );
        for (v, e) in self.seed_vertices.iter().zip(&self.seed_edges) {
            planner.add_graph(v, e)?;
        }
        if let Some(samples) = &self.sample_set {
            planner.set_sample_set(samples)?;
        }

        let before = self.oracle.stats();
        let start = Instant::now();
        let mut watchdog = Watchdog::new(budget, &self.config.watchdog, clock, before.motion_checks);

        let oracle = &self.oracle;
        let status = planner.solve(&mut || watchdog.poll(oracle.checked_motion_count()))?;
        let termination = watchdog.finish();

        let mut counters = PerformanceCounters {
            planning_time: start.elapsed(),
            ..PerformanceCounters::default()
        };
        counters.record_oracle_delta(&before, &self.oracle.stats());

        let status = SolutionStatus::from_planner(status, termination);
        let path = if status.is_solved() || status == SolutionStatus::Stagnant {
            planner.solution_path()
        } else {
            None
        };
        info!(
            ?status,
            ?termination,
            motion_checks = counters.motion_checks,
            elapsed_ms = counters.planning_time.as_millis() as u64,
            "solve finished"
        );

        let graph = self.export_graph(&planner)?;

        for (name, value) in planner.progress_properties() {
            info!(property = %name, %value, "final planner property");
        }

        let (connectivity, compact_tree) = match &self.sample_set {
            Some(_) => {
                let compact = if self.config.record_compact_tree {
                    planner.compact_tree()
                } else {
                    None
                };
                (planner.sample_set_connectivity(), compact)
            }
            None => (None, None),
        };

        Ok(SolveOutcome {
            path,
            status,
            graph,
            connectivity,
            compact_tree,
            counters,
            termination,
        })
    }

    /// Write the roadmap to `output_path` and return it if asked
    fn export_graph<P: RoadmapPlanner>(&self, planner: &P) -> Result<Option<PlannerData>> {
        if self.config.output_path.is_none() && !self.config.return_graph {
            return Ok(None);
        }

        let data = planner.planner_data();
        if let Some(path) = &self.config.output_path {
            let mut out = BufWriter::new(File::create(path)?);
            data.write_text(&mut out)?;
            out.flush()?;
            debug!(path = %path.display(), vertices = data.vertices.nrows(), "wrote planner data");
        }

        Ok(self.config.return_graph.then_some(data))
    }

    // ========================================================================
    // BATCH ORACLE QUERIES
    // ========================================================================

    /// Draw `n` uniform states. No validity filtering.
    pub fn presample(&mut self, n: usize) -> VertexMatrix {
        let mut out = Array2::zeros((n, self.oracle.dimension()));
        for mut row in out.rows_mut() {
            let state = self.oracle.sample_uniform(&mut self.rng);
            for (x, s) in row.iter_mut().zip(state) {
                *x = s;
            }
        }
        out
    }

    /// Validity of each row
    pub fn validate_states(&self, states: &VertexMatrix) -> Result<Vec<bool>> {
        self.check_columns("states", states)?;
        states
            .rows()
            .into_iter()
            .map(|row| self.oracle.is_valid(&row.to_vec()).map_err(Error::from))
            .collect()
    }

    /// Validity of each motion `from[i] -> to[i]`
    pub fn validate_motion_pairs(&self, from: &VertexMatrix, to: &VertexMatrix) -> Result<Vec<bool>> {
        if from.nrows() != to.nrows() {
            return Err(Error::InvalidArgument(format!(
                "{} start states but {} end states",
                from.nrows(),
                to.nrows()
            )));
        }
        self.check_columns("start states", from)?;
        self.check_columns("end states", to)?;
        from.rows()
            .into_iter()
            .zip(to.rows())
            .map(|(a, b)| {
                self.oracle
                    .check_motion(&a.to_vec(), &b.to_vec())
                    .map_err(Error::from)
            })
            .collect()
    }

    /// Shortcut `path` for at most `days`
    pub fn optimize(&self, path: VertexMatrix, days: f64) -> Result<VertexMatrix> {
        let simplifier = ShortcutSimplifier::new(&*self.oracle);
        self.optimize_with(&simplifier, path, days)
    }

    /// Simplify `path` with a caller-chosen simplifier for at most `days`
    pub fn optimize_with<S: PathSimplifier + ?Sized>(
        &self,
        simplifier: &S,
        path: VertexMatrix,
        days: f64,
    ) -> Result<VertexMatrix> {
        let budget = Budget::days(days)?;
        self.check_columns("path", &path)?;

        let mut watchdog = Watchdog::new(budget, &self.config.watchdog, MonotonicClock::new(), 0);
        let before = path.nrows();
        let out = simplifier.simplify(path, &mut || watchdog.poll(0))?;
        debug!(before, after = out.nrows(), "optimized path");
        Ok(out)
    }

    fn check_columns(&self, what: &str, m: &VertexMatrix) -> Result<()> {
        let dim = self.oracle.dimension();
        if m.nrows() > 0 && m.ncols() != dim {
            return Err(Error::InvalidArgument(format!(
                "{what} has {} columns, space has {dim}",
                m.ncols()
            )));
        }
        Ok(())
    }
}

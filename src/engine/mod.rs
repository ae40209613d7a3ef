//! The traversal engine: a two-level SPMD worker pool with per-round
//! direction selection.
//!
//! [`Traversal::run`] spawns `num_domains * sub_workers` scoped threads.
//! Every worker executes the same driver closure against a
//! [`WorkerScope`], so a graph algorithm reads like sequential code:
//! `while scope.num_active() > 0 { scope.edge_map(&op, threshold, opts); }`.
//!
//! Each `edge_map` call chooses a direction from the Beamer heuristic:
//! with `m = active vertices + active out-edges`, `m >= threshold` runs a
//! dense round (scan destination in-edges, pull), otherwise a sparse round
//! (scan source out-edges, push). The engine double-buffers the frontier:
//! kernels read `current` and write `next` through atomics, and the leader
//! swaps the two collections behind the round's final barrier. All
//! cross-thread mutation of the collections themselves happens in
//! leader-only phases fenced by [`SubPartitioner::global_wait`]; the
//! `PhaseCell` SAFETY comments below each name the phase that justifies
//! them.

mod async_sparse;
mod dense;
pub mod ops;
mod sparse;
mod vertex;

pub use ops::{EdgeOp, ReduceOp};

use core::sync::atomic::AtomicUsize;
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::concurrency::{PhaseCell, SpinBarrier};
use crate::config::EngineConfig;
use crate::frontier::{Frontier, FrontierCollection};
use crate::graph::{Graph, VertexId};
use crate::partition::{self, SubPartitioner, DEGREE_BLOCK};

use async_sparse::AsyncState;
use sparse::SparseSink;

/// Denominator of the classic direction heuristic: a frontier touching more
/// than `1/20` of the edge set is usually cheaper to process by pulling.
pub const DIRECTION_FRACTION: usize = 20;

/// The direction an `edge_map` round ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Dense round: scan vertex ranges, bitmap frontier.
    Dense,
    /// Sparse round: scan the active id list, push to sinks.
    Sparse,
}

/// Kernel used when the direction heuristic picks dense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DenseVariant {
    /// Destination-centric: each vertex scans its in-edges for active
    /// sources and stops early once its operator is satisfied.
    #[default]
    Pull,
    /// Source-centric over the dense bitmap, statically partitioned.
    Forward,
    /// Source-centric with dynamic chunk claiming, for skewed degree
    /// distributions where static slices leave workers idle.
    ForwardDynamic,
}

/// Kernel used when the direction heuristic picks sparse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SparseVariant {
    /// Round-synchronous push with static splitting of the active list.
    #[default]
    Static,
    /// Asynchronous push: workers redistribute activation chunks through a
    /// queue and run to a local fixed point within the round.
    Async,
}

/// Per-call kernel selection for [`WorkerScope::edge_map`]. The direction
/// itself is chosen by the threshold; these pick the kernel within each
/// direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeMapOptions {
    /// Dense-direction kernel.
    pub dense: DenseVariant,
    /// Sparse-direction kernel.
    pub sparse: SparseVariant,
}

/// Vertices per chunk claimed from the shared cursor by
/// [`DenseVariant::ForwardDynamic`].
pub(crate) const FORWARD_CHUNK: usize = 1024;

/// State shared by every worker of one [`Traversal::run`] call.
pub(crate) struct Shared<'g> {
    pub(crate) graph: &'g Graph,
    /// Frontier being consumed this round.
    pub(crate) current: PhaseCell<FrontierCollection>,
    /// Frontier being produced this round.
    pub(crate) next: PhaseCell<FrontierCollection>,
    /// Per-domain output buffers for sparse rounds.
    pub(crate) sinks: Vec<PhaseCell<SparseSink>>,
    /// Chunk cursor for the dynamic dense-forward kernel.
    pub(crate) forward_cursor: CachePadded<AtomicUsize>,
    /// Queue, idle flags and termination state for async rounds.
    pub(crate) async_state: AsyncState,
}

/// Swaps `current` and `next` behind a barrier. Every kernel ends here; on
/// return all threads agree on the new `current`.
pub(crate) fn finish_round(shared: &Shared<'_>, part: &SubPartitioner) {
    part.global_wait();
    if part.is_leader() {
        // SAFETY: leader-only swap phase; all other threads sit between the
        // barrier above and the one below.
        unsafe {
            let nxt = shared.next.get_mut();
            nxt.refresh_mode();
            let cur = shared.current.get_mut();
            cur.refresh_mode();
            core::mem::swap(cur, nxt);
        }
    }
    part.global_wait();
}

/// A traversal over one graph with a persistent frontier.
///
/// Owns the frontier between runs; `run` moves it into the worker pool and
/// takes it back when the pool joins.
pub struct Traversal<'g> {
    graph: &'g Graph,
    frontier: FrontierCollection,
    num_domains: usize,
    sub_workers: usize,
    pin_threads: bool,
}

impl<'g> Traversal<'g> {
    /// Builds a traversal from an existing frontier collection.
    ///
    /// # Panics
    /// Panics if the frontier does not cover the graph's vertex set or its
    /// domain count disagrees with the configuration.
    pub fn new(graph: &'g Graph, frontier: FrontierCollection, config: &EngineConfig) -> Self {
        assert!(
            frontier.vertex_count() == graph.vertex_count(),
            "frontier covers {} vertices, graph has {}",
            frontier.vertex_count(),
            graph.vertex_count()
        );
        assert!(
            frontier.num_domains() == config.num_domains,
            "frontier has {} domains, config wants {}",
            frontier.num_domains(),
            config.num_domains
        );
        Self {
            graph,
            frontier,
            num_domains: config.num_domains,
            sub_workers: config.sub_workers,
            pin_threads: config.pin_threads,
        }
    }

    /// Builds a traversal whose frontier holds exactly `seeds`, with domain
    /// boundaries balanced by out-degree.
    ///
    /// # Panics
    /// Panics if a seed id is out of range.
    pub fn from_seeds(graph: &'g Graph, config: &EngineConfig, seeds: &[VertexId]) -> Self {
        let degrees = graph.degrees(true);
        let bounds = partition_by_degree_or_single(&degrees, config.num_domains);
        let mut domains: Vec<Frontier> =
            bounds.windows(2).map(|w| Frontier::new(w[0], w[1])).collect();
        for &seed in seeds {
            let d = bounds.partition_point(|&off| off <= seed) - 1;
            domains[d].set_active(seed, true);
        }
        for f in &mut domains {
            f.recount(graph);
        }
        Self::new(graph, FrontierCollection::new(domains), config)
    }

    /// `(n + m) / 20`, the conventional threshold for
    /// [`WorkerScope::edge_map`].
    pub fn default_threshold(&self) -> usize {
        (self.graph.vertex_count() + self.graph.edge_count()) / DIRECTION_FRACTION
    }

    /// The frontier as of the last finished run.
    pub fn frontier(&self) -> &FrontierCollection {
        &self.frontier
    }

    /// Consumes the traversal, yielding the frontier.
    pub fn into_frontier(self) -> FrontierCollection {
        self.frontier
    }

    /// Runs `body` on every worker of the two-level pool and joins.
    ///
    /// `body` is an SPMD driver: every worker executes it in lockstep, and
    /// collective calls ([`WorkerScope::edge_map`] and friends) must be
    /// reached by all workers in the same order. Per-worker results are
    /// returned in `(domain, sub)` spawn order. A panic on any worker
    /// propagates.
    pub fn run<R, F>(&mut self, body: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&mut WorkerScope<'_, 'g>) -> R + Sync,
    {
        let bounds: Vec<usize> = self.frontier.offsets().to_vec();
        let workers = self.num_domains * self.sub_workers;
        // Placeholder while the pool owns the collection.
        let current = core::mem::replace(&mut self.frontier, FrontierCollection::empty(&[0, 0]));
        let shared = Shared {
            graph: self.graph,
            current: PhaseCell::new(current),
            next: PhaseCell::new(FrontierCollection::empty(&bounds)),
            sinks: (0..self.num_domains)
                .map(|_| PhaseCell::new(SparseSink::new()))
                .collect(),
            forward_cursor: CachePadded::new(AtomicUsize::new(0)),
            async_state: AsyncState::new(workers, self.graph.vertex_count()),
        };
        let cross = Arc::new(SpinBarrier::new(self.num_domains));
        let locals: Vec<Arc<SpinBarrier>> = (0..self.num_domains)
            .map(|_| Arc::new(SpinBarrier::new(self.sub_workers)))
            .collect();

        let results = std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for d in 0..self.num_domains {
                for s in 0..self.sub_workers {
                    let part = SubPartitioner::new(
                        d,
                        s,
                        self.num_domains,
                        self.sub_workers,
                        bounds[d]..bounds[d + 1],
                        Arc::clone(&locals[d]),
                        Arc::clone(&cross),
                    );
                    let shared = &shared;
                    let body = &body;
                    let pin = self.pin_threads;
                    handles.push(scope.spawn(move || {
                        if pin {
                            partition::pin_current_thread(part.domain(), part.num_domains());
                        }
                        let mut ws = WorkerScope { shared, part };
                        body(&mut ws)
                    }));
                }
            }
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });
        self.frontier = shared.current.into_inner();
        results
    }
}

fn partition_by_degree_or_single(degrees: &[usize], num_domains: usize) -> Vec<usize> {
    if num_domains == 1 {
        return vec![0, degrees.len()];
    }
    partition::partition_by_degree(degrees, num_domains, DEGREE_BLOCK)
}

/// One worker's handle into a running traversal.
///
/// The collective methods (`edge_map`, `edge_map_reduce`, `vertex_filter`)
/// contain barriers: every worker must call them, with the same arguments,
/// in the same order. `vertex_map` and the read accessors are barrier-free.
pub struct WorkerScope<'a, 'g> {
    shared: &'a Shared<'g>,
    part: SubPartitioner,
}

impl<'g> WorkerScope<'_, 'g> {
    /// The graph being traversed.
    pub fn graph(&self) -> &'g Graph {
        self.shared.graph
    }

    /// This worker's partition descriptor.
    pub fn partitioner(&self) -> &SubPartitioner {
        &self.part
    }

    /// Whether this worker is the pool leader.
    pub fn is_leader(&self) -> bool {
        self.part.is_leader()
    }

    /// Global barrier across every worker of the pool.
    pub fn sync(&self) {
        self.part.global_wait();
    }

    /// Active vertices in the current frontier.
    pub fn num_active(&self) -> usize {
        // SAFETY: between collective calls every thread only reads the
        // collections; the stats are relaxed atomics published by the last
        // round's final barrier.
        let cur = unsafe { self.shared.current.get() };
        cur.num_active_uncached()
    }

    /// Sum of out-degrees of the current frontier's active vertices.
    pub fn active_edge_count(&self) -> usize {
        // SAFETY: read phase, as in `num_active`.
        let cur = unsafe { self.shared.current.get() };
        cur.active_edge_count()
    }

    /// One direction-optimized traversal round.
    ///
    /// Computes `m = num_active + active_edge_count` and runs dense when
    /// `m >= threshold` (ties go dense), sparse otherwise. Consumes the
    /// current frontier and installs the produced one; returns the
    /// direction taken.
    pub fn edge_map<O: EdgeOp>(
        &self,
        op: &O,
        threshold: usize,
        opts: EdgeMapOptions,
    ) -> Direction {
        // SAFETY: read phase; the stats were published before the previous
        // round's final barrier, so every worker computes the same m and
        // takes the same branch.
        let m = {
            let cur = unsafe { self.shared.current.get() };
            cur.num_active_uncached() + cur.active_edge_count()
        };
        let dir = if m >= threshold {
            Direction::Dense
        } else {
            Direction::Sparse
        };
        // Keeps stragglers of the preceding read phase out of the upcoming
        // leader phase.
        self.part.global_wait();
        #[cfg(feature = "tracing")]
        if self.part.is_leader() {
            tracing::debug!(m, threshold, direction = ?dir, "edge_map round");
        }
        match dir {
            Direction::Dense => dense::round(self.shared, &self.part, op, opts.dense),
            Direction::Sparse => match opts.sparse {
                SparseVariant::Static => sparse::round(self.shared, &self.part, op),
                SparseVariant::Async => async_sparse::round(self.shared, &self.part, op),
            },
        }
        dir
    }

    /// Whole-graph gather round: every vertex folds its in-edges through
    /// `op` regardless of the current frontier, and vertices whose fold
    /// reported an activation form the next frontier.
    pub fn edge_map_reduce<R: ReduceOp>(&self, op: &R) {
        self.part.global_wait();
        dense::reduce_round(self.shared, &self.part, op);
    }

    /// Applies `f` to every active vertex, split across workers. No
    /// barrier: `f` must only touch operator state, and callers that need
    /// the map completed before non-collective reads insert a `sync`.
    pub fn vertex_map<F: Fn(VertexId) + Sync>(&self, f: F) {
        vertex::map(self.shared, &self.part, &f);
    }

    /// Replaces the current frontier with its subset satisfying `pred`.
    pub fn vertex_filter<P: Fn(VertexId) -> bool + Sync>(&self, pred: P) {
        self.part.global_wait();
        vertex::filter(self.shared, &self.part, &pred);
    }
}

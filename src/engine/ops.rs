//! Operator traits plugged into the traversal kernels.
//!
//! An [`EdgeOp`] is the per-edge relaxation an algorithm supplies: BFS
//! parent-claiming, SSSP distance relaxation, label propagation. The
//! kernels call it from many threads at once, so implementations keep
//! their per-vertex state in atomics and resolve write-write races with
//! compare-exchange loops.

use crate::graph::{VertexId, Weight};

/// Per-edge relaxation operator driven by the traversal kernels.
///
/// `try_activate` may be invoked multiple times for the same destination
/// within one round (once per incoming edge from the active set), possibly
/// from different threads. It must be safe under that concurrency and
/// should return `true` at most as often as the algorithm wants the
/// destination scheduled.
pub trait EdgeOp: Sync {
    /// Whether `v` is still worth processing. Dense-pull kernels check this
    /// before scanning `v`'s in-edges and stop scanning once it turns
    /// false, which is what makes pull rounds cheap near convergence.
    fn should_process(&self, v: VertexId) -> bool;

    /// Attempts the relaxation along `src -> dst` with edge weight
    /// `weight`. Returns `true` iff `dst` should join the next frontier.
    fn try_activate(&self, src: VertexId, dst: VertexId, weight: Weight) -> bool;
}

/// Gather-style operator for whole-graph aggregation rounds.
///
/// Each vertex folds its in-edges into a thread-local accumulator which is
/// then combined into the operator's global state exactly once. PageRank's
/// rank sum is the canonical instance.
pub trait ReduceOp: Sync {
    /// Per-vertex accumulator.
    type Acc;

    /// Fresh accumulator for one destination vertex.
    fn init(&self) -> Self::Acc;

    /// Folds the contribution of in-edge `src -> (dst)` into `acc`.
    /// Returns `true` iff the contribution should activate the destination.
    fn fold(&self, acc: &mut Self::Acc, src: VertexId, weight: Weight) -> bool;

    /// Publishes the finished accumulator for vertex `v`. Called once per
    /// vertex per round, by the worker that owns `v`'s dense slice.
    fn combine(&self, acc: Self::Acc, v: VertexId);
}

//! Dense-direction kernels: bitmap frontier, vertex-range partitioning.
//!
//! A dense round has five phases. The leader converts `current` to dense
//! and resets `next` to an empty dense shell; sub-workers clear their slice
//! of the `next` bitmap; everyone traverses; everyone recounts its slice
//! into the `next` stats; the leader swaps the buffers. Barriers separate
//! the phases, so traversal only ever sees a stable `current` and writes
//! `next` through atomic bit sets.

use core::sync::atomic::Ordering;

use crate::engine::ops::{EdgeOp, ReduceOp};
use crate::engine::{finish_round, DenseVariant, Shared, FORWARD_CHUNK};
use crate::frontier::FrontierCollection;
use crate::partition::SubPartitioner;

pub(crate) fn round<O: EdgeOp>(
    shared: &Shared<'_>,
    part: &SubPartitioner,
    op: &O,
    variant: DenseVariant,
) {
    if part.is_leader() {
        // SAFETY: leader prep phase; every other worker waits at the
        // barrier below before touching either collection.
        unsafe {
            shared.current.get_mut().to_dense();
            let nxt = shared.next.get_mut();
            for d in 0..nxt.num_domains() {
                nxt.domain_mut(d).reset_dense_shell();
            }
            nxt.refresh_mode();
        }
        if variant == DenseVariant::ForwardDynamic {
            shared.forward_cursor.store(0, Ordering::Relaxed);
        }
    }
    part.global_wait();

    // SAFETY: shared-read / atomic-write phase for both collections until
    // the swap in finish_round.
    let cur = unsafe { shared.current.get() };
    let nxt = unsafe { shared.next.get() };

    clear_slice(nxt, part);
    part.global_wait();

    match variant {
        DenseVariant::Pull => pull(shared, part, cur, nxt, op),
        DenseVariant::Forward => forward(shared, part, cur, nxt, op),
        DenseVariant::ForwardDynamic => forward_dynamic(shared, part, cur, nxt, op),
    }
    part.global_wait();

    recount_slice(shared, part, nxt);
    finish_round(shared, part);
}

/// Whole-graph gather round (see [`crate::engine::WorkerScope::edge_map_reduce`]).
/// Ignores the current frontier: every vertex with in-edges folds them.
pub(crate) fn reduce_round<R: ReduceOp>(shared: &Shared<'_>, part: &SubPartitioner, op: &R) {
    if part.is_leader() {
        // SAFETY: leader prep phase.
        unsafe {
            let nxt = shared.next.get_mut();
            for d in 0..nxt.num_domains() {
                nxt.domain_mut(d).reset_dense_shell();
            }
            nxt.refresh_mode();
        }
    }
    part.global_wait();

    // SAFETY: shared-read / atomic-write phase.
    let nxt = unsafe { shared.next.get() };
    clear_slice(nxt, part);
    part.global_wait();

    let graph = shared.graph;
    let mine = nxt.domain(part.domain());
    for v in part.dense_range() {
        let in_edges = graph.in_neighbors(v);
        if in_edges.is_empty() {
            continue;
        }
        let mut acc = op.init();
        let mut activated = false;
        for &(src, weight) in in_edges {
            if op.fold(&mut acc, src, weight) {
                activated = true;
            }
        }
        op.combine(acc, v);
        if activated {
            mine.activate(v);
        }
    }
    part.global_wait();

    recount_slice(shared, part, nxt);
    finish_round(shared, part);
}

fn clear_slice(nxt: &FrontierCollection, part: &SubPartitioner) {
    let f = nxt.domain(part.domain());
    let r = part.dense_range();
    f.clear_local_range(r.start - f.start(), r.end - f.start());
}

fn recount_slice(shared: &Shared<'_>, part: &SubPartitioner, nxt: &FrontierCollection) {
    let f = nxt.domain(part.domain());
    let r = part.dense_range();
    let (active, out_edges) =
        f.count_local_range(shared.graph, r.start - f.start(), r.end - f.start());
    f.add_stats(active, out_edges);
}

/// Destination-centric: each vertex of this worker's slice scans its
/// in-edges for active sources. The operator's `should_process` gate is
/// re-checked inside the scan, aborting a vertex as soon as it is
/// satisfied; near convergence most vertices exit on the first check.
fn pull<O: EdgeOp>(
    shared: &Shared<'_>,
    part: &SubPartitioner,
    cur: &FrontierCollection,
    nxt: &FrontierCollection,
    op: &O,
) {
    let graph = shared.graph;
    let mine = nxt.domain(part.domain());
    for v in part.dense_range() {
        if !op.should_process(v) {
            continue;
        }
        for &(src, weight) in graph.in_neighbors(v) {
            if cur.is_active_dense(src) && op.try_activate(src, v, weight) {
                mine.activate(v);
            }
            if !op.should_process(v) {
                break;
            }
        }
    }
}

/// Source-centric over the dense bitmap: this worker's slice of active
/// sources pushes along out-edges, activating destinations in whichever
/// domain owns them.
fn forward<O: EdgeOp>(
    shared: &Shared<'_>,
    part: &SubPartitioner,
    cur: &FrontierCollection,
    nxt: &FrontierCollection,
    op: &O,
) {
    let graph = shared.graph;
    let curf = cur.domain(part.domain());
    let r = part.dense_range();
    for src in curf.iter_active_range(r.start - curf.start(), r.end - curf.start()) {
        for &(dst, weight) in graph.out_neighbors(src) {
            if op.should_process(dst) && op.try_activate(src, dst, weight) {
                nxt.activate(dst);
            }
        }
    }
}

/// Like [`forward`], but workers claim [`FORWARD_CHUNK`]-sized chunks of
/// the whole vertex range from a shared cursor instead of scanning a fixed
/// slice. Chunks cross domain boundaries; activity is routed per id.
fn forward_dynamic<O: EdgeOp>(
    shared: &Shared<'_>,
    _part: &SubPartitioner,
    cur: &FrontierCollection,
    nxt: &FrontierCollection,
    op: &O,
) {
    let graph = shared.graph;
    let n = graph.vertex_count();
    loop {
        let start = shared.forward_cursor.fetch_add(FORWARD_CHUNK, Ordering::Relaxed);
        if start >= n {
            break;
        }
        let end = (start + FORWARD_CHUNK).min(n);
        for src in start..end {
            if !cur.is_active_dense(src) {
                continue;
            }
            for &(dst, weight) in graph.out_neighbors(src) {
                if op.should_process(dst) && op.try_activate(src, dst, weight) {
                    nxt.activate(dst);
                }
            }
        }
    }
}

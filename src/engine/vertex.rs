//! Vertex-wise kernels: apply and filter over the active set.

use crate::engine::{finish_round, Shared};
use crate::graph::VertexId;
use crate::partition::SubPartitioner;

/// Applies `f` to this worker's share of the active set. Dense frontiers
/// split by vertex range, sparse ones by list slice.
pub(crate) fn map<F: Fn(VertexId)>(shared: &Shared<'_>, part: &SubPartitioner, f: &F) {
    // SAFETY: read phase; the frontier is stable between collective calls.
    let cur = unsafe { shared.current.get() };
    let fr = cur.domain(part.domain());
    if fr.is_dense() {
        let r = part.dense_range();
        for id in fr.iter_active_range(r.start - fr.start(), r.end - fr.start()) {
            f(id);
        }
    } else {
        let ids = fr.sparse_ids();
        let slice = part.claim_local(ids.len());
        for &id in &ids[slice] {
            f(id);
        }
    }
}

/// Rebuilds the frontier as the subset of active vertices satisfying
/// `pred`. Same phase structure as a dense round, minus the edge scan.
pub(crate) fn filter<P: Fn(VertexId) -> bool>(
    shared: &Shared<'_>,
    part: &SubPartitioner,
    pred: &P,
) {
    if part.is_leader() {
        // SAFETY: leader prep phase; the other workers wait at the barrier
        // below.
        unsafe {
            let nxt = shared.next.get_mut();
            for d in 0..nxt.num_domains() {
                nxt.domain_mut(d).reset_dense_shell();
            }
            nxt.refresh_mode();
        }
    }
    part.global_wait();

    // SAFETY: shared-read / atomic-write phase until the swap.
    let nxt = unsafe { shared.next.get() };
    let out = nxt.domain(part.domain());
    let r = part.dense_range();
    out.clear_local_range(r.start - out.start(), r.end - out.start());
    part.global_wait();

    // Both the dense slice and the sparse list of a domain only contain
    // that domain's ids, so every activation lands in the local output.
    map(shared, part, &|id| {
        if pred(id) {
            out.activate(id);
        }
    });
    part.global_wait();

    let (active, out_edges) =
        out.count_local_range(shared.graph, r.start - out.start(), r.end - out.start());
    out.add_stats(active, out_edges);
    finish_round(shared, part);
}

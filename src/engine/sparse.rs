//! Round-synchronous sparse-direction kernel: active id list, push along
//! out-edges into per-domain sinks.
//!
//! The leader compacts `current` to sparse; each domain leader sizes its
//! sink by the frontier's active out-edge sum (the exact upper bound on
//! appends, since each out-edge of an active source is processed once);
//! workers claim static slices of the concatenated active list and push
//! successful activations into the sink of the destination's domain; each
//! domain leader then installs its drained sink as the domain's next
//! sparse list.

use core::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::engine::ops::EdgeOp;
use crate::engine::{finish_round, Shared};
use crate::graph::VertexId;
use crate::partition::SubPartitioner;

/// Append-only id buffer shared by the workers of a sparse round.
///
/// Fixed capacity, cursor via `fetch_add`; running past the capacity is a
/// sizing bug upstream and panics rather than corrupting memory.
pub(crate) struct SparseSink {
    ids: Box<[AtomicUsize]>,
    len: CachePadded<AtomicUsize>,
}

impl SparseSink {
    pub(crate) fn new() -> Self {
        Self {
            ids: Box::new([]),
            len: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Empties the sink and grows it to hold at least `capacity` ids.
    /// Keeps a larger existing buffer; rounds reuse the allocation.
    pub(crate) fn reset(&mut self, capacity: usize) {
        if self.ids.len() < capacity {
            self.ids = (0..capacity).map(|_| AtomicUsize::new(0)).collect();
        }
        *self.len.get_mut() = 0;
    }

    /// Appends an id.
    ///
    /// # Panics
    /// Panics if the sink is full.
    #[inline]
    pub(crate) fn push(&self, id: VertexId) {
        let slot = self.len.fetch_add(1, Ordering::Relaxed);
        assert!(
            slot < self.ids.len(),
            "sparse sink overflow: slot {slot}, capacity {}",
            self.ids.len()
        );
        self.ids[slot].store(id, Ordering::Relaxed);
    }

    /// Copies the appended ids out, leaving the sink empty.
    pub(crate) fn drain(&mut self) -> Vec<VertexId> {
        let n = *self.len.get_mut();
        *self.len.get_mut() = 0;
        self.ids[..n].iter_mut().map(|slot| *slot.get_mut()).collect()
    }
}

pub(crate) fn round<O: EdgeOp>(shared: &Shared<'_>, part: &SubPartitioner, op: &O) {
    if part.is_leader() {
        // SAFETY: leader prep phase; everyone else waits at the barrier
        // below.
        unsafe { shared.current.get_mut().to_sparse() };
    }
    part.global_wait();

    // SAFETY: read phase for `current` until the swap in finish_round.
    let cur = unsafe { shared.current.get() };
    let d = part.domain();

    if part.is_domain_leader() {
        // SAFETY: one domain leader per sink until the next barrier.
        let sink = unsafe { shared.sinks[d].get_mut() };
        sink.reset(cur.active_edge_count());
    }
    part.global_wait();

    // Traversal phase: static split of the concatenated active list.
    let graph = shared.graph;
    let total = cur.num_active_uncached();
    let slice = part.claim_global(total);
    for src in ActiveWalk::new(cur, slice.start, slice.end) {
        for &(dst, weight) in graph.out_neighbors(src) {
            if op.should_process(dst) && op.try_activate(src, dst, weight) {
                // SAFETY: sink append phase; all writers go through the
                // atomic cursor, drains wait behind the next barrier.
                unsafe { shared.sinks[cur.domain_of(dst)].get() }.push(dst);
            }
        }
    }
    part.global_wait();

    if part.is_domain_leader() {
        // SAFETY: one domain leader per sink and per next-domain frontier
        // until the next barrier; finish_round's leader refreshes the
        // collection-level flags.
        unsafe {
            let ids = shared.sinks[d].get_mut().drain();
            let f = shared.next.get().domain_mut_shared(d);
            f.set_sparse(ids);
            f.recount(graph);
        }
    }
    finish_round(shared, part);
}

/// Iterates positions `[from, to)` of the concatenated per-domain sparse
/// lists, yielding source ids.
struct ActiveWalk<'a> {
    cur: &'a crate::frontier::FrontierCollection,
    domain: usize,
    idx: usize,
    remaining: usize,
}

impl<'a> ActiveWalk<'a> {
    fn new(cur: &'a crate::frontier::FrontierCollection, from: usize, to: usize) -> Self {
        let mut domain = 0;
        let mut skip = from;
        while domain < cur.num_domains() && skip >= cur.domain(domain).sparse_ids().len() {
            skip -= cur.domain(domain).sparse_ids().len();
            domain += 1;
        }
        Self {
            cur,
            domain,
            idx: skip,
            remaining: to - from,
        }
    }
}

impl Iterator for ActiveWalk<'_> {
    type Item = VertexId;

    fn next(&mut self) -> Option<VertexId> {
        if self.remaining == 0 {
            return None;
        }
        while self.domain < self.cur.num_domains() {
            let ids = self.cur.domain(self.domain).sparse_ids();
            if self.idx < ids.len() {
                let id = ids[self.idx];
                self.idx += 1;
                self.remaining -= 1;
                return Some(id);
            }
            self.domain += 1;
            self.idx = 0;
        }
        None
    }
}

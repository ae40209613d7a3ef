//! Per-domain frontier: the set of vertices active in a traversal round.
//!
//! A frontier covers the half-open vertex range `[start, end)` owned by one
//! NUMA domain and stores the active set either densely (word-packed atomic
//! bitmap, one bit per vertex in the range) or sparsely (list of active
//! global ids). Exactly one representation is authoritative at a time;
//! conversions are lossless and idempotent, and dense→sparse compaction
//! yields ascending id order.
//!
//! Alongside the set, a frontier caches two statistics the engine's
//! direction heuristic reads every round: the active count and the sum of
//! out-degrees of active vertices. They are relaxed atomics so sub-workers
//! can accumulate them concurrently during the recount phase.

pub mod collection;

pub use collection::FrontierCollection;

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::concurrency::AtomicBitset;
use crate::graph::{Graph, VertexId};

/// The active-vertex set of one domain's vertex range.
pub struct Frontier {
    start: VertexId,
    end: VertexId,
    bits: AtomicBitset,
    sparse: Vec<VertexId>,
    dense: bool,
    active: AtomicUsize,
    active_out_edges: AtomicUsize,
}

impl Frontier {
    /// Creates an empty sparse frontier covering `[start, end)`.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: VertexId, end: VertexId) -> Self {
        assert!(start <= end, "invalid frontier range {start}..{end}");
        Self {
            start,
            end,
            bits: AtomicBitset::new(end - start),
            sparse: Vec::new(),
            dense: false,
            active: AtomicUsize::new(0),
            active_out_edges: AtomicUsize::new(0),
        }
    }

    /// First vertex id of the covered range.
    pub fn start(&self) -> VertexId {
        self.start
    }

    /// One past the last vertex id of the covered range.
    pub fn end(&self) -> VertexId {
        self.end
    }

    /// Number of vertices covered.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the covered range is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `id` falls inside the covered range.
    #[inline]
    pub fn in_range(&self, id: VertexId) -> bool {
        self.start <= id && id < self.end
    }

    /// Whether the dense bitmap is authoritative.
    pub fn is_dense(&self) -> bool {
        self.dense
    }

    fn check_range(&self, id: VertexId) {
        assert!(
            self.in_range(id),
            "vertex {id} outside frontier range {}..{}",
            self.start,
            self.end
        );
    }

    /// Converts sparse→dense in place. No-op if already dense.
    pub fn to_dense(&mut self) {
        if self.dense {
            return;
        }
        self.bits.clear_all();
        let mut distinct = 0;
        for &id in &self.sparse {
            // Ids were range-checked on insertion.
            if self.bits.test_and_set(id - self.start, Ordering::Relaxed) {
                distinct += 1;
            }
        }
        // A push round may have appended a destination twice; the bitmap
        // collapses duplicates, so the count follows it.
        *self.active.get_mut() = distinct;
        self.dense = true;
    }

    /// Converts dense→sparse in place. No-op if already sparse.
    ///
    /// The produced list is ascending, which makes conversion round-trips
    /// canonical regardless of earlier insertion order.
    pub fn to_sparse(&mut self) {
        if !self.dense {
            return;
        }
        let start = self.start;
        self.sparse = self.bits.iter_ones(0, self.len()).map(|i| i + start).collect();
        self.active.store(self.sparse.len(), Ordering::Relaxed);
        self.dense = false;
    }

    /// Marks `id` active (or inactive), maintaining the active count.
    ///
    /// Setup-path operation; traversal writers use [`Frontier::activate`]
    /// instead. Out-of-range ids are a caller contract violation.
    ///
    /// # Panics
    /// Panics if `id` is outside `[start, end)`.
    pub fn set_active(&mut self, id: VertexId, value: bool) {
        self.check_range(id);
        if self.dense {
            let bit = id - self.start;
            if value {
                if self.bits.test_and_set(bit, Ordering::Relaxed) {
                    *self.active.get_mut() += 1;
                }
            } else if self.bits.is_set(bit) {
                self.bits.clear(bit, Ordering::Relaxed);
                *self.active.get_mut() -= 1;
            }
        } else if value {
            if !self.sparse.contains(&id) {
                self.sparse.push(id);
                *self.active.get_mut() += 1;
            }
        } else {
            let before = self.sparse.len();
            self.sparse.retain(|&v| v != id);
            *self.active.get_mut() -= before - self.sparse.len();
        }
    }

    /// Whether `id` is active.
    ///
    /// # Panics
    /// Panics if `id` is outside `[start, end)`.
    #[inline]
    pub fn is_active(&self, id: VertexId) -> bool {
        self.check_range(id);
        if self.dense {
            self.bits.is_set(id - self.start)
        } else {
            self.sparse.contains(&id)
        }
    }

    /// Like [`Frontier::is_active`] for dense frontiers, without the
    /// representation branch.
    ///
    /// # Panics
    /// Panics if the frontier is sparse or `id` is out of range.
    #[inline]
    pub fn is_active_dense(&self, id: VertexId) -> bool {
        debug_assert!(self.dense, "dense read on a sparse frontier");
        self.check_range(id);
        self.bits.is_set(id - self.start)
    }

    /// Atomically marks `id` active through a shared reference; returns
    /// `true` iff this call activated it.
    ///
    /// This is the traversal's concurrent write path (dense-forward and
    /// vertex_filter outputs). The frontier must be in dense mode: the
    /// sparse list is not concurrently growable.
    ///
    /// # Panics
    /// Panics if `id` is outside `[start, end)`.
    #[inline]
    pub fn activate(&self, id: VertexId) -> bool {
        self.check_range(id);
        debug_assert!(self.dense, "concurrent activation needs dense storage");
        self.bits.test_and_set(id - self.start, Ordering::Relaxed)
    }

    /// Resets to an empty sparse frontier and zeroes the cached stats.
    pub fn clear(&mut self) {
        self.sparse.clear();
        self.bits.clear_all();
        self.dense = false;
        *self.active.get_mut() = 0;
        *self.active_out_edges.get_mut() = 0;
    }

    /// Switches to dense mode without touching the bitmap: discards the
    /// sparse list and zeroes the stats. Output-buffer preparation; the
    /// stale bits are cleared afterwards by sub-workers in parallel via
    /// [`Frontier::clear_local_range`].
    pub fn reset_dense_shell(&mut self) {
        self.sparse.clear();
        self.dense = true;
        *self.active.get_mut() = 0;
        *self.active_out_edges.get_mut() = 0;
    }

    /// Clears the dense bits in local range `[lo, hi)` (offsets within this
    /// frontier). Used by sub-workers to reset their slice of an output
    /// frontier; safe to call concurrently on disjoint or adjacent slices.
    pub fn clear_local_range(&self, lo: usize, hi: usize) {
        self.bits.clear_range(lo, hi);
    }

    /// Replaces the backing dense bitmap with caller-supplied storage,
    /// returning the old one for reuse.
    ///
    /// The exchange is an owned move; callers sequence it behind a barrier
    /// so no reader still scans the outgoing bitmap.
    ///
    /// # Panics
    /// Panics if `new_bits` does not cover exactly this frontier's range.
    pub fn swap_dense_storage(&mut self, new_bits: AtomicBitset) -> AtomicBitset {
        assert!(
            new_bits.len_bits() == self.len(),
            "replacement bitmap covers {} bits, frontier needs {}",
            new_bits.len_bits(),
            self.len()
        );
        core::mem::replace(&mut self.bits, new_bits)
    }

    /// Installs a sparse active list (global ids) produced by a push round.
    ///
    /// The list becomes authoritative as-is; push rounds may contain
    /// duplicates if the operator reported two successful activations for
    /// one destination, and the next dense conversion collapses them.
    ///
    /// # Panics
    /// Panics if any id is outside `[start, end)`.
    pub fn set_sparse(&mut self, ids: Vec<VertexId>) {
        for &id in &ids {
            self.check_range(id);
        }
        *self.active.get_mut() = ids.len();
        self.sparse = ids;
        self.dense = false;
    }

    /// Cached number of active vertices.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Cached sum of out-degrees of active vertices.
    pub fn active_out_edges(&self) -> usize {
        self.active_out_edges.load(Ordering::Relaxed)
    }

    /// Zeroes both cached stats (start of a recount phase).
    pub fn reset_stats(&self) {
        self.active.store(0, Ordering::Relaxed);
        self.active_out_edges.store(0, Ordering::Relaxed);
    }

    /// Accumulates partial stats from one sub-worker's recount slice.
    pub fn add_stats(&self, active: usize, out_edges: usize) {
        self.active.fetch_add(active, Ordering::Relaxed);
        self.active_out_edges.fetch_add(out_edges, Ordering::Relaxed);
    }

    /// Counts active vertices and their out-degree sum over the local range
    /// `[lo, hi)` of a dense frontier.
    pub fn count_local_range(&self, graph: &Graph, lo: usize, hi: usize) -> (usize, usize) {
        debug_assert!(self.dense, "recount slice on a sparse frontier");
        let mut active = 0;
        let mut out_edges = 0;
        for bit in self.bits.iter_ones(lo, hi) {
            active += 1;
            out_edges += graph.out_degree(bit + self.start);
        }
        (active, out_edges)
    }

    /// Recomputes both cached stats from the authoritative representation.
    pub fn recount(&mut self, graph: &Graph) {
        let (active, out_edges) = if self.dense {
            self.count_local_range(graph, 0, self.len())
        } else {
            let out = self.sparse.iter().map(|&id| graph.out_degree(id)).sum();
            (self.sparse.len(), out)
        };
        *self.active.get_mut() = active;
        *self.active_out_edges.get_mut() = out_edges;
    }

    /// The sparse active list. Empty (not meaningful) while dense.
    pub fn sparse_ids(&self) -> &[VertexId] {
        &self.sparse
    }

    /// Iterates active ids of a dense frontier within the local range
    /// `[lo, hi)`, yielding global ids in ascending order.
    ///
    /// # Panics
    /// Panics (debug) if the frontier is sparse.
    pub fn iter_active_range(&self, lo: usize, hi: usize) -> impl Iterator<Item = VertexId> + '_ {
        debug_assert!(self.dense, "ranged active scan on a sparse frontier");
        let start = self.start;
        self.bits.iter_ones(lo, hi).map(move |i| i + start)
    }

    /// Iterates active ids regardless of representation, ascending for
    /// dense frontiers, list order for sparse ones.
    pub fn iter_active(&self) -> Box<dyn Iterator<Item = VertexId> + '_> {
        if self.dense {
            Box::new(self.bits.iter_ones(0, self.len()).map(|i| i + self.start))
        } else {
            Box::new(self.sparse.iter().copied())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn active_set(f: &Frontier) -> BTreeSet<VertexId> {
        f.iter_active().collect()
    }

    #[test]
    fn roundtrip_preserves_active_set() {
        let mut f = Frontier::new(10, 50);
        for id in [12, 31, 49, 10] {
            f.set_active(id, true);
        }
        let before = active_set(&f);

        f.to_dense();
        assert!(f.is_dense());
        assert_eq!(active_set(&f), before);

        f.to_sparse();
        assert!(!f.is_dense());
        assert_eq!(active_set(&f), before);
        // Canonical order after a dense round-trip.
        assert_eq!(f.sparse_ids(), &[10, 12, 31, 49]);

        // Conversions are idempotent.
        f.to_sparse();
        assert_eq!(f.sparse_ids(), &[10, 12, 31, 49]);
        f.to_dense();
        f.to_dense();
        assert_eq!(active_set(&f), before);
    }

    #[test]
    fn clear_empties_everything() {
        let mut f = Frontier::new(0, 16);
        f.set_active(3, true);
        f.to_dense();
        f.clear();
        assert_eq!(f.active(), 0);
        assert_eq!(f.active_out_edges(), 0);
        assert!(!f.is_dense());
        for id in 0..16 {
            assert!(!f.is_active(id));
        }
    }

    #[test]
    fn set_active_maintains_count() {
        let mut f = Frontier::new(0, 8);
        f.set_active(1, true);
        f.set_active(1, true);
        f.set_active(5, true);
        assert_eq!(f.active(), 2);
        f.set_active(1, false);
        assert_eq!(f.active(), 1);
        assert!(!f.is_active(1));
        assert!(f.is_active(5));

        f.to_dense();
        f.set_active(2, true);
        f.set_active(5, false);
        assert_eq!(f.active(), 1);
        assert!(f.is_active(2));
        assert!(!f.is_active(5));
    }

    #[test]
    fn recount_tracks_graph_degrees() {
        let g = Graph::from_edges(6, &[(0, 1, 1), (0, 2, 1), (1, 2, 1), (4, 5, 1)]);
        let mut f = Frontier::new(0, 6);
        f.set_active(0, true);
        f.set_active(4, true);
        f.recount(&g);
        assert_eq!(f.active(), 2);
        assert_eq!(f.active_out_edges(), 3);

        f.to_dense();
        f.recount(&g);
        assert_eq!(f.active(), 2);
        assert_eq!(f.active_out_edges(), 3);
    }

    #[test]
    fn swap_dense_storage_moves_old_bits_out() {
        let mut f = Frontier::new(0, 64);
        f.set_active(7, true);
        f.to_dense();
        let old = f.swap_dense_storage(AtomicBitset::new(64));
        assert!(old.is_set(7));
        assert!(!f.is_active(7));
    }

    #[test]
    #[should_panic(expected = "outside frontier range")]
    fn out_of_range_is_a_contract_violation() {
        let mut f = Frontier::new(8, 16);
        f.set_active(3, true);
    }

    #[test]
    #[should_panic(expected = "covers")]
    fn mismatched_storage_is_rejected() {
        let mut f = Frontier::new(0, 64);
        f.swap_dense_storage(AtomicBitset::new(32));
    }
}

//! Aggregation of per-domain frontiers into one logical global frontier.
//!
//! The collection owns one [`Frontier`] per NUMA domain plus the offset
//! table that maps a global vertex id to `(domain, local index)`. The
//! engine's direction heuristic reads collection-level totals, which are
//! cached until a swap invalidates them.
//!
//! Each domain frontier sits in a [`PhaseCell`] so that, between barriers,
//! every domain leader can prepare its own domain concurrently (install a
//! fresh sparse list, flip the representation flag) without the collection
//! handing out overlapping `&mut` borrows. The safe API is the usual
//! shared-read / exclusive-write split; the phase-scoped leader access is
//! an `unsafe fn` carrying the protocol obligation.

use crate::concurrency::PhaseCell;
use crate::frontier::Frontier;
use crate::graph::VertexId;

/// One frontier per domain, with offset arithmetic over the id space.
pub struct FrontierCollection {
    domains: Vec<PhaseCell<Frontier>>,
    /// `offsets[d]` = vertices before domain `d`; length `domains + 1`,
    /// strictly increasing, last entry = total vertex count.
    offsets: Vec<usize>,
    dense: bool,
    /// Cached total active count; `None` after a swap.
    cached_active: Option<usize>,
}

impl FrontierCollection {
    /// Builds a collection from per-domain frontiers.
    ///
    /// # Panics
    /// - if `domains` is empty
    /// - if the domain ranges are not contiguous ascending (each frontier
    ///   must start where the previous one ended, the first at 0)
    /// - if the frontiers disagree on representation
    pub fn new(domains: Vec<Frontier>) -> Self {
        assert!(!domains.is_empty(), "collection needs at least one domain");
        let mut offsets = Vec::with_capacity(domains.len() + 1);
        let mut expected = 0usize;
        for (d, f) in domains.iter().enumerate() {
            assert!(
                f.start() == expected,
                "domain {d} starts at {}, expected {expected}",
                f.start()
            );
            offsets.push(expected);
            expected = f.end();
        }
        offsets.push(expected);
        let dense = domains[0].is_dense();
        assert!(
            domains.iter().all(|f| f.is_dense() == dense),
            "domains disagree on dense/sparse mode"
        );
        Self {
            domains: domains.into_iter().map(PhaseCell::new).collect(),
            offsets,
            dense,
            cached_active: None,
        }
    }

    /// Builds an all-empty (sparse) collection over the domain boundaries
    /// `bounds[d]..bounds[d+1]`.
    pub fn empty(bounds: &[usize]) -> Self {
        assert!(bounds.len() >= 2, "need at least one domain range");
        let domains = bounds
            .windows(2)
            .map(|w| Frontier::new(w[0], w[1]))
            .collect();
        Self::new(domains)
    }

    /// Number of domains.
    pub fn num_domains(&self) -> usize {
        self.domains.len()
    }

    /// Total vertices covered.
    pub fn vertex_count(&self) -> usize {
        *self.offsets.last().expect("offsets non-empty")
    }

    /// Global-id offset of domain `d`.
    pub fn offset_of(&self, d: usize) -> usize {
        self.offsets[d]
    }

    /// Domain boundaries: `offsets()[d]..offsets()[d + 1]` is domain `d`.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Whether every domain frontier is dense.
    pub fn is_dense(&self) -> bool {
        self.dense
    }

    /// The frontier of domain `d`.
    #[inline]
    pub fn domain(&self, d: usize) -> &Frontier {
        // SAFETY: mutable access through a shared collection only exists via
        // `domain_mut_shared`, whose contract forbids it to overlap reads.
        unsafe { self.domains[d].get() }
    }

    /// Mutable access to the frontier of domain `d`. Invalidates the cached
    /// active count.
    pub fn domain_mut(&mut self, d: usize) -> &mut Frontier {
        self.cached_active = None;
        self.domains[d].as_mut()
    }

    /// Phase-scoped mutable access for domain leaders.
    ///
    /// # Safety
    /// The caller must be the sole thread touching domain `d` until the
    /// next barrier, and must not rely on the collection-level mode flag or
    /// active-count cache reflecting its edits (leader-phase code refreshes
    /// those explicitly).
    #[inline]
    pub unsafe fn domain_mut_shared(&self, d: usize) -> &mut Frontier {
        self.domains[d].get_mut()
    }

    /// Rebinds domain `d` to a new frontier, returning the old one.
    ///
    /// The replacement must cover exactly the same vertex range. Invalidates
    /// the cached active count and refreshes the collection-level mode flag.
    ///
    /// # Panics
    /// Panics on a range mismatch.
    pub fn swap_domain_frontier(&mut self, d: usize, new: Frontier) -> Frontier {
        assert!(
            new.start() == self.offsets[d] && new.end() == self.offsets[d + 1],
            "replacement frontier {}..{} does not cover domain {d} ({}..{})",
            new.start(),
            new.end(),
            self.offsets[d],
            self.offsets[d + 1]
        );
        self.cached_active = None;
        let old = core::mem::replace(self.domains[d].as_mut(), new);
        self.dense = (0..self.domains.len()).all(|i| self.domains[i].as_mut().is_dense());
        old
    }

    /// Converts every domain to dense. Short-circuits if already dense.
    pub fn to_dense(&mut self) {
        if self.dense {
            return;
        }
        for cell in &mut self.domains {
            cell.as_mut().to_dense();
        }
        self.dense = true;
    }

    /// Converts every domain to sparse. Short-circuits if already sparse.
    pub fn to_sparse(&mut self) {
        if !self.dense {
            return;
        }
        for cell in &mut self.domains {
            cell.as_mut().to_sparse();
        }
        self.dense = false;
    }

    /// Refreshes the collection-level mode flag from the domains and drops
    /// the cached active count. Leader-phase code calls this after
    /// per-domain edits made through [`FrontierCollection::domain_mut_shared`].
    pub fn refresh_mode(&mut self) {
        self.cached_active = None;
        self.dense = (0..self.domains.len()).all(|i| self.domains[i].as_mut().is_dense());
    }

    /// Total active vertices, cached until a swap invalidates it.
    pub fn num_active(&mut self) -> usize {
        if let Some(m) = self.cached_active {
            return m;
        }
        let m = self.num_active_uncached();
        self.cached_active = Some(m);
        m
    }

    /// Total active vertices without touching the cache.
    pub fn num_active_uncached(&self) -> usize {
        (0..self.domains.len()).map(|d| self.domain(d).active()).sum()
    }

    /// Sum of cached per-domain active-out-edge counts.
    pub fn active_edge_count(&self) -> usize {
        (0..self.domains.len())
            .map(|d| self.domain(d).active_out_edges())
            .sum()
    }

    /// Whether no vertex is active anywhere.
    pub fn is_empty_frontier(&mut self) -> bool {
        self.num_active() == 0
    }

    /// The domain owning `id`.
    ///
    /// # Panics
    /// Panics if `id >= vertex_count()`.
    #[inline]
    pub fn domain_of(&self, id: VertexId) -> usize {
        assert!(id < self.vertex_count(), "vertex {id} out of bounds");
        // Domain counts are small; partition_point is a binary search over
        // the offset table.
        self.offsets.partition_point(|&off| off <= id) - 1
    }

    /// Whether the global id is active, routing through the owning domain.
    #[inline]
    pub fn is_active(&self, id: VertexId) -> bool {
        self.domain(self.domain_of(id)).is_active(id)
    }

    /// Dense-mode activity check for the traversal hot path.
    #[inline]
    pub fn is_active_dense(&self, id: VertexId) -> bool {
        self.domain(self.domain_of(id)).is_active_dense(id)
    }

    /// Atomically activates `id` in the owning domain's dense bitmap.
    /// Returns `true` iff this call flipped it on.
    #[inline]
    pub fn activate(&self, id: VertexId) -> bool {
        self.domain(self.domain_of(id)).activate(id)
    }

    /// Iterates all active ids across domains (domain order).
    pub fn iter_active(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.domains.len()).flat_map(|d| self.domain(d).iter_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_domains() -> FrontierCollection {
        FrontierCollection::empty(&[0, 4, 10, 16])
    }

    #[test]
    fn offsets_and_domain_lookup() {
        let c = three_domains();
        assert_eq!(c.num_domains(), 3);
        assert_eq!(c.vertex_count(), 16);
        assert_eq!(c.domain_of(0), 0);
        assert_eq!(c.domain_of(3), 0);
        assert_eq!(c.domain_of(4), 1);
        assert_eq!(c.domain_of(9), 1);
        assert_eq!(c.domain_of(10), 2);
        assert_eq!(c.domain_of(15), 2);
    }

    #[test]
    fn activity_routes_to_owning_domain() {
        let mut c = three_domains();
        c.domain_mut(1).set_active(7, true);
        c.domain_mut(2).set_active(10, true);
        assert!(c.is_active(7));
        assert!(c.is_active(10));
        assert!(!c.is_active(0));
        assert_eq!(c.num_active(), 2);

        let collected: Vec<_> = c.iter_active().collect();
        assert_eq!(collected, vec![7, 10]);
    }

    #[test]
    fn broadcast_conversions_track_mode() {
        let mut c = three_domains();
        c.domain_mut(0).set_active(1, true);
        assert!(!c.is_dense());
        c.to_dense();
        assert!(c.is_dense());
        assert!((0..3).all(|d| c.domain(d).is_dense()));
        c.to_sparse();
        assert!(!c.is_dense());
        assert!(c.is_active(1));
    }

    #[test]
    fn swap_invalidates_cached_count() {
        let mut c = three_domains();
        c.domain_mut(0).set_active(1, true);
        assert_eq!(c.num_active(), 1);

        let mut replacement = Frontier::new(0, 4);
        replacement.set_active(2, true);
        replacement.set_active(3, true);
        let old = c.swap_domain_frontier(0, replacement);
        assert!(old.is_active(1));
        assert_eq!(c.num_active(), 2);
    }

    #[test]
    #[should_panic(expected = "does not cover domain")]
    fn swap_range_mismatch_is_rejected() {
        let mut c = three_domains();
        c.swap_domain_frontier(0, Frontier::new(0, 5));
    }

    #[test]
    #[should_panic(expected = "expected")]
    fn non_contiguous_domains_are_rejected() {
        FrontierCollection::new(vec![Frontier::new(0, 4), Frontier::new(5, 8)]);
    }
}

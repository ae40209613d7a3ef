//! Two-level work partitioning: vertex ranges across NUMA domains, and
//! domain ranges across sub-workers.
//!
//! Domain boundaries are fixed once at load time by a degree-balancing pass;
//! sub-worker slices are plain contiguous splits recomputed per call. Each
//! worker thread carries a [`SubPartitioner`] with its role, its dense
//! slice, and handles to the domain-local and cross-domain barriers.

use std::ops::Range;
use std::sync::Arc;

use crate::concurrency::SpinBarrier;

/// Block granularity (vertices) for the degree-balancing pass. One page of
/// 4-byte per-vertex state; balancing whole blocks keeps domain boundaries
/// page-aligned for the NUMA allocator.
pub const DEGREE_BLOCK: usize = 1024;

/// Thread role, assigned once at spawn and read-only thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Domain 0, sub-worker 0: performs collection-wide setup.
    Leader,
    /// Sub-worker 0 of a non-zero domain: performs per-domain setup and
    /// participates in the cross-domain barrier.
    DomainLeader,
    /// Any other sub-worker.
    Worker,
}

/// Splits `len` items into `parts` contiguous near-equal chunks; chunk `k`.
///
/// The last chunk absorbs the remainder, so the union of all chunks is
/// exactly `0..len` and chunks are pairwise disjoint.
///
/// # Panics
/// Panics if `parts == 0` or `k >= parts`.
pub fn split_range(len: usize, parts: usize, k: usize) -> Range<usize> {
    assert!(parts != 0, "cannot split into zero parts");
    assert!(k < parts, "part index {k} out of {parts}");
    let chunk = len / parts;
    let start = k * chunk;
    let end = if k == parts - 1 { len } else { start + chunk };
    start..end
}

/// Degree-balanced domain boundaries.
///
/// Greedy bin filling over fixed-size blocks: vertices are consumed in
/// `block`-sized groups, and the current domain closes once its cumulative
/// degree reaches the per-domain average. The last domain absorbs the tail.
/// Returns `num_domains + 1` boundaries (`bounds[d]..bounds[d+1]` is domain
/// `d`'s range, the first at 0, the last at `degrees.len()`).
///
/// # Panics
/// Panics if `num_domains == 0`, `block == 0`, or there are fewer vertices
/// than domains.
pub fn partition_by_degree(degrees: &[usize], num_domains: usize, block: usize) -> Vec<usize> {
    assert!(num_domains != 0, "need at least one domain");
    assert!(block != 0, "block must be > 0");
    assert!(
        degrees.len() >= num_domains,
        "{} vertices cannot fill {num_domains} domains",
        degrees.len()
    );
    let n = degrees.len();
    let total: usize = degrees.iter().sum();
    let average = total / num_domains;

    let mut bounds = Vec::with_capacity(num_domains + 1);
    bounds.push(0);
    let mut accum = 0usize;
    let mut i = 0usize;
    while i < n {
        let end = (i + block).min(n);
        accum += degrees[i..end].iter().sum::<usize>();
        i = end;
        if accum >= average && bounds.len() < num_domains && i < n {
            // Cap the cut so every still-open domain keeps at least one
            // vertex, even when the degree mass sits near the tail.
            bounds.push(i.min(n - (num_domains - bounds.len())));
            accum = 0;
        }
    }
    // Low-degree tails (or degenerate degree distributions) can leave
    // domains unclosed; fall back to even splits for the rest. Each
    // fallback cut advances past the previous one and leaves room for the
    // domains after it.
    while bounds.len() < num_domains {
        let last = *bounds.last().expect("bounds non-empty");
        let remaining_domains = num_domains + 1 - bounds.len();
        let step = ((n - last) / remaining_domains).max(1);
        bounds.push((last + step).min(n - (remaining_domains - 1)).max(last + 1));
    }
    bounds.push(n);
    debug_assert!(bounds.windows(2).all(|w| w[0] < w[1]));
    bounds
}

/// Per-thread partition descriptor and barrier handles.
pub struct SubPartitioner {
    domain: usize,
    sub: usize,
    num_domains: usize,
    num_sub: usize,
    role: Role,
    domain_range: Range<usize>,
    dense: Range<usize>,
    local: Arc<SpinBarrier>,
    cross: Arc<SpinBarrier>,
}

impl SubPartitioner {
    /// Builds the descriptor for sub-worker `sub` of `domain`.
    ///
    /// `domain_range` is the domain's global vertex range; `local` must be
    /// shared by exactly the domain's `num_sub` sub-workers and `cross` by
    /// exactly one leader per domain.
    pub fn new(
        domain: usize,
        sub: usize,
        num_domains: usize,
        num_sub: usize,
        domain_range: Range<usize>,
        local: Arc<SpinBarrier>,
        cross: Arc<SpinBarrier>,
    ) -> Self {
        assert!(domain < num_domains, "domain {domain} out of {num_domains}");
        assert!(sub < num_sub, "sub-worker {sub} out of {num_sub}");
        assert!(local.parties() == num_sub, "local barrier party mismatch");
        assert!(cross.parties() == num_domains, "cross barrier party mismatch");
        let role = match (domain, sub) {
            (0, 0) => Role::Leader,
            (_, 0) => Role::DomainLeader,
            _ => Role::Worker,
        };
        let slice = split_range(domain_range.len(), num_sub, sub);
        let dense = domain_range.start + slice.start..domain_range.start + slice.end;
        Self {
            domain,
            sub,
            num_domains,
            num_sub,
            role,
            domain_range,
            dense,
            local,
            cross,
        }
    }

    /// Domain index.
    pub fn domain(&self) -> usize {
        self.domain
    }

    /// Sub-worker index within the domain.
    pub fn sub(&self) -> usize {
        self.sub
    }

    /// Total domains.
    pub fn num_domains(&self) -> usize {
        self.num_domains
    }

    /// Sub-workers per domain.
    pub fn num_sub(&self) -> usize {
        self.num_sub
    }

    /// This thread's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether this thread is the overall leader.
    #[inline]
    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    /// Whether this thread leads its domain (the overall leader does too).
    #[inline]
    pub fn is_domain_leader(&self) -> bool {
        self.sub == 0
    }

    /// The domain's global vertex range.
    pub fn domain_range(&self) -> Range<usize> {
        self.domain_range.clone()
    }

    /// This worker's dense slice of the domain range (global ids).
    pub fn dense_range(&self) -> Range<usize> {
        self.dense.clone()
    }

    /// This worker's slice of a `len`-item domain-local index space.
    pub fn claim_local(&self, len: usize) -> Range<usize> {
        split_range(len, self.num_sub, self.sub)
    }

    /// This worker's slice of a `len`-item global index space, splitting
    /// across every sub-worker of every domain.
    pub fn claim_global(&self, len: usize) -> Range<usize> {
        split_range(
            len,
            self.num_domains * self.num_sub,
            self.domain * self.num_sub + self.sub,
        )
    }

    /// Barrier across the sub-workers of this domain only.
    #[inline]
    pub fn local_wait(&self) {
        self.local.wait();
    }

    /// Two-phase global barrier: local rendezvous, domain leaders cross the
    /// domain barrier, then a second local rendezvous releases the rest.
    ///
    /// Non-leader threads never touch the cross-domain barrier, so the
    /// expensive rendezvous scales with the domain count, not the thread
    /// count.
    pub fn global_wait(&self) {
        self.local.wait();
        if self.is_domain_leader() {
            self.cross.wait();
        }
        self.local.wait();
    }
}

/// Best-effort pinning of the current thread to its domain's CPU share.
///
/// CPUs are divided contiguously: domain `d` of `num_domains` owns cpus
/// `[d * per, (d + 1) * per)` where `per = online_cpus / num_domains`.
/// Only implemented on Linux; elsewhere it is a no-op.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(domain: usize, num_domains: usize) {
    assert!(domain < num_domains, "domain {domain} out of {num_domains}");
    let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    let per = (cpus / num_domains).max(1);
    let lo = (domain * per).min(cpus - 1);
    let hi = ((domain + 1) * per).min(cpus).max(lo + 1);

    // SAFETY: plain libc calls on a zeroed cpu_set_t; tid 0 = current thread.
    unsafe {
        let mut set: libc::cpu_set_t = core::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        for cpu in lo..hi {
            libc::CPU_SET(cpu, &mut set);
        }
        // Failure leaves the thread unpinned, which is only a locality loss.
        libc::sched_setaffinity(0, core::mem::size_of::<libc::cpu_set_t>(), &set);
    }
}

/// No-op outside Linux.
#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(_domain: usize, _num_domains: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_exhaustive_and_disjoint() {
        for len in [0usize, 1, 7, 64, 1000] {
            for parts in 1..=8 {
                let mut covered = 0;
                let mut prev_end = 0;
                for k in 0..parts {
                    let r = split_range(len, parts, k);
                    assert_eq!(r.start, prev_end, "len={len} parts={parts} k={k}");
                    covered += r.len();
                    prev_end = r.end;
                }
                assert_eq!(prev_end, len);
                assert_eq!(covered, len);
            }
        }
    }

    #[test]
    fn degree_partition_balances_edges() {
        // Heavy head: most edges in early vertices.
        let mut degrees = vec![0usize; 4096];
        for (i, d) in degrees.iter_mut().enumerate() {
            *d = if i < 1024 { 16 } else { 1 };
        }
        let bounds = partition_by_degree(&degrees, 4, 64);
        assert_eq!(bounds.len(), 5);
        assert_eq!(bounds[0], 0);
        assert_eq!(bounds[4], 4096);
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));

        let total: usize = degrees.iter().sum();
        let avg = total / 4;
        // Each closed domain reached the average (the tail domain may not).
        for d in 0..3 {
            let sum: usize = degrees[bounds[d]..bounds[d + 1]].iter().sum();
            assert!(sum >= avg.saturating_sub(64 * 16), "domain {d} too light: {sum}");
        }
    }

    #[test]
    fn degree_partition_keeps_every_domain_nonempty_with_heavy_tail() {
        // Nearly all degree mass near the end: the greedy cut must not eat
        // the vertices the remaining domains need.
        let degrees = [0usize, 0, 0, 0, 0, 0, 64, 0];
        let bounds = partition_by_degree(&degrees, 7, 1);
        assert_eq!(bounds.len(), 8);
        assert_eq!(bounds[0], 0);
        assert_eq!(bounds[7], 8);
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));

        // One heavy vertex mid-list closes domain 0 late; the fallback
        // still advances every later boundary.
        let degrees = [0usize, 0, 0, 17, 0, 0];
        let bounds = partition_by_degree(&degrees, 4, 1);
        assert_eq!(bounds.len(), 5);
        assert_eq!(*bounds.last().unwrap(), 6);
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn degree_partition_handles_flat_degrees() {
        let degrees = vec![1usize; 100];
        let bounds = partition_by_degree(&degrees, 5, 8);
        assert_eq!(bounds.len(), 6);
        assert_eq!(*bounds.last().unwrap(), 100);
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn roles_are_fixed_by_position() {
        let cross = Arc::new(SpinBarrier::new(2));
        let local0 = Arc::new(SpinBarrier::new(2));
        let local1 = Arc::new(SpinBarrier::new(2));

        let mk = |domain, sub, local: &Arc<SpinBarrier>| {
            SubPartitioner::new(domain, sub, 2, 2, (domain * 8)..(domain * 8 + 8), Arc::clone(local), Arc::clone(&cross))
        };
        assert_eq!(mk(0, 0, &local0).role(), Role::Leader);
        assert_eq!(mk(0, 1, &local0).role(), Role::Worker);
        assert_eq!(mk(1, 0, &local1).role(), Role::DomainLeader);
        assert_eq!(mk(1, 1, &local1).role(), Role::Worker);

        let p = mk(1, 1, &local1);
        assert!(!p.is_leader());
        assert!(!p.is_domain_leader());
        assert_eq!(p.dense_range(), 12..16);
        assert_eq!(p.claim_local(10), 5..10);
        assert_eq!(p.claim_global(16), 12..16);
    }

    #[test]
    fn global_wait_releases_all_workers() {
        use core::sync::atomic::{AtomicUsize, Ordering};

        let num_domains = 2;
        let num_sub = 3;
        let cross = Arc::new(SpinBarrier::new(num_domains));
        let locals: Vec<_> = (0..num_domains)
            .map(|_| Arc::new(SpinBarrier::new(num_sub)))
            .collect();
        let counter = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for d in 0..num_domains {
                for s in 0..num_sub {
                    let p = SubPartitioner::new(
                        d,
                        s,
                        num_domains,
                        num_sub,
                        (d * 10)..(d * 10 + 10),
                        Arc::clone(&locals[d]),
                        Arc::clone(&cross),
                    );
                    let counter = Arc::clone(&counter);
                    scope.spawn(move || {
                        for round in 1..=10 {
                            counter.fetch_add(1, Ordering::Relaxed);
                            p.global_wait();
                            let seen = counter.load(Ordering::Relaxed);
                            assert!(seen >= round * num_domains * num_sub);
                            p.global_wait();
                        }
                    });
                }
            }
        });
        assert_eq!(counter.load(Ordering::Relaxed), 10 * num_domains * num_sub);
    }
}

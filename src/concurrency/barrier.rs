//! Sense-reversing spin barrier.
//!
//! Traversal rounds synchronize with barriers only (no timed waits, no
//! cancellation), and the same barrier is reused every round, so it must be
//! reentrant without a reset step. The classic sense-reversing construction
//! gives that: arrivals count up on a shared counter, and the last arrival
//! flips a global sense that releases everyone spinning on the old one.
//!
//! Waiting spins with [`crossbeam_utils::Backoff`] rather than parking; the
//! pool pins one worker per core and rounds are short, so a bounded spin
//! beats a futex round-trip.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

/// A reusable spin barrier for a fixed set of participants.
pub struct SpinBarrier {
    parties: usize,
    arrived: CachePadded<AtomicUsize>,
    sense: CachePadded<AtomicBool>,
}

impl SpinBarrier {
    /// Creates a barrier for `parties` threads.
    ///
    /// # Panics
    /// Panics if `parties == 0`.
    pub fn new(parties: usize) -> Self {
        assert!(parties != 0, "barrier must have at least one party");
        Self {
            parties,
            arrived: CachePadded::new(AtomicUsize::new(0)),
            sense: CachePadded::new(AtomicBool::new(false)),
        }
    }

    /// Number of participating threads.
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Blocks until all `parties` threads have called `wait`.
    ///
    /// Returns `true` on exactly one participant per rendezvous (the last
    /// arrival), mirroring `std::sync::Barrier`'s leader result.
    ///
    /// The release of the final arrival is an `AcqRel` flip of the sense
    /// flag, so every write made before any participant's `wait` is visible
    /// to every participant after it returns.
    pub fn wait(&self) -> bool {
        let sense = self.sense.load(Ordering::Relaxed);
        if self.arrived.fetch_add(1, Ordering::AcqRel) == self.parties - 1 {
            // Last arrival: reset the counter and release the others.
            self.arrived.store(0, Ordering::Relaxed);
            self.sense.store(!sense, Ordering::Release);
            true
        } else {
            let backoff = Backoff::new();
            while self.sense.load(Ordering::Acquire) == sense {
                backoff.snooze();
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn single_party_never_blocks() {
        let b = SpinBarrier::new(1);
        assert!(b.wait());
        assert!(b.wait());
    }

    #[test]
    fn rendezvous_orders_writes() {
        let threads = 4;
        let rounds = 50;
        let barrier = Arc::new(SpinBarrier::new(threads));
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for round in 0..rounds {
                        counter.fetch_add(1, Ordering::Relaxed);
                        barrier.wait();
                        // Every increment from this round must be visible.
                        assert!(counter.load(Ordering::Relaxed) >= (round + 1) * threads);
                        barrier.wait();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), threads * rounds);
    }

    #[test]
    fn exactly_one_leader_per_rendezvous() {
        let threads = 8;
        let barrier = Arc::new(SpinBarrier::new(threads));
        let leaders = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let leaders = Arc::clone(&leaders);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        if barrier.wait() {
                            leaders.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(leaders.load(Ordering::Relaxed), 20);
    }
}

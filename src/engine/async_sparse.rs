//! Asynchronous sparse-direction kernel.
//!
//! Instead of synchronizing per round, workers exchange fixed-size chunks
//! of newly activated vertex ids through a shared MPMC queue and relax
//! until no chunk remains anywhere. A label-correcting SSSP reaches its
//! fixed point in one `edge_map` call this way; the produced frontier is
//! empty by construction.
//!
//! Termination is a ring consensus backed by an in-flight chunk counter.
//! Each queued or in-processing chunk holds one `in_flight` count
//! (incremented before the push, decremented after the chunk is fully
//! relaxed), so `in_flight == 0` proves no work exists or can still
//! appear. The idle leader walks the workers' idle flags; only a full
//! streak of idle observations followed by an `in_flight == 0` read sets
//! the done flag. The counter closes the window where a worker has popped
//! the last chunk but not yet produced its successors: its chunk stays
//! counted until processing ends, so the walk alone can never declare
//! termination early.
//!
//! The queue is bounded and every worker produces while it consumes, so a
//! worker never blocks pushing into a full queue. A rejected chunk lands
//! in the producer's private backlog and is relaxed by that worker; its
//! idle flag stays false until the backlog drains, which keeps the
//! termination walk honest without counting backlogged chunks.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

use crate::concurrency::ChunkQueue;
use crate::engine::ops::EdgeOp;
use crate::engine::{finish_round, Shared};
use crate::graph::VertexId;
use crate::partition::SubPartitioner;

/// Ids per exchanged chunk.
pub(crate) const ASYNC_CHUNK: usize = 64;

/// Queue, idle flags and termination state, built once per pool.
pub(crate) struct AsyncState {
    queue: ChunkQueue<Vec<VertexId>>,
    idle: Vec<CachePadded<AtomicBool>>,
    in_flight: CachePadded<AtomicUsize>,
    done: AtomicBool,
}

impl AsyncState {
    /// Sizes the queue for `workers` threads over an `n`-vertex graph:
    /// room for a full frontier's worth of chunks plus every worker's
    /// partial flush. Re-activation bursts can exceed any fixed bound, so
    /// workers never block on a full queue; a rejected chunk goes to the
    /// producing worker's own backlog and is relaxed there.
    pub(crate) fn new(workers: usize, n: usize) -> Self {
        let capacity = n / ASYNC_CHUNK + 2 * workers + 64;
        Self {
            queue: ChunkQueue::new(capacity),
            idle: (0..workers)
                .map(|_| CachePadded::new(AtomicBool::new(false)))
                .collect(),
            in_flight: CachePadded::new(AtomicUsize::new(0)),
            done: AtomicBool::new(false),
        }
    }

    fn reset(&self) {
        debug_assert!(self.queue.is_empty(), "chunks left over from a previous round");
        self.done.store(false, Ordering::Relaxed);
        self.in_flight.store(0, Ordering::Relaxed);
        for flag in &self.idle {
            flag.store(false, Ordering::Relaxed);
        }
    }

    fn enqueue(&self, chunk: Vec<VertexId>) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.queue.push(chunk);
    }

    /// Non-blocking enqueue; hands the chunk back when the queue is full.
    fn try_enqueue(&self, chunk: Vec<VertexId>) -> Result<(), Vec<VertexId>> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.queue.try_push(chunk).map_err(|chunk| {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            chunk
        })
    }
}

pub(crate) fn round<O: EdgeOp>(shared: &Shared<'_>, part: &SubPartitioner, op: &O) {
    let st = &shared.async_state;
    if part.is_leader() {
        // SAFETY: leader prep phase; everyone else waits at the barrier
        // below.
        unsafe {
            shared.current.get_mut().to_sparse();
            let nxt = shared.next.get_mut();
            for d in 0..nxt.num_domains() {
                nxt.domain_mut(d).reset_dense_shell();
            }
            nxt.refresh_mode();
        }
        st.reset();
    }
    part.global_wait();

    // SAFETY: read phase for `current`, atomic-write phase for `next`.
    let cur = unsafe { shared.current.get() };
    let nxt = unsafe { shared.next.get() };

    // Seed the queue from this domain's active list while the other
    // sub-workers clear the (empty) output frontier's bits.
    let f = nxt.domain(part.domain());
    let r = part.dense_range();
    f.clear_local_range(r.start - f.start(), r.end - f.start());
    if part.is_domain_leader() {
        for chunk in cur.domain(part.domain()).sparse_ids().chunks(ASYNC_CHUNK) {
            st.enqueue(chunk.to_vec());
        }
    }
    part.global_wait();

    work_loop(shared, part, op);
    part.global_wait();

    // `next` is an empty dense frontier with zeroed stats; the fixed point
    // has been reached, so the swap installs an empty current frontier.
    finish_round(shared, part);
}

fn work_loop<O: EdgeOp>(shared: &Shared<'_>, part: &SubPartitioner, op: &O) {
    let st = &shared.async_state;
    let graph = shared.graph;
    let me = part.domain() * part.num_sub() + part.sub();
    let mut local: Vec<VertexId> = Vec::with_capacity(ASYNC_CHUNK);
    // Chunks the full queue refused; relaxed by this worker itself. While
    // the backlog is non-empty the idle flag stays false, so termination
    // cannot be declared past it.
    let mut backlog: Vec<Vec<VertexId>> = Vec::new();
    let backoff = Backoff::new();

    loop {
        let from_queue = backlog.is_empty();
        let chunk = if from_queue {
            st.queue.try_pop()
        } else {
            backlog.pop()
        };
        if let Some(chunk) = chunk {
            st.idle[me].store(false, Ordering::Release);
            backoff.reset();
            for src in chunk {
                for &(dst, weight) in graph.out_neighbors(src) {
                    if op.should_process(dst) && op.try_activate(src, dst, weight) {
                        local.push(dst);
                        if local.len() == ASYNC_CHUNK {
                            let full =
                                core::mem::replace(&mut local, Vec::with_capacity(ASYNC_CHUNK));
                            if let Err(full) = st.try_enqueue(full) {
                                backlog.push(full);
                            }
                        }
                    }
                }
            }
            if from_queue {
                // The popped chunk stays counted until here; successors
                // were counted before they became poppable.
                st.in_flight.fetch_sub(1, Ordering::AcqRel);
            }
            continue;
        }
        if !local.is_empty() {
            if let Err(partial) = st.try_enqueue(core::mem::take(&mut local)) {
                backlog.push(partial);
            }
            continue;
        }
        st.idle[me].store(true, Ordering::Release);
        if st.done.load(Ordering::Acquire) {
            break;
        }
        if part.is_leader() && try_terminate(st) {
            break;
        }
        backoff.snooze();
    }
}

/// Idle-leader termination walk. Returns `true` iff it set the done flag.
///
/// Walks the idle flags around the ring; any busy worker or queued chunk
/// aborts the walk and sends the leader back to polling. A complete idle
/// streak plus `in_flight == 0` is conclusive (see the module doc).
fn try_terminate(st: &AsyncState) -> bool {
    let workers = st.idle.len();
    let mut streak = 0;
    let mut i = 0;
    let backoff = Backoff::new();
    while streak < workers {
        if !st.queue.is_empty() || !st.idle[i].load(Ordering::Acquire) {
            return false;
        }
        streak += 1;
        i = (i + 1) % workers;
        backoff.spin();
    }
    if st.in_flight.load(Ordering::Acquire) == 0 && st.queue.is_empty() {
        st.done.store(true, Ordering::Release);
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_chunks_are_not_counted_in_flight() {
        let st = AsyncState::new(1, 0);
        let mut accepted = 0;
        let rejected = loop {
            match st.try_enqueue(vec![7]) {
                Ok(()) => accepted += 1,
                Err(chunk) => break chunk,
            }
        };
        assert_eq!(rejected, vec![7]);
        assert!(accepted >= 1);
        assert_eq!(st.in_flight.load(Ordering::Relaxed), accepted);

        let mut popped = 0;
        while st.queue.try_pop().is_some() {
            st.in_flight.fetch_sub(1, Ordering::Relaxed);
            popped += 1;
        }
        assert_eq!(popped, accepted);
        assert_eq!(st.in_flight.load(Ordering::Relaxed), 0);
    }
}

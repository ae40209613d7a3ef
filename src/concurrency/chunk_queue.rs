//! A lock-free, bounded, multi-producer multi-consumer chunk queue.
//!
//! Based on Dmitry Vyukov's bounded MPMC queue. The asynchronous sparse
//! traversal uses it to redistribute chunks of newly activated vertex ids
//! between workers; it is the only structure in the engine with genuine
//! multi-writer/multi-reader contention, so it must not fall back to a
//! mutex.
//!
//! Memory ordering at the API boundary: a successful `try_push` releases the
//! pushed value; a successful `try_pop` acquires it. Everything the producer
//! wrote into the chunk before pushing is therefore visible to the consumer
//! that pops it.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

/// A slot in the ring buffer.
///
/// - `sequence == index`: slot is empty and ready for enqueue.
/// - `sequence == index + 1`: slot is full and ready for dequeue.
struct Slot<T> {
    sequence: AtomicUsize,
    data: UnsafeCell<MaybeUninit<T>>,
}

/// A lock-free bounded MPMC queue.
pub struct ChunkQueue<T> {
    /// Enqueue position.
    head: CachePadded<AtomicUsize>,
    /// Dequeue position.
    tail: CachePadded<AtomicUsize>,
    buffer: Box<[Slot<T>]>,
    /// Capacity mask (capacity - 1).
    mask: usize,
}

// SAFETY: slots hand values across threads with acquire/release sequence
// numbers; a slot's data is only touched by the thread that claimed it.
unsafe impl<T: Send> Send for ChunkQueue<T> {}
unsafe impl<T: Send> Sync for ChunkQueue<T> {}

impl<T> ChunkQueue<T> {
    /// Creates a new queue with the specified capacity.
    ///
    /// Capacity is rounded up to the next power of two (minimum 2).
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity < 2 {
            2
        } else {
            capacity.next_power_of_two()
        };
        let mask = capacity - 1;

        let mut buffer = Vec::with_capacity(capacity);
        for i in 0..capacity {
            buffer.push(Slot {
                sequence: AtomicUsize::new(i),
                data: UnsafeCell::new(MaybeUninit::uninit()),
            });
        }

        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            buffer: buffer.into_boxed_slice(),
            mask,
        }
    }

    /// Attempts to push a value, returning it back if the queue is full.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let mut head = self.head.load(Ordering::Relaxed);

        loop {
            let index = head & self.mask;
            // SAFETY: index is within bounds (mask = capacity - 1).
            let slot = unsafe { self.buffer.get_unchecked(index) };
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(head) as isize;

            if diff == 0 {
                // Slot is empty. Try to claim it.
                match self.head.compare_exchange_weak(
                    head,
                    head.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // Claimed. Write data, then publish.
                        unsafe {
                            (*slot.data.get()).write(value);
                        }
                        slot.sequence.store(head.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(h) => head = h,
                }
            } else if diff < 0 {
                return Err(value);
            } else {
                // Another producer is ahead; reload.
                head = self.head.load(Ordering::Relaxed);
            }
        }
    }

    /// Pushes a value, spinning while the queue is full.
    ///
    /// The traversal sizes its queues so that sustained fullness means
    /// consumers are merely behind, not gone; the spin is bounded by their
    /// progress.
    pub fn push(&self, mut value: T) {
        let backoff = Backoff::new();
        loop {
            match self.try_push(value) {
                Ok(()) => return,
                Err(v) => value = v,
            }
            backoff.snooze();
        }
    }

    /// Attempts to pop a value. Returns `None` if the queue is empty.
    pub fn try_pop(&self) -> Option<T> {
        let mut tail = self.tail.load(Ordering::Relaxed);

        loop {
            let index = tail & self.mask;
            // SAFETY: index is within bounds (mask = capacity - 1).
            let slot = unsafe { self.buffer.get_unchecked(index) };
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(tail.wrapping_add(1)) as isize;

            if diff == 0 {
                // Slot has data. Try to claim it.
                match self.tail.compare_exchange_weak(
                    tail,
                    tail.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: the sequence number proved this slot was
                        // published by a completed push, and the CAS made
                        // this thread its sole consumer.
                        let value = unsafe { (*slot.data.get()).assume_init_read() };
                        slot.sequence
                            .store(tail.wrapping_add(self.mask).wrapping_add(1), Ordering::Release);
                        return Some(value);
                    }
                    Err(t) => tail = t,
                }
            } else if diff < 0 {
                return None;
            } else {
                tail = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Whether the queue currently holds no values.
    ///
    /// This is a racy snapshot; the async traversal never uses it alone to
    /// prove global emptiness (that is the ring consensus's job).
    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        head.wrapping_sub(tail) == 0
    }
}

impl<T> Drop for ChunkQueue<T> {
    fn drop(&mut self) {
        while self.try_pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_up_to_capacity() {
        let queue = ChunkQueue::new(4);
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), 4);

        for i in 1..=4 {
            assert!(queue.try_push(i).is_ok());
        }
        assert_eq!(queue.try_push(5), Err(5));

        for i in 1..=4 {
            assert_eq!(queue.try_pop(), Some(i));
        }
        assert_eq!(queue.try_pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn concurrent_producers_consumers() {
        let queue = Arc::new(ChunkQueue::new(64));
        let producers = 4;
        let per_producer = 2_000;

        let mut handles = Vec::new();
        for p in 0..producers {
            let q = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                for i in 0..per_producer {
                    q.push(p * per_producer + i);
                }
            }));
        }

        let consumers = 4;
        let total = producers * per_producer;
        let consumed = Arc::new(AtomicUsize::new(0));
        let sum = Arc::new(AtomicUsize::new(0));
        for _ in 0..consumers {
            let q = Arc::clone(&queue);
            let consumed = Arc::clone(&consumed);
            let sum = Arc::clone(&sum);
            handles.push(thread::spawn(move || loop {
                if consumed.load(Ordering::Relaxed) >= total {
                    break;
                }
                if let Some(v) = q.try_pop() {
                    sum.fetch_add(v, Ordering::Relaxed);
                    consumed.fetch_add(1, Ordering::Relaxed);
                } else {
                    thread::yield_now();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(consumed.load(Ordering::Relaxed), total);
        assert_eq!(sum.load(Ordering::Relaxed), (0..total).sum::<usize>());
    }

    #[test]
    fn drop_releases_pending_values() {
        let queue = ChunkQueue::new(8);
        for i in 0..5 {
            queue.push(vec![i; 3]);
        }
        drop(queue);
    }
}

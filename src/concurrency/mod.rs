//! Concurrency primitives for the traversal engine.
//!
//! Everything here is either lock-free (bitset, chunk queue), spin-based
//! (barrier), or protocol-guarded (`PhaseCell`); the engine never takes a
//! mutex on its hot path.

pub mod atomic_bitset;
pub mod barrier;
pub mod chunk_queue;
pub mod phase_cell;

pub use atomic_bitset::AtomicBitset;
pub use barrier::SpinBarrier;
pub use chunk_queue::ChunkQueue;
pub use phase_cell::PhaseCell;

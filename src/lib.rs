//! # `skein` - NUMA-Partitioned Direction-Optimizing Graph Traversal
//!
//! A parallel graph traversal engine that partitions the vertex set across
//! NUMA domains and, every round, chooses between pulling along in-edges
//! and pushing along out-edges based on the size of the active frontier.
//!
//! ## Execution Model
//!
//! ### Two-Level Worker Pool
//! - **Domains**: the vertex set is split into contiguous, degree-balanced
//!   ranges, one per NUMA domain; worker threads can be pinned to their
//!   domain's CPU share.
//! - **Sub-workers**: each domain runs several sub-workers over static or
//!   dynamically claimed slices of its range.
//! - **SPMD drivers**: every worker executes the same driver closure;
//!   collective operations synchronize through a two-phase barrier where
//!   only domain leaders cross domains.
//!
//! ### Direction Optimization
//! - **Dense rounds** scan vertex ranges over a word-packed atomic bitmap,
//!   pulling from in-edges with operator-gated early exit.
//! - **Sparse rounds** scan the compacted active id list, pushing along
//!   out-edges into per-domain append sinks.
//! - **The switch** is the classic `|frontier| + out-edges(frontier)`
//!   threshold test, re-evaluated every round.
//!
//! ### Asynchronous Relaxation
//! - An async sparse kernel exchanges chunks of activated ids through a
//!   lock-free MPMC queue and runs label-correcting algorithms to a fixed
//!   point inside one round, with ring-consensus termination.
//!
//! ## Layers
//!
//! 1. [`concurrency`]: atomic bitset, sense-reversing spin barrier,
//!    bounded MPMC chunk queue, barrier-phase cell.
//! 2. [`graph`]: immutable CSR store with both edge directions.
//! 3. [`frontier`]: dual-representation active set, per domain and
//!    aggregated.
//! 4. [`partition`]: degree-balanced domain boundaries and per-thread
//!    partition descriptors.
//! 5. [`engine`]: the worker pool and the traversal kernels.
//!
//! ## Example
//!
//! ```rust
//! use core::sync::atomic::{AtomicU64, Ordering};
//! use skein::{EdgeMapOptions, EdgeOp, EngineConfig, Graph, Traversal};
//!
//! struct Sssp {
//!     dist: Vec<AtomicU64>,
//! }
//!
//! impl EdgeOp for Sssp {
//!     fn should_process(&self, _v: usize) -> bool {
//!         true
//!     }
//!
//!     fn try_activate(&self, src: usize, dst: usize, weight: u32) -> bool {
//!         let candidate = self.dist[src].load(Ordering::Relaxed) + u64::from(weight);
//!         let mut seen = self.dist[dst].load(Ordering::Relaxed);
//!         while candidate < seen {
//!             match self.dist[dst].compare_exchange_weak(
//!                 seen,
//!                 candidate,
//!                 Ordering::Relaxed,
//!                 Ordering::Relaxed,
//!             ) {
//!                 Ok(_) => return true,
//!                 Err(now) => seen = now,
//!             }
//!         }
//!         false
//!     }
//! }
//!
//! let graph = Graph::from_edges(4, &[(0, 1, 2), (0, 2, 5), (1, 3, 1), (2, 3, 1)]);
//! let op = Sssp {
//!     dist: (0..4).map(|v| AtomicU64::new(if v == 0 { 0 } else { u64::MAX / 2 })).collect(),
//! };
//! let config = EngineConfig::with_shape(1, 2);
//! let mut traversal = Traversal::from_seeds(&graph, &config, &[0]);
//! let threshold = traversal.default_threshold();
//! traversal.run(|scope| {
//!     while scope.num_active() > 0 {
//!         scope.edge_map(&op, threshold, EdgeMapOptions::default());
//!     }
//! });
//! assert_eq!(op.dist[3].load(Ordering::Relaxed), 3);
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod concurrency;
pub mod config;
pub mod engine;
pub mod frontier;
pub mod graph;
pub mod meter;
pub mod partition;

pub use concurrency::{AtomicBitset, ChunkQueue, PhaseCell, SpinBarrier};
pub use config::EngineConfig;
pub use engine::{
    DenseVariant, Direction, EdgeMapOptions, EdgeOp, ReduceOp, SparseVariant, Traversal,
    WorkerScope, DIRECTION_FRACTION,
};
pub use frontier::{Frontier, FrontierCollection};
pub use graph::{Graph, VertexId, Weight};
pub use partition::{partition_by_degree, SubPartitioner};

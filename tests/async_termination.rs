//! Termination and correctness of the asynchronous sparse kernel under
//! real thread contention.

use core::sync::atomic::{AtomicU64, Ordering};

use skein::{EdgeMapOptions, EdgeOp, EngineConfig, Graph, SparseVariant, Traversal};

const INF: u64 = u64::MAX / 4;

struct Sssp {
    dist: Vec<AtomicU64>,
}

impl Sssp {
    fn new(n: usize, source: usize) -> Self {
        Self {
            dist: (0..n)
                .map(|v| AtomicU64::new(if v == source { 0 } else { INF }))
                .collect(),
        }
    }
}

impl EdgeOp for Sssp {
    fn should_process(&self, _v: usize) -> bool {
        true
    }

    fn try_activate(&self, src: usize, dst: usize, weight: u32) -> bool {
        let candidate = self.dist[src].load(Ordering::Relaxed) + u64::from(weight);
        let mut seen = self.dist[dst].load(Ordering::Relaxed);
        while candidate < seen {
            match self.dist[dst].compare_exchange_weak(
                seen,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(now) => seen = now,
            }
        }
        false
    }
}

const ASYNC: EdgeMapOptions = EdgeMapOptions {
    dense: skein::DenseVariant::Pull,
    sparse: SparseVariant::Async,
};

#[test]
fn empty_frontier_terminates() {
    let graph = Graph::from_edges(16, &[(0, 1, 1)]);
    let op = Sssp::new(16, 0);
    let config = EngineConfig::with_shape(2, 2);
    let mut traversal = Traversal::from_seeds(&graph, &config, &[]);
    traversal.run(|scope| {
        assert_eq!(scope.num_active(), 0);
        scope.edge_map(&op, usize::MAX, ASYNC);
        assert_eq!(scope.num_active(), 0);
    });
    assert_eq!(op.dist[1].load(Ordering::Relaxed), INF);
}

#[test]
fn edgeless_frontier_terminates() {
    // Seeds with no out-edges produce chunks whose relaxations all fail.
    let graph = Graph::from_edges(8, &[(0, 1, 1)]);
    let op = Sssp::new(8, 5);
    let config = EngineConfig::with_shape(1, 4);
    let mut traversal = Traversal::from_seeds(&graph, &config, &[5]);
    traversal.run(|scope| {
        scope.edge_map(&op, usize::MAX, ASYNC);
        assert_eq!(scope.num_active(), 0);
    });
}

struct CappedVisits {
    hits: Vec<AtomicU64>,
    cap: u64,
}

impl EdgeOp for CappedVisits {
    fn should_process(&self, _v: usize) -> bool {
        true
    }

    fn try_activate(&self, _src: usize, dst: usize, _weight: u32) -> bool {
        self.hits[dst].fetch_add(1, Ordering::Relaxed) < self.cap
    }
}

#[test]
fn activation_flood_does_not_stall_the_round() {
    // A complete digraph with every vertex seeded and a one-worker pool:
    // relaxing a single chunk produces far more successor chunks than the
    // queue holds, and nobody pops while it happens. The round must absorb
    // the burst and still reach the fixed point.
    let n = 512;
    let cap = 32;
    let mut edges = Vec::with_capacity(n * (n - 1));
    for u in 0..n {
        for v in 0..n {
            if u != v {
                edges.push((u, v, 1));
            }
        }
    }
    let graph = Graph::from_edges(n, &edges);
    let op = CappedVisits {
        hits: (0..n).map(|_| AtomicU64::new(0)).collect(),
        cap,
    };
    let seeds: Vec<usize> = (0..n).collect();
    let config = EngineConfig::with_shape(1, 1);
    let mut traversal = Traversal::from_seeds(&graph, &config, &seeds);
    traversal.run(|scope| {
        assert_eq!(scope.num_active(), n);
        scope.edge_map(&op, usize::MAX, ASYNC);
        assert_eq!(scope.num_active(), 0);
    });
    for v in 0..n {
        assert!(op.hits[v].load(Ordering::Relaxed) >= cap, "vertex {v} under-visited");
    }
}

#[test]
fn contended_relaxation_matches_bellman_ford() {
    // A layered random graph with many alternative paths keeps re-activation
    // pressure on the queue.
    let layers = 20;
    let width = 25;
    let n = layers * width;
    let mut rng = 0xD1B5_4A32_D192_ED03u64;
    let mut next = move || {
        rng = rng
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        rng >> 33
    };
    let mut edges = Vec::new();
    for layer in 0..layers - 1 {
        for u in 0..width {
            for _ in 0..3 {
                let v = (next() as usize) % width;
                let w = (next() as u32) % 8 + 1;
                edges.push((layer * width + u, (layer + 1) * width + v, w));
            }
        }
    }
    // Back edges force label corrections after the first pass.
    for _ in 0..n / 4 {
        let u = (next() as usize) % n;
        let v = (next() as usize) % n;
        edges.push((u, v, (next() as u32) % 8 + 1));
    }
    let graph = Graph::from_edges(n, &edges);

    let mut expected = vec![INF; n];
    expected[0] = 0;
    loop {
        let mut changed = false;
        for &(u, v, w) in &edges {
            if expected[u] != INF && expected[u] + u64::from(w) < expected[v] {
                expected[v] = expected[u] + u64::from(w);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let op = Sssp::new(n, 0);
    let config = EngineConfig::with_shape(2, 3);
    let mut traversal = Traversal::from_seeds(&graph, &config, &[0]);
    traversal.run(|scope| {
        scope.edge_map(&op, usize::MAX, ASYNC);
        assert_eq!(scope.num_active(), 0);
    });
    for v in 0..n {
        assert_eq!(op.dist[v].load(Ordering::Relaxed), expected[v], "vertex {v}");
    }
}

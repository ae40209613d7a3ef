//! Immutable weighted directed graph in CSR form.
//!
//! The traversal engine consumes a pre-loaded graph: vertex count, edge
//! count, and per-vertex out- and in-edge lists of `(neighbor, weight)`
//! pairs. Both directions are materialized because the dense-pull strategy
//! scans in-edges while the push strategies scan out-edges. The graph is
//! immutable after construction and shared read-only by every worker.
//!
//! Memory layout per direction:
//! - `offsets`: `Vec<usize>` of length `n + 1` (row offsets)
//! - `edges`: contiguous `(neighbor, weight)` pairs in row-major order

/// Vertex identifier. Ids are dense indices in `[0, n)`.
pub type VertexId = usize;

/// Edge weight.
pub type Weight = u32;

/// One direction of adjacency in CSR form.
pub struct Adjacency {
    offsets: Vec<usize>,
    edges: Vec<(VertexId, Weight)>,
}

impl Adjacency {
    /// Builds adjacency directly from CSR parts.
    ///
    /// # Panics
    /// - if `offsets.len() < 1`
    /// - if offsets are not monotone
    /// - if `offsets.last() != edges.len()`
    /// - if any edge target is `>= offsets.len() - 1`
    pub fn from_csr_parts(offsets: Vec<usize>, edges: Vec<(VertexId, Weight)>) -> Self {
        assert!(!offsets.is_empty(), "offsets must have length n+1");
        let n = offsets.len() - 1;
        for w in offsets.windows(2) {
            assert!(w[0] <= w[1], "offsets must be monotone");
        }
        let m = *offsets.last().expect("offsets non-empty");
        assert!(m == edges.len(), "offsets last must equal edges length");
        for &(v, _) in &edges {
            assert!(v < n, "edge to {v} out of bounds for n={n}");
        }
        Self { offsets, edges }
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// The `(neighbor, weight)` pairs of `v`.
    #[inline]
    pub fn neighbors(&self, v: VertexId) -> &[(VertexId, Weight)] {
        assert!(v < self.vertex_count(), "vertex {v} out of bounds");
        &self.edges[self.offsets[v]..self.offsets[v + 1]]
    }

    /// Degree of `v` in this direction.
    #[inline]
    pub fn degree(&self, v: VertexId) -> usize {
        assert!(v < self.vertex_count(), "vertex {v} out of bounds");
        self.offsets[v + 1] - self.offsets[v]
    }
}

/// An immutable weighted digraph with both edge directions materialized.
pub struct Graph {
    n: usize,
    m: usize,
    out: Adjacency,
    inc: Adjacency,
}

impl Graph {
    /// Builds a graph from an edge list of `(source, target, weight)` triples.
    ///
    /// Edge order within a vertex's list follows the input order; the in-edge
    /// mirror is derived by a counting pass.
    ///
    /// # Panics
    /// Panics if any endpoint is `>= n`.
    pub fn from_edges(n: usize, edge_list: &[(VertexId, VertexId, Weight)]) -> Self {
        for &(u, v, _) in edge_list {
            assert!(u < n && v < n, "edge {u}->{v} out of bounds for n={n}");
        }
        let out = Self::bucket(n, edge_list.iter().map(|&(u, v, w)| (u, v, w)));
        let inc = Self::bucket(n, edge_list.iter().map(|&(u, v, w)| (v, u, w)));
        Self {
            n,
            m: edge_list.len(),
            out,
            inc,
        }
    }

    /// Builds a graph from prebuilt out-CSR parts, deriving the in-edge
    /// mirror.
    pub fn from_out_csr(offsets: Vec<usize>, edges: Vec<(VertexId, Weight)>) -> Self {
        let out = Adjacency::from_csr_parts(offsets, edges);
        let n = out.vertex_count();
        let m = out.edge_count();
        let inc = Self::bucket(
            n,
            (0..n).flat_map(|u| out.neighbors(u).iter().map(move |&(v, w)| (v, u, w))),
        );
        Self { n, m, out, inc }
    }

    fn bucket(n: usize, iter: impl Iterator<Item = (VertexId, VertexId, Weight)> + Clone) -> Adjacency {
        let mut degrees = vec![0usize; n];
        for (src, _, _) in iter.clone() {
            degrees[src] += 1;
        }
        let mut offsets = Vec::with_capacity(n + 1);
        let mut total = 0usize;
        offsets.push(0);
        for &d in &degrees {
            total += d;
            offsets.push(total);
        }
        let mut cursors = offsets.clone();
        let mut edges = vec![(0usize, 0u32); total];
        for (src, dst, w) in iter {
            edges[cursors[src]] = (dst, w);
            cursors[src] += 1;
        }
        Adjacency::from_csr_parts(offsets, edges)
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.n
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.m
    }

    /// Out-neighbors of `v` as `(target, weight)` pairs.
    #[inline]
    pub fn out_neighbors(&self, v: VertexId) -> &[(VertexId, Weight)] {
        self.out.neighbors(v)
    }

    /// In-neighbors of `v` as `(source, weight)` pairs.
    #[inline]
    pub fn in_neighbors(&self, v: VertexId) -> &[(VertexId, Weight)] {
        self.inc.neighbors(v)
    }

    /// Out-degree of `v`.
    #[inline]
    pub fn out_degree(&self, v: VertexId) -> usize {
        self.out.degree(v)
    }

    /// In-degree of `v`.
    #[inline]
    pub fn in_degree(&self, v: VertexId) -> usize {
        self.inc.degree(v)
    }

    /// Per-vertex degrees, out or in.
    ///
    /// This is the input to degree-balanced domain partitioning; with the
    /// `parallel` feature the scan uses rayon, matching how graph loads are
    /// parallelized upstream.
    pub fn degrees(&self, by_out: bool) -> Vec<usize> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            (0..self.n)
                .into_par_iter()
                .map(|v| if by_out { self.out_degree(v) } else { self.in_degree(v) })
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            (0..self.n)
                .map(|v| if by_out { self.out_degree(v) } else { self.in_degree(v) })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Graph {
        // 0 -> 1 (2), 0 -> 2 (5), 1 -> 3 (1), 2 -> 3 (1)
        Graph::from_edges(4, &[(0, 1, 2), (0, 2, 5), (1, 3, 1), (2, 3, 1)])
    }

    #[test]
    fn out_and_in_mirror_each_other() {
        let g = diamond();
        assert_eq!(g.vertex_count(), 4);
        assert_eq!(g.edge_count(), 4);

        assert_eq!(g.out_neighbors(0), &[(1, 2), (2, 5)]);
        assert_eq!(g.out_neighbors(3), &[]);
        assert_eq!(g.in_neighbors(3), &[(1, 1), (2, 1)]);
        assert_eq!(g.in_neighbors(0), &[]);

        assert_eq!(g.out_degree(0), 2);
        assert_eq!(g.in_degree(3), 2);
        assert_eq!(g.in_degree(0), 0);
    }

    #[test]
    fn from_out_csr_matches_edge_list() {
        let g = Graph::from_out_csr(
            vec![0, 2, 3, 4, 4],
            vec![(1, 2), (2, 5), (3, 1), (3, 1)],
        );
        let h = diamond();
        for v in 0..4 {
            assert_eq!(g.out_neighbors(v), h.out_neighbors(v));
            assert_eq!(g.in_neighbors(v), h.in_neighbors(v));
        }
    }

    #[test]
    fn degrees_by_direction() {
        let g = diamond();
        assert_eq!(g.degrees(true), vec![2, 1, 1, 0]);
        assert_eq!(g.degrees(false), vec![0, 1, 1, 2]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn out_of_bounds_edge_is_rejected() {
        Graph::from_edges(2, &[(0, 5, 1)]);
    }

    #[test]
    #[should_panic(expected = "monotone")]
    fn non_monotone_offsets_are_rejected() {
        Adjacency::from_csr_parts(vec![0, 3, 1], vec![(0, 1), (1, 1), (1, 1)]);
    }
}

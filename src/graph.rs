use std::collections::VecDeque;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::atom::{Atom, Vertex};
use crate::bond::{Bond, BondOrder, Edge};
use crate::error::LayoutError;

/// `matrix[i][j]` is `true` when vertices `i` and `j` are bonded.
pub type AdjacencyMatrix = Vec<Vec<bool>>;

/// Unweighted shortest-path lengths; `None` marks unreachable pairs.
pub type DistanceMatrix = Vec<Vec<Option<u32>>>;

/// The vertex/edge arena shared by every layout stage.
///
/// Vertices and edges are addressed by petgraph indices, which are dense and
/// stable because nothing is ever removed during layout.
#[derive(Clone, Default)]
pub struct MolGraph {
    graph: UnGraph<Vertex, Edge>,
}

impl MolGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &UnGraph<Vertex, Edge> {
        &self.graph
    }

    pub fn vertex(&self, idx: NodeIndex) -> &Vertex {
        &self.graph[idx]
    }

    pub fn vertex_mut(&mut self, idx: NodeIndex) -> &mut Vertex {
        &mut self.graph[idx]
    }

    pub fn try_vertex(&self, idx: NodeIndex) -> Result<&Vertex, LayoutError> {
        self.graph
            .node_weight(idx)
            .ok_or(LayoutError::UnknownVertex(idx.index()))
    }

    pub fn edge(&self, idx: EdgeIndex) -> &Edge {
        &self.graph[idx]
    }

    pub fn edge_mut(&mut self, idx: EdgeIndex) -> &mut Edge {
        &mut self.graph[idx]
    }

    pub fn add_atom(&mut self, atom: Atom) -> NodeIndex {
        self.graph.add_node(Vertex::new(atom))
    }

    pub fn add_bond(&mut self, a: NodeIndex, b: NodeIndex, bond: Bond) -> Result<EdgeIndex, LayoutError> {
        self.try_vertex(a)?;
        self.try_vertex(b)?;
        if a == b {
            return Err(LayoutError::SelfLoop {
                bond: self.edge_count(),
                atom: a.index(),
            });
        }
        if self.graph.find_edge(a, b).is_some() {
            return Err(LayoutError::DuplicateBond {
                a: a.index(),
                b: b.index(),
            });
        }
        Ok(self.graph.add_edge(a, b, Edge::new(bond)))
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    /// Neighbours in ascending index order.
    pub fn neighbours(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.graph.neighbors(idx).collect();
        out.sort();
        out
    }

    pub fn drawn_neighbours(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out = self.neighbours(idx);
        out.retain(|&n| self.graph[n].is_drawn);
        out
    }

    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.graph.neighbors(idx).count()
    }

    pub fn bond_between(&self, a: NodeIndex, b: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(a, b)
    }

    pub fn edge_endpoints(&self, idx: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(idx)
    }

    pub fn bond_order(&self, a: NodeIndex, b: NodeIndex) -> Option<BondOrder> {
        self.bond_between(a, b).map(|e| self.graph[e].order())
    }

    pub fn adjacency_matrix(&self) -> AdjacencyMatrix {
        let n = self.vertex_count();
        let mut matrix = vec![vec![false; n]; n];
        for edge in self.edges() {
            if let Some((a, b)) = self.edge_endpoints(edge) {
                matrix[a.index()][b.index()] = true;
                matrix[b.index()][a.index()] = true;
            }
        }
        matrix
    }

    /// Adjacency restricted to ring bonds. Its connected components are the
    /// ring systems plus one singleton per acyclic atom.
    pub fn ring_adjacency_matrix(&self) -> AdjacencyMatrix {
        let n = self.vertex_count();
        let mut matrix = vec![vec![false; n]; n];
        for edge in self.edges() {
            let Some((a, b)) = self.edge_endpoints(edge) else {
                continue;
            };
            if self.reachable_without(a, b, edge) {
                matrix[a.index()][b.index()] = true;
                matrix[b.index()][a.index()] = true;
            }
        }
        matrix
    }

    /// Adjacency of the subgraph induced by `vertex_ids`, indexed by position
    /// in `vertex_ids`.
    pub fn subgraph_adjacency(&self, vertex_ids: &[usize]) -> Result<AdjacencyMatrix, LayoutError> {
        let n = self.vertex_count();
        if let Some(&bad) = vertex_ids.iter().find(|&&id| id >= n) {
            return Err(LayoutError::UnknownVertex(bad));
        }
        let len = vertex_ids.len();
        let mut matrix = vec![vec![false; len]; len];
        for i in 0..len {
            for j in (i + 1)..len {
                let a = NodeIndex::new(vertex_ids[i]);
                let b = NodeIndex::new(vertex_ids[j]);
                if self.graph.find_edge(a, b).is_some() {
                    matrix[i][j] = true;
                    matrix[j][i] = true;
                }
            }
        }
        Ok(matrix)
    }

    pub fn distance_matrix(&self) -> DistanceMatrix {
        // the full adjacency matrix is square by construction
        floyd_warshall(&self.adjacency_matrix()).unwrap_or_default()
    }

    pub fn subgraph_distance_matrix(&self, vertex_ids: &[usize]) -> Result<DistanceMatrix, LayoutError> {
        floyd_warshall(&self.subgraph_adjacency(vertex_ids)?)
    }

    /// Sets `Edge::in_ring` on every bond that lies on a cycle and returns the
    /// number of ring bonds.
    pub fn mark_ring_bonds(&mut self) -> usize {
        let edges: Vec<EdgeIndex> = self.edges().collect();
        let mut count = 0;
        for edge in edges {
            let Some((a, b)) = self.edge_endpoints(edge) else {
                continue;
            };
            let in_ring = self.reachable_without(a, b, edge);
            self.graph[edge].in_ring = in_ring;
            if in_ring {
                count += 1;
            }
        }
        count
    }

    fn reachable_without(&self, from: NodeIndex, to: NodeIndex, skip: EdgeIndex) -> bool {
        let mut visited = vec![false; self.vertex_count()];
        visited[from.index()] = true;
        let mut queue = VecDeque::from([from]);
        while let Some(cur) = queue.pop_front() {
            for e in self.graph.edges(cur) {
                if e.id() == skip {
                    continue;
                }
                let next = if e.source() == cur { e.target() } else { e.source() };
                if next == to {
                    return true;
                }
                if !visited[next.index()] {
                    visited[next.index()] = true;
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// All vertices reachable from `root` without stepping onto `parent`,
    /// `root` first.
    pub fn subtree(&self, root: NodeIndex, parent: Option<NodeIndex>) -> Vec<NodeIndex> {
        let mut visited = vec![false; self.vertex_count()];
        visited[root.index()] = true;
        if let Some(p) = parent {
            visited[p.index()] = true;
        }
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            for n in self.neighbours(cur).into_iter().rev() {
                if !visited[n.index()] {
                    visited[n.index()] = true;
                    stack.push(n);
                }
            }
        }
        out
    }

    /// Depth of the drawn part of the branch rooted at `root` when entered
    /// from `parent`: 1 for a terminal atom.
    pub fn subtree_depth(&self, root: NodeIndex, parent: Option<NodeIndex>) -> usize {
        let n = self.vertex_count();
        let mut depth = vec![usize::MAX; n];
        depth[root.index()] = 1;
        if let Some(p) = parent {
            depth[p.index()] = 0;
        }
        let mut max = 1;
        let mut queue = VecDeque::from([root]);
        while let Some(cur) = queue.pop_front() {
            let d = depth[cur.index()];
            for next in self.drawn_neighbours(cur) {
                if depth[next.index()] == usize::MAX {
                    depth[next.index()] = d + 1;
                    max = max.max(d + 1);
                    queue.push_back(next);
                }
            }
        }
        max
    }
}

impl std::fmt::Debug for MolGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MolGraph")
            .field("vertex_count", &self.vertex_count())
            .field("edge_count", &self.edge_count())
            .finish()
    }
}

pub(crate) fn check_square(adjacency: &AdjacencyMatrix) -> Result<(), LayoutError> {
    let expected = adjacency.len();
    for (row, entries) in adjacency.iter().enumerate() {
        if entries.len() != expected {
            return Err(LayoutError::NonSquareMatrix {
                row,
                len: entries.len(),
                expected,
            });
        }
    }
    Ok(())
}

/// Connected components of an adjacency matrix, each sorted ascending and
/// ordered by their smallest vertex.
pub fn connected_components(adjacency: &AdjacencyMatrix) -> Result<Vec<Vec<usize>>, LayoutError> {
    check_square(adjacency)?;
    let n = adjacency.len();
    let mut visited = vec![false; n];
    let mut components = Vec::new();
    for start in 0..n {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut component = vec![start];
        let mut stack = vec![start];
        while let Some(cur) = stack.pop() {
            for (next, &bonded) in adjacency[cur].iter().enumerate() {
                if bonded && !visited[next] {
                    visited[next] = true;
                    component.push(next);
                    stack.push(next);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }
    Ok(components)
}

/// All-pairs unweighted shortest paths.
pub fn floyd_warshall(adjacency: &AdjacencyMatrix) -> Result<DistanceMatrix, LayoutError> {
    check_square(adjacency)?;
    let n = adjacency.len();
    let mut dist: DistanceMatrix = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    if i == j {
                        Some(0)
                    } else if adjacency[i][j] {
                        Some(1)
                    } else {
                        None
                    }
                })
                .collect()
        })
        .collect();
    for k in 0..n {
        for i in 0..n {
            let Some(ik) = dist[i][k] else { continue };
            for j in 0..n {
                let Some(kj) = dist[k][j] else { continue };
                let via = ik + kj;
                if dist[i][j].map_or(true, |cur| via < cur) {
                    dist[i][j] = Some(via);
                }
            }
        }
    }
    Ok(dist)
}

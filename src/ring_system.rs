//! Ring inventory, ring connections and bridged-ring collapse.

use std::collections::BTreeSet;

use petgraph::graph::NodeIndex;

use crate::error::LayoutError;
use crate::graph::MolGraph;
use crate::ring::{Ring, RingConnection, RingId};

/// Active rings of a molecule together with the connections between them.
///
/// Built from perceived rings. Every maximal cluster of mutually bridged
/// rings is replaced by one synthetic ring with `is_bridged` set; the rings
/// it replaced are kept as its `subrings` and in
/// [`original_rings`](Self::original_rings).
#[derive(Debug, Clone, Default)]
pub struct RingSystem {
    rings: Vec<Ring>,
    original_rings: Vec<Ring>,
    connections: Vec<RingConnection>,
    next_ring_id: RingId,
    next_connection_id: usize,
}

impl RingSystem {
    /// Registers `perceived` rings on `graph` and collapses bridged clusters.
    pub fn build(graph: &mut MolGraph, perceived: Vec<Vec<NodeIndex>>) -> Result<Self, LayoutError> {
        let mut system = Self::default();
        for members in perceived {
            for &m in &members {
                graph.try_vertex(m)?;
            }
            let id = system.next_ring_id;
            system.next_ring_id += 1;
            for &m in &members {
                graph.vertex_mut(m).rings.push(id);
            }
            system.rings.push(Ring::new(id, members));
        }

        for i in 0..system.rings.len() {
            for j in (i + 1)..system.rings.len() {
                let id = system.next_connection_id;
                if let Some(c) = RingConnection::new(id, &system.rings[i], &system.rings[j]) {
                    system.connections.push(c);
                    system.next_connection_id += 1;
                }
            }
        }
        for i in 0..system.rings.len() {
            let id = system.rings[i].id;
            system.rings[i].neighbours = system.neighbours_of(id);
        }

        system.original_rings = system.rings.clone();
        system.collapse_bridged(graph);
        system.classify();
        Ok(system)
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn original_rings(&self) -> &[Ring] {
        &self.original_rings
    }

    pub fn original_rings_mut(&mut self) -> &mut [Ring] {
        &mut self.original_rings
    }

    pub fn connections(&self) -> &[RingConnection] {
        &self.connections
    }

    pub fn ring(&self, id: RingId) -> Option<&Ring> {
        self.rings.iter().find(|r| r.id == id)
    }

    pub fn ring_mut(&mut self, id: RingId) -> Option<&mut Ring> {
        self.rings.iter_mut().find(|r| r.id == id)
    }

    pub fn try_ring(&self, id: RingId) -> Result<&Ring, LayoutError> {
        self.ring(id).ok_or(LayoutError::UnknownRing(id))
    }

    pub fn has_bridged(&self) -> bool {
        self.rings.iter().any(|r| r.is_bridged)
    }

    pub fn connection_between(&self, a: RingId, b: RingId) -> Option<&RingConnection> {
        self.connections
            .iter()
            .find(|c| c.contains_ring(a) && c.contains_ring(b) && a != b)
    }

    /// Vertices shared by two rings, ascending.
    pub fn shared_vertices(&self, a: RingId, b: RingId) -> Vec<NodeIndex> {
        self.connection_between(a, b)
            .map(|c| c.vertices.iter().copied().collect())
            .unwrap_or_default()
    }

    fn neighbours_of(&self, ring: RingId) -> Vec<RingId> {
        let mut out: Vec<RingId> = self
            .connections
            .iter()
            .filter(|c| c.contains_ring(ring))
            .map(|c| c.other(ring))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn is_part_of_bridged(&self, graph: &MolGraph, ring: RingId) -> bool {
        self.connections
            .iter()
            .any(|c| c.contains_ring(ring) && c.is_bridge(graph))
    }

    /// Rings reachable from `start` through bridge connections, `start` first.
    fn bridged_cluster(&self, graph: &MolGraph, start: RingId) -> Vec<RingId> {
        let mut cluster = vec![start];
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for c in &self.connections {
                if !c.contains_ring(current) || !c.is_bridge(graph) {
                    continue;
                }
                let other = c.other(current);
                if !cluster.contains(&other) {
                    cluster.push(other);
                    stack.push(other);
                }
            }
        }
        cluster
    }

    fn collapse_bridged(&mut self, graph: &mut MolGraph) {
        // every collapse removes at least one ring
        let cap = self.rings.len() + 1;
        for _ in 0..cap {
            let Some(seed) = self
                .rings
                .iter()
                .filter(|r| !r.is_bridged && self.is_part_of_bridged(graph, r.id))
                .map(|r| r.id)
                .last()
            else {
                break;
            };
            let cluster = self.bridged_cluster(graph, seed);
            if cluster.len() < 2 {
                break;
            }
            let id = self.create_bridged_ring(graph, &cluster);
            log::debug!("collapsed rings {:?} into bridged ring {}", cluster, id);
        }
    }

    fn create_bridged_ring(&mut self, graph: &mut MolGraph, cluster: &[RingId]) -> RingId {
        let id = self.next_ring_id;
        self.next_ring_id += 1;

        let mut members: BTreeSet<NodeIndex> = BTreeSet::new();
        let mut neighbours: BTreeSet<RingId> = BTreeSet::new();
        let mut subrings = Vec::new();
        for &rid in cluster {
            let Some(pos) = self.rings.iter().position(|r| r.id == rid) else {
                continue;
            };
            let mut ring = self.rings.remove(pos);
            ring.is_part_of_bridged = true;
            members.extend(ring.members.iter().copied());
            neighbours.extend(ring.neighbours.iter().copied().filter(|n| !cluster.contains(n)));
            if ring.is_bridged {
                subrings.append(&mut ring.subrings);
            } else {
                subrings.push(ring);
            }
        }
        for ring in &mut self.original_rings {
            if cluster.contains(&ring.id) || subrings.iter().any(|s| s.id == ring.id) {
                ring.is_part_of_bridged = true;
            }
        }

        for &m in &members {
            let vertex = graph.vertex_mut(m);
            vertex.rings.retain(|r| !cluster.contains(r));
            vertex.rings.push(id);
            vertex.bridged_ring = Some(id);
        }

        self.connections
            .retain(|c| !(cluster.contains(&c.first_ring) && cluster.contains(&c.second_ring)));
        for c in &mut self.connections {
            for &old in cluster {
                c.update_ring(old, id);
            }
        }
        self.merge_duplicate_connections();

        for ring in &mut self.rings {
            let before = ring.neighbours.len();
            ring.neighbours.retain(|n| !cluster.contains(n));
            if ring.neighbours.len() != before {
                ring.neighbours.push(id);
                ring.neighbours.sort_unstable();
                ring.neighbours.dedup();
            }
        }

        let mut ring = Ring::new(id, members.into_iter().collect());
        ring.is_bridged = true;
        ring.neighbours = neighbours.into_iter().collect();
        ring.subrings = subrings;
        self.rings.push(ring);
        id
    }

    fn merge_duplicate_connections(&mut self) {
        let mut merged: Vec<RingConnection> = Vec::with_capacity(self.connections.len());
        for c in self.connections.drain(..) {
            if let Some(existing) = merged.iter_mut().find(|m| m.key() == c.key()) {
                existing.vertices.extend(c.vertices);
            } else {
                merged.push(c);
            }
        }
        self.connections = merged;
    }

    fn classify(&mut self) {
        for c in &self.connections {
            let (spiro, fused) = match c.vertices.len() {
                1 => (true, false),
                2 => (false, true),
                _ => (false, false),
            };
            for ring in self.rings.iter_mut().filter(|r| c.contains_ring(r.id)) {
                ring.is_spiro |= spiro;
                ring.is_fused |= fused;
            }
        }
        for ring in &mut self.rings {
            if ring.is_bridged || ring.is_part_of_bridged {
                ring.can_flip = false;
            }
        }
        for original in &mut self.original_rings {
            let active = self.rings.iter().find(|r| r.id == original.id);
            if let Some(active) = active {
                original.is_fused = active.is_fused;
                original.is_spiro = active.is_spiro;
            }
            if original.is_part_of_bridged {
                original.can_flip = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use crate::bond::Bond;
    use crate::rings::RingInfo;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn system(atoms: usize, edges: &[(usize, usize)]) -> (MolGraph, RingSystem) {
        let mut g = MolGraph::new();
        for _ in 0..atoms {
            g.add_atom(Atom::new("C"));
        }
        for &(a, b) in edges {
            g.add_bond(n(a), n(b), Bond::default()).unwrap();
        }
        let rings = RingInfo::sssr(&g).into_rings();
        let rs = RingSystem::build(&mut g, rings).unwrap();
        (g, rs)
    }

    const NAPHTHALENE: &[(usize, usize)] = &[
        (0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 6), (6, 7), (7, 8), (8, 3), (8, 9), (9, 0),
    ];

    const ADAMANTANE: &[(usize, usize)] = &[
        (0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0), (5, 6), (6, 7), (7, 8), (8, 1), (7, 9),
        (9, 3),
    ];

    #[test]
    fn naphthalene_is_fused() {
        let (g, rs) = system(10, NAPHTHALENE);
        assert_eq!(rs.rings().len(), 2);
        assert!(rs.rings().iter().all(|r| r.is_fused && !r.is_bridged && !r.is_spiro));
        assert_eq!(rs.connections().len(), 1);
        assert_eq!(rs.shared_vertices(0, 1), vec![n(3), n(8)]);
        assert_eq!(rs.ring(0).unwrap().neighbours, vec![1]);
        assert_eq!(g.vertex(n(3)).rings.len(), 2);
    }

    #[test]
    fn spiro_rings() {
        let edges = [
            (0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0), (3, 6), (6, 7), (7, 8), (8, 3),
        ];
        let (_, rs) = system(9, &edges);
        assert!(rs.rings().iter().all(|r| r.is_spiro && !r.is_fused));
        assert_eq!(rs.shared_vertices(0, 1), vec![n(3)]);
    }

    #[test]
    fn adamantane_collapses_to_one_bridged_ring() {
        let (g, rs) = system(10, ADAMANTANE);
        assert_eq!(rs.rings().len(), 1);
        let bridged = &rs.rings()[0];
        assert!(bridged.is_bridged);
        assert!(!bridged.can_flip);
        assert_eq!(bridged.size(), 10);
        assert_eq!(bridged.subrings.len(), 3);
        assert_eq!(rs.original_rings().len(), 3);
        assert!(rs.original_rings().iter().all(|r| r.is_part_of_bridged));
        assert!(rs.connections().is_empty());
        for v in g.vertices() {
            assert_eq!(g.vertex(v).rings, vec![bridged.id]);
            assert_eq!(g.vertex(v).bridged_ring, Some(bridged.id));
        }
    }

    #[test]
    fn norbornane_is_bridged() {
        let edges = [(0, 1), (1, 2), (2, 3), (3, 4), (4, 0), (4, 5), (5, 6), (6, 2)];
        let (_, rs) = system(7, &edges);
        assert_eq!(rs.rings().len(), 1);
        assert!(rs.has_bridged());
        assert_eq!(rs.rings()[0].size(), 7);
    }

    #[test]
    fn bridged_ring_keeps_fused_neighbour() {
        // norbornane fused to a cyclopropane on the 0-1 bond
        let edges = [
            (0, 1), (1, 2), (2, 3), (3, 4), (4, 0), (4, 5), (5, 6), (6, 2), (0, 7), (7, 1),
        ];
        let (g, rs) = system(8, &edges);
        assert_eq!(rs.rings().len(), 2);
        let bridged = rs.rings().iter().find(|r| r.is_bridged).unwrap();
        let small = rs.rings().iter().find(|r| !r.is_bridged).unwrap();
        assert_eq!(small.size(), 3);
        assert_eq!(small.neighbours, vec![bridged.id]);
        assert_eq!(bridged.neighbours, vec![small.id]);
        assert!(small.is_fused && bridged.is_fused);
        assert_eq!(rs.connections().len(), 1);
        assert_eq!(rs.shared_vertices(small.id, bridged.id), vec![n(0), n(1)]);
        let mut rings0 = g.vertex(n(0)).rings.clone();
        rings0.sort_unstable();
        let mut expected = vec![small.id, bridged.id];
        expected.sort_unstable();
        assert_eq!(rings0, expected);
    }

    #[test]
    fn separate_rings_have_no_connection() {
        let mut edges: Vec<(usize, usize)> = (0..6).map(|i| (i, (i + 1) % 6)).collect();
        edges.extend((0..6).map(|i| (6 + i, 6 + (i + 1) % 6)));
        edges.push((0, 6));
        let (_, rs) = system(12, &edges);
        assert!(rs.connections().is_empty());
        assert!(rs.rings().iter().all(|r| r.neighbours.is_empty() && r.can_flip));
    }

    #[test]
    fn unknown_member_is_rejected() {
        let mut g = MolGraph::new();
        g.add_atom(Atom::new("C"));
        assert_eq!(
            RingSystem::build(&mut g, vec![vec![n(0), n(4)]]).unwrap_err(),
            LayoutError::UnknownVertex(4)
        );
        assert!(matches!(
            RingSystem::default().try_ring(3),
            Err(LayoutError::UnknownRing(3))
        ));
    }
}

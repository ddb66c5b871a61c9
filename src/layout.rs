//! The layout pipeline: perception, ring systems, placement and overlap
//! resolution over one owned [`MolGraph`].

use glam::DVec2;
use petgraph::graph::NodeIndex;

use crate::depiction::{Depiction, ForceLayoutRecord, PositionedVertex, RingConnectionRecord, RingRecord};
use crate::error::LayoutError;
use crate::geometry::{centroid, direction_or};
use crate::graph::MolGraph;
use crate::input::{AtomRecord, BondRecord};
use crate::options::LayoutOptions;
use crate::overlap::{self, OverlapReport};
use crate::position::Positioner;
use crate::ring::Ring;
use crate::ring_system::RingSystem;
use crate::rings::RingInfo;

/// Owns the molecule being laid out and the ring inventory derived from it.
///
/// ```
/// use chemdepict::{Atom, Bond, Layout, LayoutOptions, MolGraph};
///
/// let mut graph = MolGraph::new();
/// let a = graph.add_atom(Atom::new("C"));
/// let b = graph.add_atom(Atom::new("O"));
/// graph.add_bond(a, b, Bond::default()).unwrap();
///
/// let mut layout = Layout::new(graph, LayoutOptions::default()).unwrap();
/// let depiction = layout.run().unwrap();
/// let d = depiction.position(0).unwrap().distance(depiction.position(1).unwrap());
/// assert!((d - 30.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    graph: MolGraph,
    options: LayoutOptions,
    ring_info: RingInfo,
    rings: RingSystem,
}

impl Layout {
    pub fn new(graph: MolGraph, options: LayoutOptions) -> Result<Self, LayoutError> {
        options.validate()?;
        Ok(Self {
            graph,
            options,
            ring_info: RingInfo::default(),
            rings: RingSystem::default(),
        })
    }

    pub fn from_records(
        atoms: &[AtomRecord],
        bonds: &[BondRecord],
        options: LayoutOptions,
    ) -> Result<Self, LayoutError> {
        Self::new(MolGraph::from_records(atoms, bonds)?, options)
    }

    pub fn graph(&self) -> &MolGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut MolGraph {
        &mut self.graph
    }

    pub fn into_graph(self) -> MolGraph {
        self.graph
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn ring_info(&self) -> &RingInfo {
        &self.ring_info
    }

    pub fn ring_system(&self) -> &RingSystem {
        &self.rings
    }

    /// Runs every stage and returns the positioned molecule.
    ///
    /// Running again keeps pinned vertices and recomputes everything else.
    pub fn run(&mut self) -> Result<Depiction, LayoutError> {
        self.reset();
        let ring_bonds = self.graph.mark_ring_bonds();
        self.hide_hydrogens();

        self.ring_info = RingInfo::sssr(&self.graph);
        log::debug!(
            "perceived {} rings over {} ring bonds ({} candidates accepted)",
            self.ring_info.num_rings(),
            ring_bonds,
            self.ring_info.accepted_before_truncation()
        );
        self.check_ring_coverage();

        self.rings = RingSystem::build(&mut self.graph, self.ring_info.rings().to_vec())?;
        let force_layouts = Positioner::new(&mut self.graph, &mut self.rings, &self.options).position_all()?;
        self.place_hidden_hydrogens();

        let report = overlap::resolve(&mut self.graph, &self.rings, &self.options);
        self.update_ring_centers();
        Ok(self.depiction(force_layouts, report))
    }

    fn reset(&mut self) {
        let ids: Vec<NodeIndex> = self.graph.vertices().collect();
        for v in ids {
            let vertex = self.graph.vertex_mut(v);
            vertex.positioned = vertex.force_positioned;
            vertex.is_drawn = true;
            vertex.rings.clear();
            vertex.bridged_ring = None;
            vertex.parent = None;
            vertex.angle = 0.0;
        }
    }

    /// Hydrogens bonded to exactly one heavy atom are not drawn unless
    /// explicitly requested.
    fn hide_hydrogens(&mut self) {
        if self.options.explicit_hydrogens {
            return;
        }
        let hidden: Vec<NodeIndex> = self
            .graph
            .vertices()
            .filter(|&v| {
                let neighbours = self.graph.neighbours(v);
                self.graph.vertex(v).atom.is_hydrogen()
                    && neighbours.len() == 1
                    && !self.graph.vertex(neighbours[0]).atom.is_hydrogen()
            })
            .collect();
        for v in hidden {
            self.graph.vertex_mut(v).is_drawn = false;
        }
    }

    /// Logs ring closures and ring bonds that perception left uncovered.
    fn check_ring_coverage(&self) {
        for v in self.graph.vertices() {
            let seeded = !self.graph.vertex(v).atom.ring_membership_seed.is_empty();
            if seeded && !self.ring_info.is_ring_atom(v) {
                log::debug!(
                    "atom {} carries ring closures but is not in any perceived ring",
                    v.index()
                );
            }
        }
        for e in self.graph.edges() {
            let Some((a, b)) = self.graph.edge_endpoints(e) else {
                continue;
            };
            if self.graph.edge(e).in_ring && !self.ring_info.is_ring_bond(a, b) {
                log::debug!(
                    "ring bond {}-{} is not covered by any perceived ring",
                    a.index(),
                    b.index()
                );
            }
        }
    }

    /// Puts hidden hydrogens one bond length out from their heavy atom,
    /// opposite its drawn neighbours.
    fn place_hidden_hydrogens(&mut self) {
        let bl = self.options.bond_length;
        let hidden: Vec<NodeIndex> = self
            .graph
            .vertices()
            .filter(|&v| {
                let vertex = self.graph.vertex(v);
                !vertex.is_drawn && !vertex.force_positioned
            })
            .collect();

        for h in hidden {
            let Some(&parent) = self.graph.neighbours(h).first() else {
                continue;
            };
            let p = self.graph.vertex(parent);
            let mut sum = DVec2::ZERO;
            for n in self.graph.drawn_neighbours(parent) {
                sum += direction_or(p.position, self.graph.vertex(n).position, DVec2::ZERO);
            }
            let fallback = direction_or(p.previous_position, p.position, DVec2::X);
            let dir = direction_or(sum, DVec2::ZERO, fallback);
            let parent_position = p.position;

            let vertex = self.graph.vertex_mut(h);
            vertex.previous_position = parent_position;
            vertex.position = parent_position + dir * bl;
            vertex.positioned = true;
            vertex.parent = Some(parent);
        }
    }

    fn update_ring_centers(&mut self) {
        let graph = &self.graph;
        let center_of = |ring: &Ring| centroid(ring.members.iter().map(|&m| graph.vertex(m).position));

        let ids: Vec<_> = self.rings.rings().iter().map(|r| r.id).collect();
        for id in ids {
            if let Some(ring) = self.rings.ring_mut(id) {
                if let Some(c) = center_of(ring) {
                    ring.center = c;
                }
                for sub in &mut ring.subrings {
                    if let Some(c) = center_of(sub) {
                        sub.center = c;
                    }
                }
            }
        }
        for ring in self.rings.original_rings_mut() {
            if let Some(c) = center_of(ring) {
                ring.center = c;
            }
        }
    }

    fn depiction(&self, force_layouts: Vec<ForceLayoutRecord>, report: OverlapReport) -> Depiction {
        let vertices = self
            .graph
            .vertices()
            .map(|v| {
                let vertex = self.graph.vertex(v);
                PositionedVertex {
                    id: v.index(),
                    element: vertex.atom.element.clone(),
                    position: vertex.position.into(),
                    is_drawn: vertex.is_drawn,
                    rings: vertex.rings.clone(),
                    force_positioned: vertex.force_positioned,
                }
            })
            .collect();

        Depiction {
            vertices,
            rings: self.rings.rings().iter().map(RingRecord::from).collect(),
            original_rings: self.rings.original_rings().iter().map(RingRecord::from).collect(),
            ring_connections: self
                .rings
                .connections()
                .iter()
                .map(RingConnectionRecord::from)
                .collect(),
            overlap_score: report.resolved,
            initial_overlap_score: report.initial,
            force_layouts,
        }
    }
}

/// Lays out `graph` with `options` in one call.
pub fn compute_layout(graph: MolGraph, options: &LayoutOptions) -> Result<Depiction, LayoutError> {
    Layout::new(graph, options.clone())?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use crate::bond::Bond;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn methane() -> MolGraph {
        let mut g = MolGraph::new();
        let c = g.add_atom(Atom::new("C"));
        for _ in 0..4 {
            let h = g.add_atom(Atom::new("H"));
            g.add_bond(c, h, Bond::default()).unwrap();
        }
        g
    }

    #[test]
    fn rejects_invalid_options() {
        let opts = LayoutOptions {
            bond_length: -1.0,
            ..LayoutOptions::default()
        };
        assert!(matches!(
            Layout::new(MolGraph::new(), opts),
            Err(LayoutError::InvalidOption { .. })
        ));
    }

    #[test]
    fn empty_graph_gives_empty_depiction() {
        let d = compute_layout(MolGraph::new(), &LayoutOptions::default()).unwrap();
        assert!(d.vertices.is_empty());
        assert!(d.rings.is_empty());
        assert_eq!(d.overlap_score, 0.0);
    }

    #[test]
    fn hydrogens_are_hidden_by_default() {
        let d = compute_layout(methane(), &LayoutOptions::default()).unwrap();
        assert!(d.vertices[0].is_drawn);
        for h in 1..5 {
            assert!(!d.vertices[h].is_drawn);
            let dist = d.position(0).unwrap().distance(d.position(h).unwrap());
            assert!((dist - 30.0).abs() < 1e-9);
        }
    }

    #[test]
    fn explicit_hydrogens_are_drawn() {
        let opts = LayoutOptions {
            explicit_hydrogens: true,
            ..LayoutOptions::default()
        };
        let d = compute_layout(methane(), &opts).unwrap();
        assert!(d.vertices.iter().all(|v| v.is_drawn));
        for h in 2..5 {
            let a = d.position(1).unwrap();
            let b = d.position(h).unwrap();
            assert!(a.distance(b) > 20.0);
        }
    }

    #[test]
    fn molecular_hydrogen_stays_drawn() {
        let mut g = MolGraph::new();
        g.add_atom(Atom::new("H"));
        g.add_atom(Atom::new("H"));
        g.add_bond(n(0), n(1), Bond::default()).unwrap();
        let d = compute_layout(g, &LayoutOptions::default()).unwrap();
        assert!(d.vertices.iter().all(|v| v.is_drawn));
    }

    #[test]
    fn ring_centers_are_member_centroids() {
        let mut g = MolGraph::new();
        for _ in 0..6 {
            g.add_atom(Atom::new("C"));
        }
        for i in 0..6 {
            g.add_bond(n(i), n((i + 1) % 6), Bond::default()).unwrap();
        }
        let d = compute_layout(g, &LayoutOptions::default()).unwrap();
        let ring = &d.rings[0];
        let c: DVec2 = ring.center.into();
        let expected = centroid(ring.members.iter().map(|&m| d.position(m).unwrap())).unwrap();
        assert!(c.distance(expected) < 1e-9);
        assert_eq!(d.original_rings.len(), 1);
    }

    #[test]
    fn rerun_keeps_ring_inventory() {
        let mut g = MolGraph::new();
        for _ in 0..5 {
            g.add_atom(Atom::new("C"));
        }
        for i in 0..5 {
            g.add_bond(n(i), n((i + 1) % 5), Bond::default()).unwrap();
        }
        let mut layout = Layout::new(g, LayoutOptions::default()).unwrap();
        let first = layout.run().unwrap();
        let second = layout.run().unwrap();
        assert_eq!(first.rings.len(), 1);
        assert_eq!(second.rings.len(), 1);
        assert_eq!(layout.graph().vertex(n(0)).rings, vec![0]);
        assert_eq!(first.vertices, second.vertices);
    }
}

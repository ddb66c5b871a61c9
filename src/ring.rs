use std::collections::BTreeSet;

use glam::DVec2;
use petgraph::graph::NodeIndex;

use crate::geometry;
use crate::graph::MolGraph;

pub type RingId = usize;

/// A ring of the depiction: either one perceived SSSR cycle or a synthetic
/// ring standing in for a whole bridged cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    pub id: RingId,
    /// Member vertices in cycle order. For a bridged ring this is the union of
    /// its subrings' members, in ascending order.
    pub members: Vec<NodeIndex>,
    /// Rings sharing at least one vertex with this one.
    pub neighbours: Vec<RingId>,
    pub center: DVec2,
    pub is_bridged: bool,
    pub is_fused: bool,
    pub is_spiro: bool,
    pub is_part_of_bridged: bool,
    /// Whether a substituent placement may mirror this ring.
    pub can_flip: bool,
    pub positioned: bool,
    /// Rings replaced by this one when it is bridged.
    pub subrings: Vec<Ring>,
}

impl Ring {
    pub fn new(id: RingId, members: Vec<NodeIndex>) -> Self {
        Self {
            id,
            members,
            neighbours: Vec::new(),
            center: DVec2::ZERO,
            is_bridged: false,
            is_fused: false,
            is_spiro: false,
            is_part_of_bridged: false,
            can_flip: true,
            positioned: false,
            subrings: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, vertex: NodeIndex) -> bool {
        self.members.contains(&vertex)
    }

    pub fn central_angle(&self) -> f64 {
        geometry::central_angle(self.size())
    }

    /// Members in cycle order starting at `start`, walking away from
    /// `previous` when `previous` is the next member in cycle order.
    ///
    /// Returns the stored order unchanged when `start` is not a member.
    pub fn walk_from(&self, start: NodeIndex, previous: Option<NodeIndex>) -> Vec<NodeIndex> {
        let n = self.members.len();
        let Some(offset) = self.members.iter().position(|&m| m == start) else {
            return self.members.clone();
        };
        let forward_next = self.members[(offset + 1) % n];
        let backwards = n > 2 && previous == Some(forward_next);
        (0..n)
            .map(|k| {
                let i = if backwards {
                    (offset + n - k) % n
                } else {
                    (offset + k) % n
                };
                self.members[i]
            })
            .collect()
    }
}

/// Two rings sharing one or more vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingConnection {
    pub id: usize,
    pub first_ring: RingId,
    pub second_ring: RingId,
    pub vertices: BTreeSet<NodeIndex>,
}

impl RingConnection {
    /// `None` when the rings share no vertex.
    pub fn new(id: usize, first: &Ring, second: &Ring) -> Option<Self> {
        let vertices: BTreeSet<NodeIndex> = first
            .members
            .iter()
            .copied()
            .filter(|v| second.contains(*v))
            .collect();
        if vertices.is_empty() {
            return None;
        }
        Some(Self {
            id,
            first_ring: first.id,
            second_ring: second.id,
            vertices,
        })
    }

    pub fn contains_ring(&self, ring: RingId) -> bool {
        self.first_ring == ring || self.second_ring == ring
    }

    pub fn other(&self, ring: RingId) -> RingId {
        if self.first_ring == ring {
            self.second_ring
        } else {
            self.first_ring
        }
    }

    /// Re-points the end currently at `old` to `new`.
    pub fn update_ring(&mut self, old: RingId, new: RingId) {
        if self.first_ring == old {
            self.first_ring = new;
        } else if self.second_ring == old {
            self.second_ring = new;
        }
    }

    /// The pair of ring ids in ascending order.
    pub fn key(&self) -> (RingId, RingId) {
        (
            self.first_ring.min(self.second_ring),
            self.first_ring.max(self.second_ring),
        )
    }

    /// More than two shared atoms, or a shared atom sitting in more than two
    /// rings.
    pub fn is_bridge(&self, graph: &MolGraph) -> bool {
        self.vertices.len() > 2 || self.vertices.iter().any(|&v| graph.vertex(v).rings.len() > 2)
    }
}

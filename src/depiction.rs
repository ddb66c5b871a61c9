//! Output records handed to the renderer.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::kamada_kawai::KkReport;
use crate::ring::{Ring, RingConnection, RingId};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl From<DVec2> for Point {
    fn from(v: DVec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Point> for DVec2 {
    fn from(p: Point) -> Self {
        DVec2::new(p.x, p.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedVertex {
    pub id: usize,
    pub element: String,
    pub position: Point,
    pub is_drawn: bool,
    pub rings: Vec<RingId>,
    pub force_positioned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RingRecord {
    pub id: RingId,
    /// Member vertex ids in cycle order.
    pub members: Vec<usize>,
    pub neighbours: Vec<RingId>,
    pub is_bridged: bool,
    pub is_fused: bool,
    pub is_spiro: bool,
    pub is_part_of_bridged: bool,
    pub center: Point,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subrings: Vec<RingId>,
}

impl From<&Ring> for RingRecord {
    fn from(ring: &Ring) -> Self {
        Self {
            id: ring.id,
            members: ring.members.iter().map(|m| m.index()).collect(),
            neighbours: ring.neighbours.clone(),
            is_bridged: ring.is_bridged,
            is_fused: ring.is_fused,
            is_spiro: ring.is_spiro,
            is_part_of_bridged: ring.is_part_of_bridged,
            center: ring.center.into(),
            subrings: ring.subrings.iter().map(|r| r.id).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RingConnectionRecord {
    pub id: usize,
    pub first_ring_id: RingId,
    pub second_ring_id: RingId,
    pub shared_vertices: Vec<usize>,
}

impl From<&RingConnection> for RingConnectionRecord {
    fn from(c: &RingConnection) -> Self {
        Self {
            id: c.id,
            first_ring_id: c.first_ring,
            second_ring_id: c.second_ring,
            shared_vertices: c.vertices.iter().map(|v| v.index()).collect(),
        }
    }
}

/// Outcome of one force-directed layout of a bridged ring.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceLayoutRecord {
    pub ring_id: RingId,
    pub iterations: usize,
    pub max_residual: f64,
    pub converged: bool,
}

impl ForceLayoutRecord {
    pub fn new(ring_id: RingId, report: &KkReport) -> Self {
        Self {
            ring_id,
            iterations: report.iterations,
            max_residual: report.max_residual,
            converged: report.converged,
        }
    }
}

/// A fully positioned molecule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Depiction {
    pub vertices: Vec<PositionedVertex>,
    /// Active rings, bridged clusters collapsed.
    pub rings: Vec<RingRecord>,
    /// Perceived rings before any bridged collapse.
    pub original_rings: Vec<RingRecord>,
    pub ring_connections: Vec<RingConnectionRecord>,
    /// Total overlap score after resolution. Lower is better.
    pub overlap_score: f64,
    pub initial_overlap_score: f64,
    pub force_layouts: Vec<ForceLayoutRecord>,
}

impl Depiction {
    pub fn position(&self, id: usize) -> Option<DVec2> {
        self.vertices.get(id).map(|v| v.position.into())
    }

    pub fn ring(&self, id: RingId) -> Option<&RingRecord> {
        self.rings.iter().find(|r| r.id == id)
    }

    pub fn bridged_rings(&self) -> impl Iterator<Item = &RingRecord> {
        self.rings.iter().filter(|r| r.is_bridged)
    }
}

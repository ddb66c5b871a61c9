//! Atom and bond records handed over by the notation parser.

use std::collections::HashSet;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::atom::Atom;
use crate::bond::{Bond, BondOrder, BondStereo};
use crate::depiction::Point;
use crate::error::LayoutError;
use crate::graph::MolGraph;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondRef {
    pub target_id: usize,
    #[serde(default)]
    pub order: BondOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomRecord {
    pub id: usize,
    pub element: String,
    #[serde(default)]
    pub bonds: Vec<BondRef>,
    #[serde(default)]
    pub ring_membership_seed: Vec<u16>,
    /// Only honoured together with `pinned`.
    #[serde(default)]
    pub position: Option<Point>,
    #[serde(default)]
    pub pinned: bool,
}

impl AtomRecord {
    pub fn new(id: usize, element: impl Into<String>) -> Self {
        Self {
            id,
            element: element.into(),
            bonds: Vec::new(),
            ring_membership_seed: Vec::new(),
            position: None,
            pinned: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondRecord {
    pub id: usize,
    pub source_id: usize,
    pub target_id: usize,
    #[serde(default)]
    pub bond_type: BondOrder,
    #[serde(default)]
    pub stereo: BondStereo,
}

impl BondRecord {
    pub fn new(id: usize, source_id: usize, target_id: usize, bond_type: BondOrder) -> Self {
        Self {
            id,
            source_id,
            target_id,
            bond_type,
            stereo: BondStereo::None,
        }
    }
}

impl MolGraph {
    /// Builds the layout graph from parser records.
    ///
    /// Atom ids must be `0..atoms.len()` in order. Every bond an atom lists
    /// must be present in `bonds`; atoms may leave their own list empty.
    pub fn from_records(atoms: &[AtomRecord], bonds: &[BondRecord]) -> Result<Self, LayoutError> {
        let mut graph = MolGraph::new();
        for (expected, record) in atoms.iter().enumerate() {
            if record.id != expected {
                return Err(LayoutError::NonDenseAtomId {
                    expected,
                    found: record.id,
                });
            }
            let idx = graph.add_atom(Atom {
                element: record.element.clone(),
                ring_membership_seed: record.ring_membership_seed.clone(),
            });
            if record.pinned {
                if let Some(p) = record.position {
                    graph.vertex_mut(idx).pin(p.into());
                }
            }
        }

        let n = atoms.len();
        let mut pairs = HashSet::new();
        for record in bonds {
            for end in [record.source_id, record.target_id] {
                if end >= n {
                    return Err(LayoutError::UnknownVertex(end));
                }
            }
            if record.source_id == record.target_id {
                return Err(LayoutError::SelfLoop {
                    bond: record.id,
                    atom: record.source_id,
                });
            }
            graph.add_bond(
                NodeIndex::new(record.source_id),
                NodeIndex::new(record.target_id),
                Bond {
                    order: record.bond_type,
                    stereo: record.stereo,
                },
            )?;
            pairs.insert(ordered(record.source_id, record.target_id));
        }

        for atom in atoms {
            for bond in &atom.bonds {
                if !pairs.contains(&ordered(atom.id, bond.target_id)) {
                    return Err(LayoutError::InconsistentBonds {
                        atom: atom.id,
                        target: bond.target_id,
                    });
                }
            }
        }

        Ok(graph)
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

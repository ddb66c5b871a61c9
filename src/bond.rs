use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BondOrder {
    #[default]
    Single,
    Double,
    Triple,
    Aromatic,
}

/// Directional marker on a single bond adjacent to a stereogenic double
/// bond (`/` and `\` in SMILES). Such bonds define E/Z geometry and are
/// never rotated by the overlap resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BondStereo {
    #[default]
    None,
    Up,
    Down,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bond {
    pub order: BondOrder,
    pub stereo: BondStereo,
}

impl Bond {
    pub fn new(order: BondOrder) -> Self {
        Self {
            order,
            stereo: BondStereo::None,
        }
    }

    pub fn is_stereo(&self) -> bool {
        self.stereo != BondStereo::None
    }
}

/// Edge payload of the layout graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Edge {
    pub bond: Bond,
    /// Set once the graph's ring bonds are known: `true` when the bond lies
    /// on at least one cycle.
    pub in_ring: bool,
}

impl Edge {
    pub fn new(bond: Bond) -> Self {
        Self {
            bond,
            in_ring: false,
        }
    }

    pub fn order(&self) -> BondOrder {
        self.bond.order
    }
}

use glam::DVec2;

use crate::ring::RingId;

/// Intrinsic atom data handed over by the notation parser.
///
/// `Atom` stores only what can be read off the input: the element symbol and
/// the ring-closure digits the parser saw on this atom. Layout state lives in
/// [`Vertex`].
///
/// # Examples
///
/// ```
/// use chemdepict::Atom;
///
/// let nitrogen = Atom::new("N");
/// assert!(!nitrogen.is_carbon());
/// assert!(Atom::new("H").is_hydrogen());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Atom {
    /// Element symbol (`"C"`, `"N"`, `"Cl"`, …).
    pub element: String,
    /// Ring-closure digits attached to this atom by the parser.
    ///
    /// Advisory only. Ring membership is always recomputed from connectivity;
    /// the seed is compared against the result for diagnostics.
    pub ring_membership_seed: Vec<u16>,
}

impl Atom {
    pub fn new(element: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            ring_membership_seed: Vec::new(),
        }
    }

    pub fn is_hydrogen(&self) -> bool {
        self.element == "H"
    }

    pub fn is_carbon(&self) -> bool {
        self.element == "C"
    }
}

/// Node payload of the layout graph: an [`Atom`] plus everything the layout
/// stages read and write.
///
/// Created once per atom and never removed during a layout pass. Positions
/// are only meaningful once `positioned` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub atom: Atom,
    pub position: DVec2,
    /// Position of the vertex this one was placed from; defines the incoming
    /// bond direction.
    pub previous_position: DVec2,
    /// Branch angle assigned by the parent during placement, relative to the
    /// parent's incoming direction.
    pub angle: f64,
    pub positioned: bool,
    /// Pinned: never moved by a later pass.
    pub force_positioned: bool,
    pub is_drawn: bool,
    /// Active rings this vertex belongs to.
    pub rings: Vec<RingId>,
    /// Synthetic bridged ring containing this vertex, if any.
    pub bridged_ring: Option<RingId>,
    /// Vertex this one was placed from.
    pub parent: Option<petgraph::graph::NodeIndex>,
}

impl Vertex {
    pub fn new(atom: Atom) -> Self {
        Self {
            atom,
            position: DVec2::ZERO,
            previous_position: DVec2::ZERO,
            angle: 0.0,
            positioned: false,
            force_positioned: false,
            is_drawn: true,
            rings: Vec::new(),
            bridged_ring: None,
            parent: None,
        }
    }

    /// Absolute angle of the incoming bond.
    pub fn incoming_angle(&self) -> f64 {
        let d = self.position - self.previous_position;
        d.y.atan2(d.x)
    }

    /// Fixes the vertex at `position` so that no stage moves it again.
    pub fn pin(&mut self, position: DVec2) {
        self.position = position;
        self.previous_position = position;
        self.positioned = true;
        self.force_positioned = true;
    }

    pub fn in_ring(&self) -> bool {
        !self.rings.is_empty()
    }

    pub fn shares_ring_with(&self, other: &Vertex) -> bool {
        self.rings.iter().any(|r| other.rings.contains(r))
    }
}

//! Error type for the layout pipeline.
//!
//! Only contract violations are reported here: malformed input records,
//! inconsistent matrices, empty vertex subsets and invalid options. Data
//! anomalies such as disconnected graphs or a force layout that does not
//! converge are handled algorithmically and never surface as errors.

use thiserror::Error;

use crate::ring::RingId;

/// Errors that can occur while building a [`MolGraph`](crate::MolGraph) or
/// running the layout pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// An adjacency matrix row does not have as many entries as there are rows.
    #[error("adjacency matrix is not square: row {row} has {len} entries, expected {expected}")]
    NonSquareMatrix {
        /// Offending row.
        row: usize,
        /// Number of entries in that row.
        len: usize,
        /// Number of rows in the matrix.
        expected: usize,
    },

    /// The force-directed layout was asked to position an empty vertex set.
    #[error("force-directed layout requires at least one vertex")]
    EmptyVertexSubset,

    /// A vertex index does not exist in the graph.
    #[error("vertex {0} does not exist")]
    UnknownVertex(usize),

    /// A ring id does not refer to an active ring.
    #[error("ring {0} does not exist")]
    UnknownRing(RingId),

    /// A bond connects an atom to itself.
    #[error("bond {bond} connects atom {atom} to itself")]
    SelfLoop {
        /// Bond record id.
        bond: usize,
        /// Atom id.
        atom: usize,
    },

    /// Two bonds connect the same pair of atoms.
    #[error("duplicate bond between atoms {a} and {b}")]
    DuplicateBond {
        /// First atom id.
        a: usize,
        /// Second atom id.
        b: usize,
    },

    /// Atom record ids must be `0..n` in order.
    #[error("atom ids must be dense and ordered: expected id {expected}, found {found}")]
    NonDenseAtomId {
        /// The id expected at this position.
        expected: usize,
        /// The id actually found.
        found: usize,
    },

    /// An atom lists a bond that the bond list does not contain.
    #[error("atom {atom} lists a bond to {target} that is missing from the bond list")]
    InconsistentBonds {
        /// Atom id declaring the bond.
        atom: usize,
        /// Declared bond partner.
        target: usize,
    },

    /// A layout option has an unusable value.
    #[error("invalid layout option `{name}`: {detail}")]
    InvalidOption {
        /// Option name.
        name: &'static str,
        /// What is wrong with the value.
        detail: String,
    },
}

impl LayoutError {
    pub(crate) fn invalid_option(name: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidOption {
            name,
            detail: detail.into(),
        }
    }
}

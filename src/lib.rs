pub mod atom;
pub mod bond;
pub mod depiction;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod input;
pub mod kamada_kawai;
pub mod layout;
pub mod options;
pub mod overlap;
mod position;
pub mod ring;
pub mod ring_system;
pub mod rings;

pub use atom::{Atom, Vertex};
pub use bond::{Bond, BondOrder, BondStereo, Edge};
pub use depiction::{
    Depiction, ForceLayoutRecord, Point, PositionedVertex, RingConnectionRecord, RingRecord,
};
pub use error::LayoutError;
pub use graph::{connected_components, floyd_warshall, AdjacencyMatrix, DistanceMatrix, MolGraph};
pub use input::{AtomRecord, BondRecord, BondRef};
pub use kamada_kawai::KkReport;
pub use layout::{compute_layout, Layout};
pub use options::{ForceLayoutOptions, LayoutOptions};
pub use overlap::{OverlapReport, OverlapScore};
pub use ring::{Ring, RingConnection, RingId};
pub use ring_system::RingSystem;
pub use rings::RingInfo;

use std::collections::BTreeSet;

use serde::Deserialize;

use chemdepict::{Atom, Bond, BondOrder, LayoutOptions, MolGraph, RingInfo, RingSystem};
use petgraph::graph::NodeIndex;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn order(code: u8) -> BondOrder {
    match code {
        2 => BondOrder::Double,
        3 => BondOrder::Triple,
        4 => BondOrder::Aromatic,
        _ => BondOrder::Single,
    }
}

fn build(elements: &[String], bonds: &[(usize, usize, BondOrder)]) -> MolGraph {
    let mut graph = MolGraph::new();
    for e in elements {
        graph.add_atom(Atom::new(e.as_str()));
    }
    for &(a, b, o) in bonds {
        graph
            .add_bond(NodeIndex::new(a), NodeIndex::new(b), Bond::new(o))
            .unwrap();
    }
    graph
}

fn ring_bond_set(ring: &[NodeIndex]) -> BTreeSet<(usize, usize)> {
    (0..ring.len())
        .map(|i| {
            let (a, b) = (ring[i].index(), ring[(i + 1) % ring.len()].index());
            (a.min(b), a.max(b))
        })
        .collect()
}

/// Indices of rings whose bond set is the symmetric difference of some
/// subset of the other rings.
fn dependent_rings(rings: &[Vec<NodeIndex>]) -> Vec<usize> {
    let sets: Vec<_> = rings.iter().map(|r| ring_bond_set(r)).collect();
    let mut dependent = Vec::new();
    for (k, ring) in sets.iter().enumerate() {
        let others: Vec<_> = sets.iter().enumerate().filter(|&(i, _)| i != k).map(|(_, s)| s).collect();
        let hit = (1u32..(1 << others.len())).any(|mask| {
            let xor = others
                .iter()
                .enumerate()
                .filter(|&(bit, _)| mask & (1 << bit) != 0)
                .fold(BTreeSet::new(), |acc, (_, s)| acc.symmetric_difference(s).copied().collect());
            &xor == ring
        });
        if hit {
            dependent.push(k);
        }
    }
    dependent
}

// ---------------------------------------------------------------------------
// 1. Ring perception and classification
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RingEntry {
    name: String,
    atoms: usize,
    bonds: Vec<(usize, usize)>,
    ring_sizes: Vec<usize>,
    active_rings: usize,
    fused: usize,
    spiro: usize,
    bridged: usize,
}

#[test]
fn approval_rings() {
    let data: Vec<RingEntry> =
        serde_json::from_str(include_str!("approval_data/rings.json")).unwrap();

    let mut failures = Vec::new();
    for entry in &data {
        let elements = vec!["C".to_string(); entry.atoms];
        let bonds: Vec<_> = entry
            .bonds
            .iter()
            .map(|&(a, b)| (a, b, BondOrder::Single))
            .collect();
        let mut graph = build(&elements, &bonds);

        let info = RingInfo::sssr(&graph);
        let mut sizes: Vec<usize> = info.rings().iter().map(|r| r.len()).collect();
        sizes.sort_unstable();
        if sizes != entry.ring_sizes {
            failures.push(format!(
                "[sssr] {}: expected sizes {:?}, got {:?}",
                entry.name, entry.ring_sizes, sizes
            ));
        }
        for ring in info.rings() {
            for (i, &a) in ring.iter().enumerate() {
                let b = ring[(i + 1) % ring.len()];
                if graph.bond_between(a, b).is_none() {
                    failures.push(format!(
                        "[sssr] {}: ring {:?} is not in cycle order at {}-{}",
                        entry.name,
                        ring,
                        a.index(),
                        b.index()
                    ));
                }
            }
        }

        // cycle rank of the ring bonds; cage counts may exceed it
        let ring_bonds = graph.mark_ring_bonds();
        let systems: Vec<Vec<usize>> =
            chemdepict::connected_components(&graph.ring_adjacency_matrix())
                .unwrap()
                .into_iter()
                .filter(|c| c.len() > 1)
                .collect();
        let ring_atoms: usize = systems.iter().map(|c| c.len()).sum();
        let rank = ring_bonds + systems.len() - ring_atoms;

        for e in graph.edges() {
            let (a, b) = graph.edge_endpoints(e).unwrap();
            if graph.edge(e).in_ring && !info.is_ring_bond(a, b) {
                failures.push(format!(
                    "[sssr] {}: ring bond {}-{} lies on no ring",
                    entry.name,
                    a.index(),
                    b.index()
                ));
            }
        }
        if info.num_rings() <= rank {
            for k in dependent_rings(info.rings()) {
                failures.push(format!(
                    "[sssr] {}: ring {:?} is a sum of the other rings",
                    entry.name,
                    info.rings()[k]
                ));
            }
        }

        let system = match RingSystem::build(&mut graph, info.into_rings()) {
            Ok(s) => s,
            Err(e) => {
                failures.push(format!("[rings] {}: {e}", entry.name));
                continue;
            }
        };
        let rings = system.rings();
        let count = |f: fn(&chemdepict::Ring) -> bool| rings.iter().filter(|r| f(r)).count();
        let got = (
            rings.len(),
            count(|r| r.is_fused),
            count(|r| r.is_spiro),
            count(|r| r.is_bridged),
        );
        let expected = (entry.active_rings, entry.fused, entry.spiro, entry.bridged);
        if got != expected {
            failures.push(format!(
                "[rings] {}: expected (active, fused, spiro, bridged) = {:?}, got {:?}",
                entry.name, expected, got
            ));
        }
    }

    if !failures.is_empty() {
        panic!(
            "{} ring approval failures:\n{}",
            failures.len(),
            failures.join("\n")
        );
    }
}

// ---------------------------------------------------------------------------
// 2. Full layout
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct LayoutEntry {
    name: String,
    elements: Vec<String>,
    bonds: Vec<(usize, usize, u8)>,
    active_rings: usize,
    force_layouts: usize,
}

#[test]
fn approval_layout() {
    let data: Vec<LayoutEntry> =
        serde_json::from_str(include_str!("approval_data/layout.json")).unwrap();
    let opts = LayoutOptions::default();
    let bl = opts.bond_length;

    let mut failures = Vec::new();
    for entry in &data {
        let bonds: Vec<_> = entry.bonds.iter().map(|&(a, b, o)| (a, b, order(o))).collect();
        let graph = build(&entry.elements, &bonds);
        let depiction = match chemdepict::compute_layout(graph, &opts) {
            Ok(d) => d,
            Err(e) => {
                failures.push(format!("[layout] {}: {e}", entry.name));
                continue;
            }
        };

        if depiction.rings.len() != entry.active_rings {
            failures.push(format!(
                "[layout] {}: expected {} rings, got {}",
                entry.name,
                entry.active_rings,
                depiction.rings.len()
            ));
        }
        if depiction.force_layouts.len() != entry.force_layouts {
            failures.push(format!(
                "[layout] {}: expected {} force layouts, got {}",
                entry.name,
                entry.force_layouts,
                depiction.force_layouts.len()
            ));
        }
        if depiction.overlap_score > depiction.initial_overlap_score {
            failures.push(format!(
                "[overlap] {}: score rose from {} to {}",
                entry.name, depiction.initial_overlap_score, depiction.overlap_score
            ));
        }

        for v in &depiction.vertices {
            if !v.position.x.is_finite() || !v.position.y.is_finite() {
                failures.push(format!("[layout] {}: vertex {} is not finite", entry.name, v.id));
            }
        }

        for &(a, b, _) in &bonds {
            let (va, vb) = (&depiction.vertices[a], &depiction.vertices[b]);
            if va.force_positioned && vb.force_positioned {
                continue;
            }
            let d = depiction.position(a).unwrap().distance(depiction.position(b).unwrap());
            if (d - bl).abs() > 1e-6 {
                failures.push(format!(
                    "[bond length] {}: {}-{} is {:.4}, expected {}",
                    entry.name, a, b, d, bl
                ));
            }
        }

        let drawn: Vec<_> = depiction.vertices.iter().filter(|v| v.is_drawn).collect();
        for (i, a) in drawn.iter().enumerate() {
            for b in &drawn[i + 1..] {
                let d = depiction
                    .position(a.id)
                    .unwrap()
                    .distance(depiction.position(b.id).unwrap());
                if d < 1.0 {
                    failures.push(format!(
                        "[collision] {}: {} and {} are {:.4} apart",
                        entry.name, a.id, b.id, d
                    ));
                }
            }
        }
    }

    if !failures.is_empty() {
        panic!(
            "{} layout approval failures:\n{}",
            failures.len(),
            failures.join("\n")
        );
    }
}

use std::collections::{BTreeSet, HashSet};

use petgraph::graph::NodeIndex;

use crate::error::LayoutError;
use crate::graph::{check_square, connected_components, AdjacencyMatrix, DistanceMatrix, MolGraph};

/// Smallest set of smallest rings, one list per ring in cycle order.
#[derive(Debug, Clone, Default)]
pub struct RingInfo {
    rings: Vec<Vec<NodeIndex>>,
    expected: usize,
    accepted: usize,
}

impl RingInfo {
    /// Perceives the rings of `graph`, one ring system at a time. Bonds that
    /// are not on any cycle are ignored.
    pub fn sssr(graph: &MolGraph) -> Self {
        perceive(&graph.ring_adjacency_matrix())
    }

    /// Like [`sssr`](Self::sssr) but on a bare adjacency matrix, which must be
    /// square.
    pub fn from_adjacency(adjacency: &AdjacencyMatrix) -> Result<Self, LayoutError> {
        check_square(adjacency)?;
        Ok(perceive(adjacency))
    }

    pub fn num_rings(&self) -> usize {
        self.rings.len()
    }

    pub fn rings(&self) -> &[Vec<NodeIndex>] {
        &self.rings
    }

    pub fn into_rings(self) -> Vec<Vec<NodeIndex>> {
        self.rings
    }

    /// Theoretical ring count summed over all components.
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Rings accepted by the greedy selection before the result was cut down
    /// to the theoretical ring count.
    pub fn accepted_before_truncation(&self) -> usize {
        self.accepted
    }

    pub fn is_ring_atom(&self, atom: NodeIndex) -> bool {
        self.rings.iter().any(|ring| ring.contains(&atom))
    }

    /// Whether `a`-`b` is a consecutive pair of some perceived ring, the
    /// closing pair included.
    pub fn is_ring_bond(&self, a: NodeIndex, b: NodeIndex) -> bool {
        let key = normalized(a.index(), b.index());
        self.rings.iter().any(|ring| ring_bonds(ring).contains(&key))
    }
}

type PathBond = (usize, usize);
type Path = Vec<PathBond>;
type PathMatrix = Vec<Vec<Vec<Path>>>;

fn perceive(adjacency: &AdjacencyMatrix) -> RingInfo {
    let mut info = RingInfo::default();
    // square by contract of both callers
    let Ok(components) = connected_components(adjacency) else {
        return info;
    };

    for component in components {
        if component.len() < 3 {
            continue;
        }
        let local = induced(adjacency, &component);
        let n = local.len();
        let degrees: Vec<usize> = local.iter().map(|row| row.iter().filter(|&&b| b).count()).collect();
        let edges = degrees.iter().sum::<usize>() / 2;

        let mut expected = edges as i64 - n as i64 + 1;
        if degrees.iter().all(|&d| d == 3) {
            expected = 2 + edges as i64 - n as i64;
        }
        if expected <= 0 {
            continue;
        }
        let expected = expected as usize;
        info.expected += expected;

        if expected == 1 {
            let atoms: BTreeSet<usize> = (0..n).collect();
            info.rings.push(to_global(&cycle_order(&atoms, &local), &component));
            info.accepted += 1;
            continue;
        }

        let matrices = PathMatrices::new(&local);
        let candidates = matrices.candidates();
        let selected = select(&candidates, &matrices, &local, &degrees, expected);
        log::trace!(
            "component of {} atoms: {} candidates, {} rings accepted, {} expected",
            n,
            candidates.len(),
            selected.len(),
            expected
        );
        info.accepted += selected.len();
        for atoms in selected.into_iter().take(expected) {
            info.rings.push(to_global(&cycle_order(&atoms, &local), &component));
        }
    }

    info
}

fn induced(adjacency: &AdjacencyMatrix, vertices: &[usize]) -> AdjacencyMatrix {
    vertices
        .iter()
        .map(|&a| vertices.iter().map(|&b| adjacency[a][b]).collect())
        .collect()
}

fn to_global(local: &[usize], component: &[usize]) -> Vec<NodeIndex> {
    local.iter().map(|&i| NodeIndex::new(component[i])).collect()
}

/// Distances plus every shortest path (`pe`) and every path one bond longer
/// (`pe_prime`) between each pair, as explicit bond lists.
struct PathMatrices {
    dist: DistanceMatrix,
    pe: PathMatrix,
    pe_prime: PathMatrix,
}

impl PathMatrices {
    fn new(adjacency: &AdjacencyMatrix) -> Self {
        let n = adjacency.len();
        let mut dist = vec![vec![None; n]; n];
        let mut pe: PathMatrix = vec![vec![Vec::new(); n]; n];
        let mut pe_prime: PathMatrix = vec![vec![Vec::new(); n]; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    dist[i][j] = Some(0);
                } else if adjacency[i][j] {
                    dist[i][j] = Some(1);
                    pe[i][j].push(vec![(i, j)]);
                }
            }
        }

        for k in (0..n).rev() {
            for i in (0..n).rev() {
                for j in (0..n).rev() {
                    let (Some(ik), Some(kj)) = (dist[i][k], dist[k][j]) else {
                        continue;
                    };
                    let via = ik + kj;
                    match dist[i][j] {
                        Some(cur) if cur == via => {
                            if !pe[i][k].is_empty() && !pe[k][j].is_empty() {
                                let path = join_first(&pe[i][k], &pe[k][j]);
                                push_unique(&mut pe[i][j], path);
                            }
                        }
                        Some(cur) if cur + 1 == via => {
                            if !pe[i][k].is_empty() && !pe[k][j].is_empty() {
                                let path = join_first(&pe[i][k], &pe[k][j]);
                                push_unique(&mut pe_prime[i][j], path);
                            }
                        }
                        Some(cur) if cur < via => {}
                        cur => {
                            pe_prime[i][j] = if cur == Some(via + 1) {
                                pe[i][j].clone()
                            } else {
                                Vec::new()
                            };
                            let path = join_first(&pe[i][k], &pe[k][j]);
                            dist[i][j] = Some(via);
                            pe[i][j] = vec![path];
                        }
                    }
                }
            }
        }

        Self { dist, pe, pe_prime }
    }

    /// Ring candidates sorted by ring size; equal sizes keep pair order.
    ///
    /// Each pair yields at most one candidate: odd when a one-longer path
    /// exists, even otherwise.
    fn candidates(&self) -> Vec<Candidate> {
        let n = self.dist.len();
        let mut out = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let Some(d) = self.dist[i][j] else { continue };
                if d == 0 {
                    continue;
                }
                if !self.pe_prime[i][j].is_empty() {
                    out.push(Candidate {
                        size: 2 * d + 1,
                        i,
                        j,
                        kind: CandidateKind::Odd,
                    });
                } else if self.pe[i][j].len() > 1 {
                    out.push(Candidate {
                        size: 2 * d,
                        i,
                        j,
                        kind: CandidateKind::Even,
                    });
                }
            }
        }
        out.sort_by_key(|c| c.size);
        out
    }

    /// Closed bond walks described by a candidate.
    fn cycles(&self, c: &Candidate) -> Vec<Path> {
        let shortest = &self.pe[c.i][c.j];
        match c.kind {
            CandidateKind::Odd => {
                let Some(first) = shortest.first() else {
                    return Vec::new();
                };
                self.pe_prime[c.i][c.j]
                    .iter()
                    .map(|ext| first.iter().chain(ext).copied().collect())
                    .collect()
            }
            CandidateKind::Even => shortest
                .windows(2)
                .map(|w| w[0].iter().chain(&w[1]).copied().collect())
                .collect(),
        }
    }
}

fn join_first(a: &[Path], b: &[Path]) -> Path {
    a.first()
        .into_iter()
        .chain(b.first())
        .flatten()
        .copied()
        .collect()
}

fn path_key(path: &Path) -> Vec<PathBond> {
    let mut key: Vec<PathBond> = path.iter().map(|&(a, b)| normalized(a, b)).collect();
    key.sort_unstable();
    key
}

fn push_unique(set: &mut Vec<Path>, path: Path) {
    let key = path_key(&path);
    if !set.iter().any(|p| path_key(p) == key) {
        set.push(path);
    }
}

fn normalized(a: usize, b: usize) -> PathBond {
    (a.min(b), a.max(b))
}

/// Bonds of a ring given in cycle order.
fn ring_bonds(ring: &[NodeIndex]) -> BTreeSet<PathBond> {
    let len = ring.len();
    (0..len)
        .map(|i| normalized(ring[i].index(), ring[(i + 1) % len].index()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateKind {
    /// Two distinct shortest paths: ring size `2d`.
    Even,
    /// A shortest and a one-longer path: ring size `2d + 1`.
    Odd,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    size: u32,
    i: usize,
    j: usize,
    kind: CandidateKind,
}

/// Greedy selection. Stops as soon as one ring more than `expected` has been
/// accepted; the caller truncates.
fn select(
    candidates: &[Candidate],
    matrices: &PathMatrices,
    adjacency: &AdjacencyMatrix,
    degrees: &[usize],
    expected: usize,
) -> Vec<BTreeSet<usize>> {
    let mut accepted: Vec<BTreeSet<usize>> = Vec::new();
    let mut all_bonds: HashSet<PathBond> = HashSet::new();
    let mut ring_count = vec![0usize; adjacency.len()];

    for candidate in candidates {
        for bonds in matrices.cycles(candidate) {
            let atoms: BTreeSet<usize> = bonds.iter().flat_map(|&(a, b)| [a, b]).collect();
            if induced_bond_count(&atoms, adjacency) == atoms.len()
                && !is_redundant(&accepted, &atoms, &bonds, &all_bonds, degrees, &mut ring_count)
            {
                log::trace!("accepted ring candidate {:?}", atoms);
                all_bonds.extend(bonds.iter().map(|&(a, b)| normalized(a, b)));
                accepted.push(atoms);
            }
            if accepted.len() > expected {
                return accepted;
            }
        }
    }
    accepted
}

fn induced_bond_count(atoms: &BTreeSet<usize>, adjacency: &AdjacencyMatrix) -> usize {
    let atoms: Vec<usize> = atoms.iter().copied().collect();
    let mut count = 0;
    for (x, &a) in atoms.iter().enumerate() {
        for &b in &atoms[x + 1..] {
            if adjacency[a][b] {
                count += 1;
            }
        }
    }
    count
}

/// A candidate is redundant when it contains an accepted ring, or when all of
/// its bonds are already covered and none of its atoms still has fewer rings
/// than bonds. Updates `ring_count` for non-redundant candidates.
fn is_redundant(
    accepted: &[BTreeSet<usize>],
    atoms: &BTreeSet<usize>,
    bonds: &Path,
    all_bonds: &HashSet<PathBond>,
    degrees: &[usize],
    ring_count: &mut [usize],
) -> bool {
    if accepted.iter().rev().any(|ring| atoms.is_superset(ring)) {
        return true;
    }

    let all_contained = !bonds.is_empty()
        && bonds
            .iter()
            .all(|&(a, b)| all_bonds.contains(&normalized(a, b)));
    if all_contained && !atoms.iter().any(|&a| ring_count[a] < degrees[a]) {
        return true;
    }

    for &a in atoms {
        ring_count[a] += 1;
    }
    false
}

/// Orders a simple cycle by walking from its lowest vertex, always to the
/// lowest unvisited neighbour.
fn cycle_order(atoms: &BTreeSet<usize>, adjacency: &AdjacencyMatrix) -> Vec<usize> {
    let Some(&start) = atoms.first() else {
        return Vec::new();
    };
    let mut order = vec![start];
    let mut visited = BTreeSet::from([start]);
    let mut current = start;
    while let Some(next) = atoms
        .iter()
        .copied()
        .find(|&a| !visited.contains(&a) && adjacency[current][a])
    {
        visited.insert(next);
        order.push(next);
        current = next;
    }
    order.extend(atoms.iter().copied().filter(|a| !visited.contains(a)));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use crate::bond::Bond;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn from_edges(atoms: usize, edges: &[(usize, usize)]) -> MolGraph {
        let mut g = MolGraph::new();
        for _ in 0..atoms {
            g.add_atom(Atom::new("C"));
        }
        for &(a, b) in edges {
            g.add_bond(n(a), n(b), Bond::default()).unwrap();
        }
        g
    }

    fn cycle(len: usize) -> Vec<(usize, usize)> {
        (0..len).map(|i| (i, (i + 1) % len)).collect()
    }

    fn sizes(ri: &RingInfo) -> Vec<usize> {
        let mut s: Vec<usize> = ri.rings().iter().map(|r| r.len()).collect();
        s.sort();
        s
    }

    fn assert_cycle_order(g: &MolGraph, ring: &[NodeIndex]) {
        let len = ring.len();
        for i in 0..len {
            let (a, b) = (ring[i], ring[(i + 1) % len]);
            assert!(g.bond_between(a, b).is_some(), "{a:?}-{b:?} not bonded in {ring:?}");
        }
    }

    const NAPHTHALENE: &[(usize, usize)] = &[
        (0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 6), (6, 7), (7, 8), (8, 3), (8, 9), (9, 0),
    ];

    const ADAMANTANE: &[(usize, usize)] = &[
        (0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0), (5, 6), (6, 7), (7, 8), (8, 1), (7, 9),
        (9, 3),
    ];

    const CUBANE: &[(usize, usize)] = &[
        (0, 1), (1, 2), (2, 3), (3, 0), (4, 5), (5, 6), (6, 7), (7, 4), (0, 4), (1, 5), (2, 6),
        (3, 7),
    ];

    const BICYCLO_222_OCTANE: &[(usize, usize)] = &[
        (0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0), (5, 6), (6, 7), (7, 2),
    ];

    // norbornane with a benzo ring on the 0-1 bond
    const BENZONORBORNENE: &[(usize, usize)] = &[
        (0, 1), (1, 2), (2, 3), (3, 4), (4, 0), (4, 5), (5, 6), (6, 2), (0, 7), (7, 8), (8, 9),
        (9, 10), (10, 1),
    ];

    /// Every bond on a cycle lies on a perceived ring, and, as long as the
    /// ring count does not exceed the cycle rank, no ring is the symmetric
    /// difference of other rings.
    fn assert_ring_basis(g: &MolGraph, ri: &RingInfo) {
        let mut g = g.clone();
        g.mark_ring_bonds();
        let mut ring_edges = 0;
        for e in g.edges() {
            if !g.edge(e).in_ring {
                continue;
            }
            ring_edges += 1;
            let (a, b) = g.edge_endpoints(e).unwrap();
            assert!(ri.is_ring_bond(a, b), "ring bond {a:?}-{b:?} is on no ring of {:?}", ri.rings());
        }

        let components = connected_components(&g.ring_adjacency_matrix()).unwrap();
        let ring_systems: Vec<&Vec<usize>> = components.iter().filter(|c| c.len() > 1).collect();
        let ring_atoms: usize = ring_systems.iter().map(|c| c.len()).sum();
        let rank = ring_edges + ring_systems.len() - ring_atoms;
        // the all-degree-3 count of cage graphs exceeds the rank on purpose
        if ri.num_rings() > rank {
            return;
        }

        let sets: Vec<BTreeSet<PathBond>> = ri.rings().iter().map(|r| ring_bonds(r)).collect();
        for (k, ring) in sets.iter().enumerate() {
            let others: Vec<&BTreeSet<PathBond>> =
                sets.iter().enumerate().filter(|&(i, _)| i != k).map(|(_, s)| s).collect();
            for mask in 1u32..(1 << others.len()) {
                let mut xor = BTreeSet::new();
                for (bit, other) in others.iter().enumerate() {
                    if mask & (1 << bit) != 0 {
                        xor = xor.symmetric_difference(other).copied().collect();
                    }
                }
                assert_ne!(&xor, ring, "ring {k} of {:?} depends on the others", ri.rings());
            }
        }
    }

    #[test]
    fn cyclohexane() {
        let g = from_edges(6, &cycle(6));
        let ri = RingInfo::sssr(&g);
        assert_eq!(ri.num_rings(), 1);
        assert_eq!(ri.rings()[0].len(), 6);
        assert_cycle_order(&g, &ri.rings()[0]);
    }

    #[test]
    fn cyclopropane() {
        let ri = RingInfo::sssr(&from_edges(3, &cycle(3)));
        assert_eq!(sizes(&ri), vec![3]);
    }

    #[test]
    fn acyclic() {
        let ri = RingInfo::sssr(&from_edges(4, &[(0, 1), (1, 2), (2, 3)]));
        assert_eq!(ri.num_rings(), 0);
        assert_eq!(ri.expected(), 0);
    }

    #[test]
    fn naphthalene() {
        let g = from_edges(10, NAPHTHALENE);
        let ri = RingInfo::sssr(&g);
        assert_eq!(sizes(&ri), vec![6, 6]);
        assert_eq!(ri.accepted_before_truncation(), 2);
        for ring in ri.rings() {
            assert_cycle_order(&g, ring);
        }
    }

    #[test]
    fn anthracene() {
        let mut edges = cycle(14);
        edges.extend([(3, 12), (5, 10)]);
        let ri = RingInfo::sssr(&from_edges(14, &edges));
        assert_eq!(sizes(&ri), vec![6, 6, 6]);
    }

    #[test]
    fn spiro_nonane() {
        let edges = [
            (0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0), (3, 6), (6, 7), (7, 8), (8, 3),
        ];
        let ri = RingInfo::sssr(&from_edges(9, &edges));
        assert_eq!(sizes(&ri), vec![4, 6]);
    }

    #[test]
    fn norbornane() {
        let edges = [(0, 1), (1, 2), (2, 3), (3, 4), (4, 0), (4, 5), (5, 6), (6, 2)];
        let ri = RingInfo::sssr(&from_edges(7, &edges));
        assert_eq!(sizes(&ri), vec![5, 5]);
    }

    #[test]
    fn adamantane() {
        let g = from_edges(10, ADAMANTANE);
        let ri = RingInfo::sssr(&g);
        assert_eq!(ri.num_rings(), 3);
        assert!(ri.accepted_before_truncation() >= 3);
        for ring in ri.rings() {
            assert_eq!(ring.len(), 6);
            assert_cycle_order(&g, ring);
        }
    }

    #[test]
    fn cubane_uses_all_degree_three_count() {
        let ri = RingInfo::sssr(&from_edges(8, CUBANE));
        assert_eq!(ri.expected(), 6);
        assert_eq!(sizes(&ri), vec![4; 6]);
    }

    // Greedy selection lets a third six-membered ring through because the
    // bridgehead atoms still have fewer rings than bonds. Truncation hides it
    // in the final result. Update once the redundancy check is fixed.
    #[test]
    fn bicyclo_222_octane_accepts_extra_ring() {
        let ri = RingInfo::sssr(&from_edges(8, BICYCLO_222_OCTANE));
        assert_eq!(ri.accepted_before_truncation(), 3);
        assert_eq!(ri.num_rings(), 2);
        assert_eq!(sizes(&ri), vec![6, 6]);
    }

    #[test]
    fn benzonorbornene_keeps_benzo_ring() {
        let g = from_edges(11, BENZONORBORNENE);
        let ri = RingInfo::sssr(&g);
        assert_eq!(sizes(&ri), vec![5, 5, 6]);
        let benzo = ri.rings().iter().find(|r| r.contains(&n(7))).unwrap();
        assert_eq!(benzo.len(), 6);
        assert!(ri.is_ring_bond(n(10), n(1)));
        assert_ring_basis(&g, &ri);
    }

    #[test]
    fn every_fixture_yields_a_ring_basis() {
        let mut fixtures: Vec<(usize, Vec<(usize, usize)>)> = vec![
            (6, cycle(6)),
            (3, cycle(3)),
            (10, NAPHTHALENE.to_vec()),
            (10, ADAMANTANE.to_vec()),
            (8, CUBANE.to_vec()),
            (8, BICYCLO_222_OCTANE.to_vec()),
            (11, BENZONORBORNENE.to_vec()),
            (7, vec![(0, 1), (1, 2), (2, 3), (3, 4), (4, 0), (4, 5), (5, 6), (6, 2)]),
            (
                9,
                vec![(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0), (3, 6), (6, 7), (7, 8), (8, 3)],
            ),
        ];
        let mut anthracene = cycle(14);
        anthracene.extend([(3, 12), (5, 10)]);
        fixtures.push((14, anthracene));
        let mut biphenyl = cycle(6);
        biphenyl.extend((0..6).map(|i| (6 + i, 6 + (i + 1) % 6)));
        biphenyl.push((0, 6));
        fixtures.push((12, biphenyl));

        for (atoms, edges) in fixtures {
            let g = from_edges(atoms, &edges);
            assert_ring_basis(&g, &RingInfo::sssr(&g));
        }
    }

    #[test]
    fn naphthalene_rings_share_one_bond() {
        let g = from_edges(10, NAPHTHALENE);
        let ri = RingInfo::sssr(&g);
        let shared: Vec<NodeIndex> = g
            .vertices()
            .filter(|a| ri.rings().iter().filter(|r| r.contains(a)).count() == 2)
            .collect();
        assert_eq!(shared, vec![n(3), n(8)]);
        assert!(ri.is_ring_bond(n(3), n(8)));
    }

    #[test]
    fn toluene_methyl_not_in_ring() {
        let mut edges = cycle(6);
        edges.push((0, 6));
        let ri = RingInfo::sssr(&from_edges(7, &edges));
        assert!(!ri.is_ring_atom(n(6)));
        assert!(ri.is_ring_atom(n(0)));
        assert!(!ri.is_ring_bond(n(0), n(6)));
        assert!(ri.is_ring_bond(n(5), n(0)));
    }

    #[test]
    fn biphenyl_keeps_rings_separate() {
        let mut edges = cycle(6);
        edges.extend((0..6).map(|i| (6 + i, 6 + (i + 1) % 6)));
        edges.push((0, 6));
        let ri = RingInfo::sssr(&from_edges(12, &edges));
        assert_eq!(sizes(&ri), vec![6, 6]);
        assert!(!ri.is_ring_bond(n(0), n(6)));
    }

    #[test]
    fn disconnected_rings() {
        let mut edges = cycle(5);
        edges.extend((0..4).map(|i| (5 + i, 5 + (i + 1) % 4)));
        let ri = RingInfo::sssr(&from_edges(9, &edges));
        assert_eq!(sizes(&ri), vec![4, 5]);
    }

    #[test]
    fn deterministic() {
        let g = from_edges(10, ADAMANTANE);
        assert_eq!(RingInfo::sssr(&g).rings(), RingInfo::sssr(&g).rings());
    }

    #[test]
    fn rejects_ragged_matrix() {
        let adj = vec![vec![false, true, true], vec![true, false], vec![true, true, false]];
        assert!(matches!(
            RingInfo::from_adjacency(&adj),
            Err(LayoutError::NonSquareMatrix { row: 1, .. })
        ));
    }

    #[test]
    fn cycle_order_walks_lowest_neighbour_first() {
        let g = from_edges(5, &[(0, 3), (3, 1), (1, 4), (4, 2), (2, 0)]);
        let ri = RingInfo::sssr(&g);
        let order: Vec<usize> = ri.rings()[0].iter().map(|v| v.index()).collect();
        assert_eq!(order, vec![0, 2, 4, 1, 3]);
    }
}

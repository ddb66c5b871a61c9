//! Overlap scoring and branch rotation to reduce it.

use std::f64::consts::PI;
use std::time::Instant;

use glam::DVec2;
use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::bond::BondOrder;
use crate::geometry::{interior_angle, rotate_around, rotate_away_angle};
use crate::graph::MolGraph;
use crate::options::LayoutOptions;
use crate::ring_system::RingSystem;

/// Proximity penalty of a layout: each pair of drawn, unbonded vertices
/// closer than one bond length adds `(bond_length - distance) / bond_length`.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapScore {
    pub total: f64,
    /// Share of the total attributed to each vertex, indexed by vertex.
    pub vertex_scores: Vec<f64>,
}

impl OverlapScore {
    pub fn compute(graph: &MolGraph, bond_length: f64) -> Self {
        let n = graph.vertex_count();
        let mut total = 0.0;
        let mut vertex_scores = vec![0.0; n];
        for i in 0..n {
            let a = graph.vertex(NodeIndex::new(i));
            if !a.is_drawn {
                continue;
            }
            for j in (i + 1)..n {
                let b = graph.vertex(NodeIndex::new(j));
                if !b.is_drawn || graph.bond_between(NodeIndex::new(i), NodeIndex::new(j)).is_some() {
                    continue;
                }
                let d = a.position.distance(b.position);
                if d < bond_length {
                    let w = (bond_length - d) / bond_length;
                    total += w;
                    vertex_scores[i] += w;
                    vertex_scores[j] += w;
                }
            }
        }
        Self { total, vertex_scores }
    }

    /// Vertices by descending score, ties broken by lower index.
    pub fn ranked(&self) -> Vec<(NodeIndex, f64)> {
        let mut out: Vec<(NodeIndex, f64)> = self
            .vertex_scores
            .iter()
            .enumerate()
            .map(|(i, &s)| (NodeIndex::new(i), s))
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapReport {
    pub initial: f64,
    pub resolved: f64,
    /// Trial rotations evaluated.
    pub steps: usize,
    /// The step or time budget ran out before every pass finished.
    pub exhausted: bool,
}

struct Budget {
    steps: usize,
    max_steps: usize,
    deadline: Instant,
    exhausted: bool,
}

impl Budget {
    fn spend(&mut self) -> bool {
        if self.exhausted || self.steps >= self.max_steps || Instant::now() >= self.deadline {
            self.exhausted = true;
            return false;
        }
        self.steps += 1;
        true
    }
}

type Snapshot = Vec<(NodeIndex, DVec2, DVec2)>;

struct Resolver<'a> {
    graph: &'a mut MolGraph,
    rings: &'a RingSystem,
    options: &'a LayoutOptions,
    budget: Budget,
    total: f64,
}

/// Rotates branches around rotatable bonds while that lowers the total
/// overlap score. The score never increases.
pub fn resolve(graph: &mut MolGraph, rings: &RingSystem, options: &LayoutOptions) -> OverlapReport {
    let initial = OverlapScore::compute(graph, options.bond_length).total;
    let mut resolver = Resolver {
        graph,
        rings,
        options,
        budget: Budget {
            steps: 0,
            max_steps: options.overlap_max_steps,
            deadline: Instant::now() + options.overlap_time_budget(),
            exhausted: false,
        },
        total: initial,
    };

    resolver.splay_ring_substituents();
    for _ in 0..options.overlap_resolution_iterations {
        resolver.rotate_branches();
    }
    resolver.rotate_terminals();

    if resolver.budget.exhausted {
        log::debug!("overlap resolution stopped after {} steps", resolver.budget.steps);
    }
    log::debug!("overlap score {:.4} -> {:.4}", initial, resolver.total);
    OverlapReport {
        initial,
        resolved: resolver.total,
        steps: resolver.budget.steps,
        exhausted: resolver.budget.exhausted,
    }
}

impl Resolver<'_> {
    fn bond_length(&self) -> f64 {
        self.options.bond_length
    }

    fn score(&self) -> OverlapScore {
        OverlapScore::compute(self.graph, self.bond_length())
    }

    fn position(&self, v: NodeIndex) -> DVec2 {
        self.graph.vertex(v).position
    }

    /// The branch hanging off `parent` at `root`, unless it holds a pinned
    /// vertex.
    fn movable_subtree(&self, root: NodeIndex, parent: NodeIndex) -> Option<Vec<NodeIndex>> {
        let nodes = self.graph.subtree(root, Some(parent));
        if nodes.iter().any(|&v| self.graph.vertex(v).force_positioned) {
            None
        } else {
            Some(nodes)
        }
    }

    fn snapshot(&self, nodes: &[NodeIndex]) -> Snapshot {
        nodes
            .iter()
            .map(|&v| {
                let vertex = self.graph.vertex(v);
                (v, vertex.position, vertex.previous_position)
            })
            .collect()
    }

    fn restore(&mut self, snapshot: &Snapshot) {
        for &(v, position, previous) in snapshot {
            let vertex = self.graph.vertex_mut(v);
            vertex.position = position;
            vertex.previous_position = previous;
        }
    }

    fn rotate(&mut self, nodes: &[NodeIndex], angle: f64, center: DVec2) {
        for &v in nodes {
            let vertex = self.graph.vertex_mut(v);
            vertex.position = rotate_around(vertex.position, angle, center);
            vertex.previous_position = rotate_around(vertex.previous_position, angle, center);
        }
    }

    /// Mean score of the branch vertices above the sensitivity, 0 if none is.
    fn subtree_overlap(&self, root: NodeIndex, parent: NodeIndex, scores: &OverlapScore) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for v in self.graph.subtree(root, Some(parent)) {
            if !self.graph.vertex(v).is_drawn {
                continue;
            }
            let s = scores.vertex_scores[v.index()];
            if s > self.options.overlap_sensitivity {
                sum += s;
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Applies all `moves` around `center` and keeps them unless the total
    /// score grows.
    fn try_rotation(&mut self, moves: &[(Vec<NodeIndex>, f64)], center: DVec2) -> bool {
        if !self.budget.spend() {
            return false;
        }
        let all: Vec<NodeIndex> = moves.iter().flat_map(|(nodes, _)| nodes.iter().copied()).collect();
        let before = self.snapshot(&all);
        for (nodes, angle) in moves {
            self.rotate(nodes, *angle, center);
        }
        let total = self.score().total;
        if total > self.total {
            log::trace!("rejected rotation around {:?}: {:.4} > {:.4}", center, total, self.total);
            self.restore(&before);
            false
        } else {
            log::trace!("accepted rotation around {:?}: {:.4}", center, total);
            self.total = total;
            true
        }
    }

    /// Ring atoms with two substituents draw both straight out of the ring on
    /// top of each other; fan them apart symmetrically.
    fn splay_ring_substituents(&mut self) {
        let mut done = vec![false; self.graph.vertex_count()];
        let members: Vec<NodeIndex> = self
            .rings
            .rings()
            .iter()
            .flat_map(|r| r.members.iter().copied())
            .collect();

        for m in members {
            if std::mem::replace(&mut done[m.index()], true) {
                continue;
            }
            let vertex = self.graph.vertex(m);
            let outside: Vec<NodeIndex> = self
                .graph
                .neighbours(m)
                .into_iter()
                .filter(|&n| !self.graph.vertex(n).shares_ring_with(vertex))
                .collect();
            let [a, b] = outside[..] else { continue };
            if !self.graph.vertex(a).is_drawn || !self.graph.vertex(b).is_drawn {
                continue;
            }
            let Some(size) = vertex
                .rings
                .first()
                .and_then(|&r| self.rings.ring(r))
                .map(|r| r.size())
            else {
                continue;
            };
            let (Some(side_a), Some(side_b)) = (self.movable_subtree(a, m), self.movable_subtree(b, m)) else {
                continue;
            };
            if !self.budget.spend() {
                return;
            }

            let angle = (2.0 * PI - interior_angle(size)) / 6.0;
            let center = self.position(m);
            let mut both = side_a.clone();
            both.extend(side_b.iter().copied());
            let original = self.snapshot(&both);

            self.rotate(&side_a, angle, center);
            self.rotate(&side_b, -angle, center);
            let scores = self.score();
            let first = self.subtree_overlap(a, m, &scores) + self.subtree_overlap(b, m, &scores);
            let first_layout = self.snapshot(&both);

            self.rotate(&side_a, -2.0 * angle, center);
            self.rotate(&side_b, 2.0 * angle, center);
            let scores = self.score();
            let second = self.subtree_overlap(a, m, &scores) + self.subtree_overlap(b, m, &scores);
            if second > first {
                self.restore(&first_layout);
            }

            let total = self.score().total;
            if total > self.total {
                self.restore(&original);
            } else {
                self.total = total;
            }
        }
    }

    fn is_rotatable(&self, edge: EdgeIndex) -> bool {
        let e = self.graph.edge(edge);
        if e.in_ring || e.bond.is_stereo() || e.order() != BondOrder::Single {
            return false;
        }
        let Some((a, b)) = self.graph.edge_endpoints(edge) else {
            return false;
        };
        self.graph.drawn_neighbours(a).len() > 1 && self.graph.drawn_neighbours(b).len() > 1
    }

    /// One pass over every rotatable bond, turning the shorter side's
    /// branches away from the longer side when they overlap.
    fn rotate_branches(&mut self) {
        let edges: Vec<EdgeIndex> = self.graph.edges().collect();
        let mut scores = self.score();
        for edge in edges {
            if self.budget.exhausted {
                return;
            }
            if !self.is_rotatable(edge) {
                continue;
            }
            let Some((s, t)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            let (a, b) = if self.graph.subtree_depth(s, Some(t)) > self.graph.subtree_depth(t, Some(s)) {
                (s, t)
            } else {
                (t, s)
            };
            if self.subtree_overlap(b, a, &scores) <= self.options.overlap_sensitivity {
                continue;
            }

            let mut branches = self.graph.drawn_neighbours(b);
            branches.retain(|&n| n != a);
            if branches.iter().any(|&n| {
                self.graph
                    .bond_between(b, n)
                    .is_some_and(|e| self.graph.edge(e).in_ring)
            }) {
                continue;
            }
            if branches.len() == 2 && branches.iter().any(|&n| self.graph.vertex(n).in_ring()) {
                continue;
            }
            if branches.len() != 1 && branches.len() != 2 {
                continue;
            }

            let pa = self.position(a);
            let pb = self.position(b);
            let mut moves = Vec::with_capacity(branches.len());
            for &n in &branches {
                let Some(nodes) = self.movable_subtree(n, b) else {
                    moves.clear();
                    break;
                };
                let angle = rotate_away_angle(self.position(n), pa, pb, 2.0 * PI / 3.0);
                moves.push((nodes, angle));
            }
            if moves.is_empty() {
                continue;
            }
            self.try_rotation(&moves, pb);
            scores = self.score();
        }
    }

    /// Terminal vertices still above the sensitivity try discrete rotations
    /// about their parent; the best strict improvement is kept.
    fn rotate_terminals(&mut self) {
        let step = self.options.secondary_rotation_step_deg.to_radians();
        let scores = self.score();
        for (v, s) in scores.ranked() {
            if s <= self.options.overlap_sensitivity {
                break;
            }
            let parents = self.graph.drawn_neighbours(v);
            let [parent] = parents[..] else { continue };
            let Some(nodes) = self.movable_subtree(v, parent) else {
                continue;
            };
            let center = self.position(parent);
            let original = self.snapshot(&nodes);
            let mut best: Option<(f64, f64)> = None;

            'trials: for k in 1..=self.options.secondary_rotation_increments {
                for sign in [1.0, -1.0] {
                    if !self.budget.spend() {
                        break 'trials;
                    }
                    let angle = sign * k as f64 * step;
                    self.rotate(&nodes, angle, center);
                    let total = self.score().total;
                    self.restore(&original);
                    let bar = best.map_or(self.total, |(t, _)| t);
                    if total < bar {
                        best = Some((total, angle));
                    }
                }
            }

            if let Some((total, angle)) = best {
                self.rotate(&nodes, angle, center);
                self.total = total;
            }
            if self.budget.exhausted {
                return;
            }
        }
    }
}

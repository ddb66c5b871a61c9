//! Coordinate assignment by a ring-aware walk over the molecular graph.
//!
//! Each connected component is walked from a root vertex. Chains grow one
//! bond at a time at angles picked from the local branching pattern; rings are
//! drawn as regular polygons (bridged rings through the force layout) and
//! propagate to fused and spiro neighbours. The walk runs on an explicit task
//! stack.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_3, PI};

use glam::DVec2;
use petgraph::graph::NodeIndex;

use crate::bond::BondOrder;
use crate::depiction::ForceLayoutRecord;
use crate::error::LayoutError;
use crate::geometry::{self, apothem, centroid, direction_or, poly_circumradius, rotate_around};
use crate::graph::{connected_components, MolGraph};
use crate::kamada_kawai;
use crate::options::LayoutOptions;
use crate::ring::RingId;
use crate::ring_system::RingSystem;

const DEG_30: f64 = PI / 6.0;
const DEG_36: f64 = PI / 5.0;
const DEG_108: f64 = 3.0 * PI / 5.0;

#[derive(Debug, Clone, Copy)]
enum Task {
    /// Place `vertex` from `previous` along the absolute `angle`, then
    /// continue from it. A task without `previous` is a component root.
    Vertex {
        vertex: NodeIndex,
        previous: Option<NodeIndex>,
        angle: f64,
        origin_shortest: bool,
    },
    /// Draw `ring` around `center`, starting at `start` and walking away from
    /// `previous`.
    Ring {
        ring: RingId,
        center: DVec2,
        start: NodeIndex,
        previous: Option<NodeIndex>,
    },
}

pub(crate) struct Positioner<'a> {
    graph: &'a mut MolGraph,
    rings: &'a mut RingSystem,
    options: &'a LayoutOptions,
    force_layouts: Vec<ForceLayoutRecord>,
}

impl<'a> Positioner<'a> {
    pub(crate) fn new(graph: &'a mut MolGraph, rings: &'a mut RingSystem, options: &'a LayoutOptions) -> Self {
        Self {
            graph,
            rings,
            options,
            force_layouts: Vec::new(),
        }
    }

    fn bond_length(&self) -> f64 {
        self.options.bond_length
    }

    /// Positions every drawn vertex, component by component, left to right.
    pub(crate) fn position_all(mut self) -> Result<Vec<ForceLayoutRecord>, LayoutError> {
        let components = connected_components(&self.graph.adjacency_matrix())?;
        let mut right_edge: Option<f64> = None;

        for component in components {
            let drawn: Vec<NodeIndex> = component
                .into_iter()
                .map(NodeIndex::new)
                .filter(|&v| self.graph.vertex(v).is_drawn)
                .collect();
            if drawn.is_empty() {
                continue;
            }
            let pinned = drawn.iter().any(|&v| self.graph.vertex(v).force_positioned);
            let root = self.root_of(&drawn, pinned);
            self.run(Task::Vertex {
                vertex: root,
                previous: None,
                angle: 0.0,
                origin_shortest: false,
            })?;
            self.sweep(&drawn)?;

            let (min_x, max_x) = drawn.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                let x = self.graph.vertex(v).position.x;
                (lo.min(x), hi.max(x))
            });
            let mut shift = 0.0;
            if let Some(edge) = right_edge {
                if !pinned {
                    shift = edge + 2.0 * self.bond_length() - min_x;
                    for &v in &drawn {
                        let vertex = self.graph.vertex_mut(v);
                        vertex.position.x += shift;
                        vertex.previous_position.x += shift;
                    }
                }
            }
            let edge = max_x + shift;
            right_edge = Some(right_edge.map_or(edge, |e: f64| e.max(edge)));
        }

        Ok(self.force_layouts)
    }

    fn root_of(&self, drawn: &[NodeIndex], pinned: bool) -> NodeIndex {
        if pinned {
            if let Some(&v) = drawn.iter().find(|&&v| self.graph.vertex(v).force_positioned) {
                return v;
            }
        }
        let in_component = |v: &NodeIndex| drawn.contains(v);
        if let Some(ring) = self
            .rings
            .rings()
            .iter()
            .filter(|r| r.is_bridged && r.members.first().is_some_and(in_component))
            .last()
        {
            return ring.members[0];
        }
        if let Some(ring) = self
            .rings
            .rings()
            .iter()
            .find(|r| r.members.first().is_some_and(in_component))
        {
            return ring.members[0];
        }
        drawn[0]
    }

    fn run(&mut self, first: Task) -> Result<(), LayoutError> {
        let mut stack = vec![first];
        while let Some(task) = stack.pop() {
            match task {
                Task::Vertex {
                    vertex,
                    previous,
                    angle,
                    origin_shortest,
                } => self.place_vertex(vertex, previous, angle, origin_shortest, &mut stack),
                Task::Ring {
                    ring,
                    center,
                    start,
                    previous,
                } => self.place_ring(ring, center, start, previous, &mut stack)?,
            }
        }
        Ok(())
    }

    /// Places whatever the walk did not reach, anchored on a positioned
    /// neighbour where one exists.
    fn sweep(&mut self, drawn: &[NodeIndex]) -> Result<(), LayoutError> {
        for _ in 0..drawn.len() {
            let Some(&v) = drawn.iter().find(|&&v| !self.graph.vertex(v).positioned) else {
                return Ok(());
            };
            log::warn!("vertex {} was not reached by the placement walk", v.index());
            let anchor = self
                .graph
                .drawn_neighbours(v)
                .into_iter()
                .find(|&n| self.graph.vertex(n).positioned);
            let task = match anchor {
                Some(p) => Task::Vertex {
                    vertex: v,
                    previous: Some(p),
                    angle: self.graph.vertex(p).incoming_angle() + FRAC_PI_3,
                    origin_shortest: false,
                },
                None => Task::Vertex {
                    vertex: v,
                    previous: None,
                    angle: 0.0,
                    origin_shortest: false,
                },
            };
            self.run(task)?;
        }
        for &v in drawn {
            self.graph.vertex_mut(v).positioned = true;
        }
        Ok(())
    }

    fn place_vertex(
        &mut self,
        vertex: NodeIndex,
        previous: Option<NodeIndex>,
        angle: f64,
        origin_shortest: bool,
        stack: &mut Vec<Task>,
    ) {
        let bl = self.bond_length();
        match previous {
            None => {
                let v = self.graph.vertex_mut(vertex);
                if !v.positioned {
                    let dummy = DVec2::from_angle(-FRAC_PI_3) * bl - DVec2::new(bl, 0.0);
                    v.position = DVec2::ZERO;
                    v.previous_position = dummy;
                    v.angle = -FRAC_PI_3;
                    if v.bridged_ring.is_none() {
                        v.positioned = true;
                    }
                } else if v.previous_position == v.position {
                    v.previous_position = v.position + DVec2::from_angle(-FRAC_PI_3) * bl - DVec2::new(bl, 0.0);
                }
            }
            Some(prev) => {
                if self.graph.vertex(vertex).positioned {
                    return;
                }
                let prev_pos = self.graph.vertex(prev).position;
                let position = if self.graph.vertex(prev).in_ring() {
                    self.position_after_ring_vertex(vertex, prev)
                } else {
                    prev_pos + DVec2::from_angle(angle) * bl
                };
                let v = self.graph.vertex_mut(vertex);
                v.previous_position = prev_pos;
                v.position = position;
                v.positioned = true;
                v.parent = Some(prev);
            }
        }
        self.dispatch(vertex, previous, origin_shortest, stack);
    }

    fn position_after_ring_vertex(&self, vertex: NodeIndex, prev: NodeIndex) -> DVec2 {
        let p = self.graph.vertex(prev);
        let neighbours = self.graph.neighbours(prev);

        if p.bridged_ring.is_none() && p.rings.len() > 1 {
            let joined = neighbours.iter().copied().find(|&n| {
                let nv = self.graph.vertex(n);
                n != vertex && nv.positioned && p.rings.iter().all(|r| nv.rings.contains(r))
            });
            if let Some(j) = joined {
                return rotate_around(self.graph.vertex(j).position, PI, p.position);
            }
        }

        let mut sum = DVec2::ZERO;
        for &n in &neighbours {
            let nv = self.graph.vertex(n);
            if n != vertex && nv.positioned && nv.shares_ring_with(p) {
                sum += nv.position - p.position;
            }
        }
        let fallback = direction_or(p.previous_position, p.position, DVec2::X);
        p.position + direction_or(sum, DVec2::ZERO, fallback) * self.bond_length()
    }

    fn center_of_mass(&self) -> DVec2 {
        centroid(
            self.graph
                .vertices()
                .map(|v| self.graph.vertex(v))
                .filter(|v| v.positioned && v.is_drawn)
                .map(|v| v.position),
        )
        .unwrap_or(DVec2::ZERO)
    }

    /// Branch angle of the nearest vertex up the parent chain that has one.
    fn last_angle(&self, vertex: NodeIndex) -> f64 {
        let mut current = Some(vertex);
        for _ in 0..self.graph.vertex_count() {
            let Some(c) = current else { break };
            let v = self.graph.vertex(c);
            if v.angle != 0.0 {
                return v.angle;
            }
            current = v.parent;
        }
        0.0
    }

    fn dispatch(&mut self, vertex: NodeIndex, previous: Option<NodeIndex>, origin_shortest: bool, stack: &mut Vec<Task>) {
        let v = self.graph.vertex(vertex);
        if let Some(rid) = v.bridged_ring.or_else(|| v.rings.first().copied()) {
            if let Some(ring) = self.rings.ring(rid) {
                if !ring.positioned {
                    let r = poly_circumradius(self.bond_length(), ring.size());
                    let center = v.position + direction_or(v.previous_position, v.position, DVec2::X) * r;
                    stack.push(Task::Ring {
                        ring: rid,
                        center,
                        start: vertex,
                        previous: None,
                    });
                }
            }
            return;
        }

        let mut neighbours = self.graph.drawn_neighbours(vertex);
        if let Some(p) = previous {
            neighbours.retain(|&n| n != p);
        }
        let incoming = v.incoming_angle();
        let own_angle = v.angle;

        let mut branches: Vec<(NodeIndex, f64, bool)> = Vec::with_capacity(neighbours.len());
        match neighbours.len() {
            0 => {}
            1 => {
                let next = neighbours[0];
                let offset = self.single_continuation(vertex, previous, next, own_angle, origin_shortest);
                branches.push((next, offset, false));
            }
            2 => branches.extend(self.split_two(vertex, previous, &neighbours, own_angle)),
            3 => branches.extend(self.split_three(vertex, previous, &neighbours, own_angle)),
            4 => branches.extend(self.split_four(vertex, &neighbours)),
            // the parent takes one of the k + 1 slots, a root has k
            k if previous.is_some() => {
                let step = geometry::central_angle(k + 1);
                branches.extend(
                    neighbours
                        .iter()
                        .enumerate()
                        .map(|(i, &n)| (n, PI + step * (i + 1) as f64, false)),
                );
            }
            k => {
                let step = geometry::central_angle(k);
                branches.extend(
                    neighbours
                        .iter()
                        .enumerate()
                        .map(|(i, &n)| (n, step * i as f64, false)),
                );
            }
        }

        for &(n, offset, _) in &branches {
            self.graph.vertex_mut(n).angle = offset;
        }
        for &(n, offset, shortest) in branches.iter().rev() {
            stack.push(Task::Vertex {
                vertex: n,
                previous: Some(vertex),
                angle: incoming + offset,
                origin_shortest: shortest,
            });
        }
    }

    fn single_continuation(
        &self,
        vertex: NodeIndex,
        previous: Option<NodeIndex>,
        next: NodeIndex,
        own_angle: f64,
        origin_shortest: bool,
    ) -> f64 {
        let prev_order = previous.and_then(|p| self.graph.bond_order(p, vertex));
        let next_order = self.graph.bond_order(vertex, next);
        let prev_in_ring = previous.is_some_and(|p| self.graph.vertex(p).in_ring());

        let linear = prev_order == Some(BondOrder::Triple)
            || next_order == Some(BondOrder::Triple)
            || (prev_order == Some(BondOrder::Double) && next_order == Some(BondOrder::Double) && !prev_in_ring);
        if linear {
            return 0.0;
        }

        if prev_in_ring {
            let v = self.graph.vertex(vertex);
            let com = self.center_of_mass();
            let incoming = v.incoming_angle();
            let a = v.position + DVec2::from_angle(incoming + FRAC_PI_3) * self.bond_length();
            let b = v.position + DVec2::from_angle(incoming - FRAC_PI_3) * self.bond_length();
            return if a.distance_squared(com) < b.distance_squared(com) {
                -FRAC_PI_3
            } else {
                FRAC_PI_3
            };
        }

        let mut a = own_angle;
        if previous.is_some_and(|p| self.graph.drawn_neighbours(p).len() > 3) {
            a = if a > 0.0 {
                a.min(FRAC_PI_3)
            } else if a < 0.0 {
                a.max(-FRAC_PI_3)
            } else {
                FRAC_PI_3
            };
        } else if a == 0.0 {
            a = self.last_angle(vertex);
            if a == 0.0 {
                a = FRAC_PI_3;
            }
        }
        if origin_shortest {
            a
        } else {
            -a
        }
    }

    /// Two branches: the deeper subtree continues trans, the other goes cis.
    fn split_two(
        &self,
        vertex: NodeIndex,
        previous: Option<NodeIndex>,
        neighbours: &[NodeIndex],
        own_angle: f64,
    ) -> Vec<(NodeIndex, f64, bool)> {
        let a = if own_angle == 0.0 { FRAC_PI_3 } else { own_angle };
        let (l, r) = (neighbours[0], neighbours[1]);
        let depth_l = self.graph.subtree_depth(l, Some(vertex));
        let depth_r = self.graph.subtree_depth(r, Some(vertex));
        let depth_origin = previous.map_or(0, |p| self.graph.subtree_depth(p, Some(vertex)));
        let l_carbon = self.graph.vertex(l).atom.is_carbon();
        let r_carbon = self.graph.vertex(r).atom.is_carbon();

        let (cis, trans) = if r_carbon && !l_carbon && depth_r > 1 && depth_l < 5 {
            (r, l)
        } else if !r_carbon && l_carbon && depth_l > 1 && depth_r < 5 {
            (l, r)
        } else if depth_r > depth_l {
            (r, l)
        } else {
            (l, r)
        };
        let origin_shortest = depth_origin < depth_l && depth_origin < depth_r;
        vec![(trans, a, origin_shortest), (cis, -a, origin_shortest)]
    }

    /// Three branches: the deepest goes straight, the others at right angles,
    /// or a 30/90 degree cross when only the straight one is long.
    fn split_three(
        &self,
        vertex: NodeIndex,
        previous: Option<NodeIndex>,
        neighbours: &[NodeIndex],
        own_angle: f64,
    ) -> Vec<(NodeIndex, f64, bool)> {
        let depth: Vec<usize> = neighbours
            .iter()
            .map(|&n| self.graph.subtree_depth(n, Some(vertex)))
            .collect();
        let (s, l, r) = if depth[1] > depth[0] && depth[1] > depth[2] {
            (neighbours[1], neighbours[0], neighbours[2])
        } else if depth[2] > depth[0] && depth[2] > depth[1] {
            (neighbours[2], neighbours[0], neighbours[1])
        } else {
            (neighbours[0], neighbours[1], neighbours[2])
        };

        let no_rings = previous.is_some_and(|p| !self.graph.vertex(p).in_ring())
            && [s, l, r].iter().all(|&n| !self.graph.vertex(n).in_ring());
        let cross = no_rings
            && self.graph.subtree_depth(l, Some(vertex)) == 1
            && self.graph.subtree_depth(r, Some(vertex)) == 1
            && self.graph.subtree_depth(s, Some(vertex)) > 1;

        if cross {
            let sign = if own_angle >= 0.0 { 1.0 } else { -1.0 };
            vec![
                (s, -own_angle, false),
                (l, sign * DEG_30, false),
                (r, sign * FRAC_PI_2, false),
            ]
        } else {
            vec![(s, 0.0, false), (l, FRAC_PI_2, false), (r, -FRAC_PI_2, false)]
        }
    }

    fn split_four(&self, vertex: NodeIndex, neighbours: &[NodeIndex]) -> Vec<(NodeIndex, f64, bool)> {
        let depth: Vec<usize> = neighbours
            .iter()
            .map(|&n| self.graph.subtree_depth(n, Some(vertex)))
            .collect();
        let deepest = (1..4)
            .find(|&i| (0..4).all(|j| j == i || depth[i] > depth[j]))
            .unwrap_or(0);
        let mut rest = neighbours.to_vec();
        let w = rest.remove(deepest);
        vec![
            (w, -DEG_36, false),
            (rest[0], DEG_36, false),
            (rest[1], -DEG_108, false),
            (rest[2], DEG_108, false),
        ]
    }

    fn place_ring(
        &mut self,
        rid: RingId,
        center: DVec2,
        start: NodeIndex,
        previous: Option<NodeIndex>,
        stack: &mut Vec<Task>,
    ) -> Result<(), LayoutError> {
        let ring = self.rings.try_ring(rid)?.clone();
        if ring.positioned {
            return Ok(());
        }
        let bl = self.bond_length();
        let mut center = center;

        if ring.is_bridged {
            let report = kamada_kawai::layout(self.graph, &ring.members, center, bl, &self.options.force_layout)?;
            self.force_layouts.push(ForceLayoutRecord::new(rid, &report));
            center = self.centroid_of(&ring.members).unwrap_or(center);
            let subring_centers: Vec<Option<DVec2>> =
                ring.subrings.iter().map(|s| self.centroid_of(&s.members)).collect();
            if let Some(r) = self.rings.ring_mut(rid) {
                for (sub, c) in r.subrings.iter_mut().zip(subring_centers) {
                    if let Some(c) = c {
                        sub.center = c;
                    }
                }
            }
        } else {
            let start_angle = {
                let d = self.graph.vertex(start).position - center;
                d.y.atan2(d.x)
            };
            let walk_start = if ring.contains(start) { start } else { ring.members[0] };
            let radius = poly_circumradius(bl, ring.size());
            let step = ring.central_angle();
            let mut a = start_angle;
            for m in ring.walk_from(walk_start, previous) {
                let v = self.graph.vertex_mut(m);
                if !v.positioned {
                    v.position = center + DVec2::from_angle(a) * radius;
                }
                a += step;
                v.angle = a;
                v.positioned = true;
            }
        }

        if let Some(r) = self.rings.ring_mut(rid) {
            r.positioned = true;
            r.center = center;
        }

        let mut ordered: Vec<(usize, RingId)> = ring
            .neighbours
            .iter()
            .map(|&n| (self.rings.shared_vertices(rid, n).len(), n))
            .collect();
        ordered.sort_by(|a, b| b.0.cmp(&a.0));

        let mut tasks = Vec::new();
        for (_, nid) in ordered {
            let Some(neighbour) = self.rings.ring(nid) else {
                continue;
            };
            if neighbour.positioned {
                continue;
            }
            let size = neighbour.size();
            let shared = self.rings.shared_vertices(rid, nid);
            match shared.as_slice() {
                &[a, b] => {
                    let pa = self.graph.vertex(a).position;
                    let pb = self.graph.vertex(b).position;
                    let mid = (pa + pb) / 2.0;
                    let normal = (pb - pa).perp().normalize_or_zero();
                    let ap = apothem(poly_circumradius(bl, size), size);
                    let n0 = mid + normal * ap;
                    let n1 = mid - normal * ap;
                    let next = if center.distance_squared(n1) > center.distance_squared(n0) {
                        n1
                    } else {
                        n0
                    };
                    let (first, second) = if (pa - next).perp_dot(pb - next) < 0.0 {
                        (a, b)
                    } else {
                        (b, a)
                    };
                    tasks.push(Task::Ring {
                        ring: nid,
                        center: next,
                        start: first,
                        previous: Some(second),
                    });
                }
                &[a] => {
                    let pa = self.graph.vertex(a).position;
                    let next = pa + direction_or(center, pa, DVec2::X) * poly_circumradius(bl, size);
                    tasks.push(Task::Ring {
                        ring: nid,
                        center: next,
                        start: a,
                        previous: None,
                    });
                }
                _ => {}
            }
        }

        for &m in &ring.members {
            for n in self.graph.drawn_neighbours(m) {
                if !self.graph.vertex(n).positioned {
                    tasks.push(Task::Vertex {
                        vertex: n,
                        previous: Some(m),
                        angle: 0.0,
                        origin_shortest: false,
                    });
                }
            }
        }

        stack.extend(tasks.into_iter().rev());
        Ok(())
    }

    fn centroid_of(&self, members: &[NodeIndex]) -> Option<DVec2> {
        centroid(members.iter().map(|&m| self.graph.vertex(m).position))
    }
}

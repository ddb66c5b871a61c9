//! Kamada–Kawai spring layout for vertex sets that regular polygons cannot
//! describe, mainly bridged ring systems.

use glam::DVec2;
use petgraph::graph::NodeIndex;

use crate::error::LayoutError;
use crate::geometry;
use crate::graph::MolGraph;
use crate::options::ForceLayoutOptions;

const MIN_DISTANCE: f64 = 1e-6;
const CLAMP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KkReport {
    /// Outer iterations, one per selected vertex.
    pub iterations: usize,
    /// Largest residual force among unpinned vertices at the end.
    pub max_residual: f64,
    pub converged: bool,
}

struct Springs {
    /// `None` for pairs with no path inside the subset.
    length: Vec<Vec<Option<f64>>>,
    strength: Vec<Vec<f64>>,
}

impl Springs {
    fn gradient(&self, positions: &[DVec2], i: usize) -> DVec2 {
        let u = positions[i];
        let mut g = DVec2::ZERO;
        for (j, &v) in positions.iter().enumerate() {
            let Some(l) = self.length[i][j] else { continue };
            if i == j {
                continue;
            }
            let delta = u - v;
            let d = delta.length().max(MIN_DISTANCE);
            g += self.strength[i][j] * (delta - l * delta / d);
        }
        g
    }

    /// Newton step for vertex `i` given its gradient `g`.
    fn step(&self, positions: &[DVec2], i: usize, g: DVec2) -> DVec2 {
        let u = positions[i];
        let (mut dxx, mut dyy, mut dxy) = (0.0, 0.0, 0.0);
        for (j, &v) in positions.iter().enumerate() {
            let Some(l) = self.length[i][j] else { continue };
            if i == j {
                continue;
            }
            let k = self.strength[i][j];
            let delta = u - v;
            let d3 = delta.length().max(MIN_DISTANCE).powi(3);
            dxx += k * (1.0 - l * delta.y * delta.y / d3);
            dyy += k * (1.0 - l * delta.x * delta.x / d3);
            dxy += k * l * delta.x * delta.y / d3;
        }
        if dxx == 0.0 {
            dxx = CLAMP;
        }
        if dyy == 0.0 {
            dyy = CLAMP;
        }
        if dxy == 0.0 {
            dxy = CLAMP;
        }
        let mut det = dxx * dyy - dxy * dxy;
        if det == 0.0 {
            det = CLAMP;
        }
        DVec2::new(
            (-g.x * dyy + g.y * dxy) / det,
            (g.x * dxy - g.y * dxx) / det,
        )
    }
}

/// Positions `vertices` around `center` by minimizing spring energy.
///
/// Vertices already `positioned` keep their coordinates and pull the others.
/// Every vertex of the subset is positioned and pinned afterwards.
pub fn layout(
    graph: &mut MolGraph,
    vertices: &[NodeIndex],
    center: DVec2,
    bond_length: f64,
    options: &ForceLayoutOptions,
) -> Result<KkReport, LayoutError> {
    if vertices.is_empty() {
        return Err(LayoutError::EmptyVertexSubset);
    }
    let ids: Vec<usize> = vertices.iter().map(|v| v.index()).collect();
    let dist = graph.subgraph_distance_matrix(&ids)?;
    let n = vertices.len();

    let springs = Springs {
        length: dist
            .iter()
            .map(|row| row.iter().map(|d| d.map(|d| bond_length * d as f64)).collect())
            .collect(),
        strength: dist
            .iter()
            .map(|row| {
                row.iter()
                    .map(|d| match d {
                        Some(d) if *d > 0 => bond_length / (*d as f64 * *d as f64),
                        _ => 0.0,
                    })
                    .collect()
            })
            .collect(),
    };

    let radius = if n > 1 {
        geometry::poly_circumradius(bond_length * 16.0, n)
    } else {
        0.0
    };
    let step_angle = geometry::central_angle(n);
    let mut positions = vec![DVec2::ZERO; n];
    let mut pinned = vec![false; n];
    let mut a = 0.0;
    for i in (0..n).rev() {
        let vertex = graph.vertex(vertices[i]);
        if vertex.positioned {
            positions[i] = vertex.position;
            pinned[i] = true;
        } else {
            positions[i] = center + DVec2::from_angle(a) * radius;
        }
        a += step_angle;
    }

    let highest = |positions: &[DVec2]| -> Option<(usize, DVec2, f64)> {
        let mut best: Option<(usize, DVec2, f64)> = None;
        for i in (0..n).filter(|&i| !pinned[i]) {
            let g = springs.gradient(positions, i);
            let r = g.length();
            if best.map_or(true, |(_, _, b)| r > b) {
                best = Some((i, g, r));
            }
        }
        best
    };

    let mut iterations = 0;
    let mut max_residual = highest(&positions).map_or(0.0, |(_, _, r)| r);
    while max_residual > options.threshold && iterations < options.max_iterations {
        let Some((index, mut g, mut residual)) = highest(&positions) else {
            break;
        };
        iterations += 1;
        let mut inner = 0;
        while residual > options.inner_threshold && inner < options.max_inner_iterations {
            inner += 1;
            let next = positions[index] + springs.step(&positions, index, g);
            if !next.is_finite() {
                break;
            }
            positions[index] = next;
            g = springs.gradient(&positions, index);
            residual = g.length();
        }
        max_residual = highest(&positions).map_or(0.0, |(_, _, r)| r);
    }

    let converged = max_residual <= options.threshold;
    log::debug!(
        "force layout of {} vertices: {} iterations, max residual {:.4}, converged: {}",
        n,
        iterations,
        max_residual,
        converged
    );

    for (i, &v) in vertices.iter().enumerate() {
        let vertex = graph.vertex_mut(v);
        if !pinned[i] {
            vertex.position = positions[i];
        }
        vertex.positioned = true;
        vertex.force_positioned = true;
    }

    Ok(KkReport {
        iterations,
        max_residual,
        converged,
    })
}

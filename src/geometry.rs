//! Plane geometry helpers for regular polygons and rotations.

use std::f64::consts::PI;

use glam::DVec2;

/// Radius of the circumscribed circle of a regular polygon with `sides`
/// sides of length `side`.
pub fn poly_circumradius(side: f64, sides: usize) -> f64 {
    side / (2.0 * (PI / sides as f64).sin())
}

/// Distance from the center of a regular polygon to the middle of a side.
pub fn apothem(circumradius: f64, sides: usize) -> f64 {
    circumradius * (PI / sides as f64).cos()
}

pub fn central_angle(sides: usize) -> f64 {
    2.0 * PI / sides as f64
}

/// Interior angle of a regular polygon.
pub fn interior_angle(sides: usize) -> f64 {
    PI - central_angle(sides)
}

pub fn rotate_around(point: DVec2, angle: f64, center: DVec2) -> DVec2 {
    center + DVec2::from_angle(angle).rotate(point - center)
}

/// Unit vector from `from` towards `to`, or `fallback` when the points coincide.
pub fn direction_or(from: DVec2, to: DVec2, fallback: DVec2) -> DVec2 {
    let d = (to - from).normalize_or_zero();
    if d == DVec2::ZERO {
        fallback
    } else {
        d
    }
}

pub fn centroid(points: impl IntoIterator<Item = DVec2>) -> Option<DVec2> {
    let mut sum = DVec2::ZERO;
    let mut n = 0usize;
    for p in points {
        sum += p;
        n += 1;
    }
    (n > 0).then(|| sum / n as f64)
}

/// Of the two rotations by `±angle` of `point` around `center`, returns the
/// signed angle that moves `point` further from `away_from`.
pub fn rotate_away_angle(point: DVec2, away_from: DVec2, center: DVec2, angle: f64) -> f64 {
    let plus = rotate_around(point, angle, center).distance_squared(away_from);
    let minus = rotate_around(point, -angle, center).distance_squared(away_from);
    if minus > plus {
        -angle
    } else {
        angle
    }
}

//! Planar geometry on flat coordinate lists.
//!
//! All functions take rings as `[x0, y0, x1, y1, ...]`. The Y axis points
//! down, so "clockwise" means clockwise as seen on screen. A trailing odd
//! coordinate is ignored.

use crate::ir::{BBoxXYXY, Pixel};

fn pairs(points: &[f64]) -> impl DoubleEndedIterator<Item = (f64, f64)> + ExactSizeIterator + '_ {
    points.chunks_exact(2).map(|p| (p[0], p[1]))
}

/// Signed shoelace sum over all edges including the closing one.
///
/// Positive for counter-clockwise rings in screen coordinates.
fn signed_double_area(points: &[f64]) -> f64 {
    let coords: Vec<(f64, f64)> = pairs(points).collect();
    let n = coords.len();
    if n < 3 {
        return 0.0;
    }
    (0..n)
        .map(|i| {
            let (x0, y0) = coords[(i + n - 1) % n];
            let (x1, y1) = coords[i];
            x1 * y0 - y1 * x0
        })
        .sum()
}

/// Absolute polygon area by the shoelace formula.
///
/// An explicitly repeated closing point contributes nothing.
pub fn polygon_area(points: &[f64]) -> f64 {
    0.5 * signed_double_area(points).abs()
}

/// Axis-aligned bounds of a point list, `None` for an empty list.
pub fn bounding_box(points: &[f64]) -> Option<BBoxXYXY<Pixel>> {
    BBoxXYXY::from_points(points)
}

/// True when the ring winds clockwise on screen.
///
/// Uses the sum of `(x[i] - x[i-1]) * (y[i] + y[i-1])` over every edge,
/// including the edge from the last point back to the first; a negative
/// sum means clockwise once the Y axis points down.
pub fn is_clockwise(points: &[f64]) -> bool {
    let coords: Vec<(f64, f64)> = pairs(points).collect();
    let n = coords.len();
    if n < 3 {
        return false;
    }
    let sum: f64 = (0..n)
        .map(|i| {
            let (x0, y0) = coords[(i + n - 1) % n];
            let (x1, y1) = coords[i];
            (x1 - x0) * (y1 + y0)
        })
        .sum();
    sum < 0.0
}

/// Reverses the pair order of a ring, keeping each pair intact.
pub fn reverse_ring(points: &[f64]) -> Vec<f64> {
    pairs(points).rev().flat_map(|(x, y)| [x, y]).collect()
}

/// Returns the ring wound clockwise, reversing it if needed.
pub fn normalize_clockwise(points: &[f64]) -> Vec<f64> {
    if is_clockwise(points) {
        points.to_vec()
    } else {
        reverse_ring(points)
    }
}

/// Appends the first pair when the ring does not already end on it.
pub fn close_ring(points: &[f64]) -> Vec<f64> {
    let mut closed = points.to_vec();
    if points.len() >= 2 {
        let n = points.len() - points.len() % 2;
        if points[0] != points[n - 2] || points[1] != points[n - 1] {
            closed.truncate(n);
            closed.extend_from_slice(&points[..2]);
        }
    }
    closed
}

/// Collapses repeated consecutive points and `A, B, A` back-tracks.
///
/// For a back-track the most recent occurrence of `A` is kept, so the spike
/// to `B` disappears.
pub fn remove_duplicate_adjacent_points<T: Copy + PartialEq>(points: &[T]) -> Vec<T> {
    let mut kept: Vec<(T, T)> = Vec::with_capacity(points.len() / 2);
    for p in points.chunks_exact(2).map(|p| (p[0], p[1])) {
        let n = kept.len();
        if n >= 2 && kept[n - 2] == p {
            kept.pop();
            continue;
        }
        if n >= 1 && kept[n - 1] == p {
            continue;
        }
        kept.push(p);
    }
    kept.into_iter().flat_map(|(x, y)| [x, y]).collect()
}

/// Replaces every diagonal step of a path with an axis-aligned staircase.
///
/// Coordinates are truncated to integers first. A diagonal step from `p`
/// to `q` is split into `m = min(|dx|, |dy|)` stairs; stair `i` first moves
/// horizontally to `px + dx*i/m` and then vertically to `py + dy*i/m`, both
/// truncated towards zero. Axis-aligned steps pass through unchanged, so
/// the function is idempotent.
pub fn diagonal_to_orthogonal_path(points: &[f64]) -> Vec<i64> {
    let mut coords = pairs(points).map(|(x, y)| (x as i64, y as i64));
    let Some(first) = coords.next() else {
        return Vec::new();
    };
    let mut path = vec![first.0, first.1];
    let mut prev = first;
    for (x, y) in coords {
        let (dx, dy) = (x - prev.0, y - prev.1);
        if dx == 0 || dy == 0 {
            path.extend([x, y]);
        } else {
            let steps = dx.abs().min(dy.abs());
            let mut stair_y = prev.1;
            for i in 1..=steps {
                let stair_x = prev.0 + dx * i / steps;
                let next_y = prev.1 + dy * i / steps;
                path.extend([stair_x, stair_y, stair_x, next_y]);
                stair_y = next_y;
            }
        }
        prev = (x, y);
    }
    path
}

/// The four corners of a rotated box as a flat ring, starting top-left.
pub fn rotated_box_ring(bbox: &BBoxXYXY<Pixel>, degrees: f64) -> Vec<f64> {
    bbox.rotated_corners(degrees)
        .iter()
        .flat_map(|c| [c.x, c.y])
        .collect()
}

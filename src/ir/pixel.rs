//! Snapping annotation geometry to the pixel grid.
//!
//! Raster exporters need integer, axis-aligned outlines: a diagonal edge
//! between two pixel corners is turned into a staircase so that filling it
//! covers whole pixels only.

use super::model::{Annotation, AnnotationType, Points, Region, Ring, Task};
use crate::geometry::{close_ring, diagonal_to_orthogonal_path, remove_duplicate_adjacent_points};

/// Returns copies of `tasks` with geometry snapped to whole pixels.
///
/// - bbox coordinates are truncated to integers;
/// - polygon and segmentation rings are closed, turned into axis-aligned
///   staircases and cleaned of repeated points and back-tracks.
///
/// Other annotation types are copied unchanged. The input is not modified.
pub fn to_pixel_coordinates(tasks: &[Task]) -> Vec<Task> {
    tasks
        .iter()
        .map(|task| Task {
            annotations: task.annotations.iter().map(snap_annotation).collect(),
            ..task.clone()
        })
        .collect()
}

fn snap_annotation(annotation: &Annotation) -> Annotation {
    let points = match (annotation.kind, &annotation.points) {
        (AnnotationType::Bbox, Points::Flat(values)) => {
            Points::Flat(values.iter().map(|v| v.trunc()).collect())
        }
        (AnnotationType::Polygon, Points::Flat(values)) => Points::Flat(snap_ring(values)),
        (AnnotationType::Segmentation, Points::Regions(regions)) => Points::Regions(
            regions
                .iter()
                .map(|region| region.iter().map(|ring| snap_ring(ring)).collect::<Region>())
                .collect(),
        ),
        _ => return annotation.clone(),
    };
    Annotation {
        points,
        ..annotation.clone()
    }
}

/// Closes, staircases and de-duplicates one ring.
pub fn snap_ring(ring: &[f64]) -> Ring {
    if ring.is_empty() {
        return Vec::new();
    }
    let stairs = diagonal_to_orthogonal_path(&close_ring(ring));
    remove_duplicate_adjacent_points(&stairs)
        .into_iter()
        .map(|v| v as f64)
        .collect()
}

//! Polygon regions to raster masks.
//!
//! Rings are filled with the even-odd rule, sampling each pixel at its
//! center, which makes this the exact inverse of the crack-edge tracer.

use image::{GrayImage, Luma};

use crate::ir::Region;

/// Calls `span(y, x_start, x_end)` for each run of pixels inside `ring`.
///
/// `x_end` is exclusive. Spans are clipped to the `width` x `height` canvas.
pub fn for_each_span<F>(ring: &[f64], width: u32, height: u32, mut span: F)
where
    F: FnMut(u32, u32, u32),
{
    let vertices: Vec<(f64, f64)> = ring.chunks_exact(2).map(|p| (p[0], p[1])).collect();
    if vertices.len() < 3 || width == 0 || height == 0 {
        return;
    }
    let (min_y, max_y) = vertices
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
            (lo.min(y), hi.max(y))
        });
    if !min_y.is_finite() || !max_y.is_finite() {
        return;
    }
    let first_row = min_y.floor().max(0.0) as u32;
    let end_row = (max_y.ceil().max(0.0) as u32).min(height);

    let mut crossings: Vec<f64> = Vec::new();
    for y in first_row..end_row {
        let sample = f64::from(y) + 0.5;
        crossings.clear();
        for (i, &(x0, y0)) in vertices.iter().enumerate() {
            let (x1, y1) = vertices[(i + 1) % vertices.len()];
            if (y0 <= sample) != (y1 <= sample) {
                let t = (sample - y0) / (y1 - y0);
                crossings.push(x0 + t * (x1 - x0));
            }
        }
        crossings.sort_by(f64::total_cmp);
        for pair in crossings.chunks_exact(2) {
            let start = (pair[0] - 0.5).ceil().max(0.0);
            let end = (pair[1] - 0.5).ceil().min(f64::from(width));
            if start < end {
                span(y, start as u32, end as u32);
            }
        }
    }
}

/// Sets every pixel inside `ring` to `value`.
pub fn fill_ring(canvas: &mut GrayImage, ring: &[f64], value: u8) {
    let (width, height) = canvas.dimensions();
    for_each_span(ring, width, height, |y, x0, x1| {
        for x in x0..x1 {
            canvas.put_pixel(x, y, Luma([value]));
        }
    });
}

/// Fills the outer ring of `region` with `value` and clears its holes.
pub fn paint_region(canvas: &mut GrayImage, region: &Region, value: u8) {
    for (i, ring) in region.iter().enumerate() {
        fill_ring(canvas, ring, if i == 0 { value } else { 0 });
    }
}

/// Rasterizes polygon regions into a fresh `width` x `height` mask.
///
/// Each region is painted on its own scratch canvas (outer filled, holes
/// cleared) and then copied onto the result wherever it is set, so a
/// region's holes never erase pixels of another region.
pub fn render_segmentation_to_mask(
    regions: &[Region],
    width: u32,
    height: u32,
    fill_value: u8,
) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    if regions.len() == 1 {
        paint_region(&mut mask, &regions[0], fill_value);
        return mask;
    }
    let mut scratch = GrayImage::new(width, height);
    for region in regions {
        paint_region(&mut scratch, region, fill_value);
        for (out, painted) in mask.pixels_mut().zip(scratch.pixels_mut()) {
            if painted.0[0] != 0 {
                *out = *painted;
                painted.0[0] = 0;
            }
        }
    }
    mask
}

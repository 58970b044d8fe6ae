//! Indexed-color PNG export for instance and semantic segmentation.
//!
//! Each task becomes one 8-bit palette PNG the size of the image. Pixel
//! values are palette indices: index 0 is background, annotations start at
//! `start_index`.
//!
//! - Instance mode numbers annotations in draw order, so the index says
//!   nothing about identity across images.
//! - Semantic mode uses `classes.index(value) + start_index`, with one class
//!   list shared by the whole batch.
//!
//! Only bbox, polygon and segmentation annotations are drawn.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::GrayImage;

use super::model::{Annotation, AnnotationType, Points, Task};
use super::pixel::to_pixel_coordinates;
use super::walk::ensure_parent_dir;
use crate::conversion::{ConversionReport, SkipReason};
use crate::error::LabelkitError;
use crate::geometry::normalize_clockwise;
use crate::mask::{fill_ring, paint_region};

/// Built-in RGB palette, 58 entries. Entry 0 is black.
#[rustfmt::skip]
pub const DEFAULT_PALETTE: [u8; 174] = [
    0, 0, 0,
    228, 26, 28, 55, 126, 184, 77, 175, 74, 152, 78, 163, 255, 127, 0,
    255, 255, 51, 166, 86, 40, 247, 129, 191, 153, 153, 153, 102, 194, 165,
    252, 141, 98, 141, 160, 203, 231, 138, 195, 166, 216, 84, 255, 217, 47,
    229, 196, 148, 179, 179, 179, 141, 211, 199, 255, 255, 179, 190, 186, 218,
    251, 128, 114, 128, 177, 211, 253, 180, 98, 179, 222, 105, 252, 205, 229,
    217, 217, 217, 188, 128, 189, 204, 235, 197, 255, 237, 111, 166, 206, 227,
    31, 120, 180, 178, 223, 138, 51, 160, 44, 251, 154, 153, 227, 26, 28,
    253, 191, 111, 255, 127, 0, 202, 178, 214, 106, 61, 154, 255, 255, 153,
    177, 89, 40, 127, 201, 127, 190, 174, 212, 253, 192, 134, 255, 255, 153,
    56, 108, 176, 240, 2, 127, 191, 91, 22, 102, 102, 102, 27, 158, 119,
    217, 95, 2, 117, 112, 179, 231, 41, 138, 102, 166, 30, 230, 171, 2,
    166, 118, 29, 102, 102, 102,
];

const PNG_EXTENSION: &str = "png";
const MAX_PALETTE_BYTES: usize = 256 * 3;

/// Options shared by both segmentation exporters.
#[derive(Clone, Debug)]
pub struct SegmentationOptions {
    /// Flat `[r, g, b, r, g, b, ...]` list. Padded with black to 256 entries
    /// when written; anything past 256 entries is ignored.
    pub palette: Vec<u8>,

    /// Index of the first annotation or class. `0` makes the first class
    /// indistinguishable from background.
    pub start_index: u8,

    /// Semantic mode only: class order. Empty means the sorted set of every
    /// annotation value in the batch.
    pub classes: Vec<String>,
}

impl Default for SegmentationOptions {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.to_vec(),
            start_index: 1,
            classes: Vec::new(),
        }
    }
}

/// How an annotation picks its palette index.
enum Coloring<'a> {
    Instance { start_index: u8 },
    Semantic { classes: &'a [String], start_index: u8 },
}

// ============================================================================
// Rendering
// ============================================================================

/// Renders one task in instance mode.
///
/// Geometry is drawn as given; run [`to_pixel_coordinates`] first for
/// whole-pixel outlines.
pub fn render_instance_mask(task: &Task, start_index: u8, report: &mut ConversionReport) -> GrayImage {
    render_index_mask(task, &Coloring::Instance { start_index }, report)
}

/// Renders one task in semantic mode with the given class order.
pub fn render_semantic_mask(
    task: &Task,
    classes: &[String],
    start_index: u8,
    report: &mut ConversionReport,
) -> GrayImage {
    render_index_mask(
        task,
        &Coloring::Semantic {
            classes,
            start_index,
        },
        report,
    )
}

/// Every annotation value in `tasks`, sorted and de-duplicated.
pub fn semantic_classes(tasks: &[Task]) -> Vec<String> {
    tasks
        .iter()
        .flat_map(|task| &task.annotations)
        .map(|annotation| annotation.value.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn render_index_mask(task: &Task, coloring: &Coloring<'_>, report: &mut ConversionReport) -> GrayImage {
    let mut canvas = GrayImage::new(task.width, task.height);
    // Segmentation masks are painted in isolation and OR-ed in last, so a
    // hole only clears pixels of its own annotation.
    let mut segmentation_layer = GrayImage::new(task.width, task.height);
    let mut scratch = GrayImage::new(task.width, task.height);
    let mut next_instance = match coloring {
        Coloring::Instance { start_index } => u16::from(*start_index),
        Coloring::Semantic { .. } => 0,
    };

    for (index, annotation) in task.annotations.iter().enumerate() {
        let drawn = drawable(annotation).and_then(|()| match coloring {
            Coloring::Instance { .. } => {
                u8::try_from(next_instance).map_err(|_| SkipReason::PaletteExhausted)
            }
            Coloring::Semantic {
                classes,
                start_index,
            } => semantic_index(annotation, classes, *start_index),
        });
        let color = match drawn {
            Ok(color) => color,
            Err(reason) => {
                report.skip_annotation(&task.name, index, reason);
                continue;
            }
        };

        match &annotation.points {
            Points::Regions(regions) => {
                for region in regions {
                    let clockwise: Vec<Vec<f64>> =
                        region.iter().map(|ring| normalize_clockwise(ring)).collect();
                    paint_region(&mut scratch, &clockwise, color);
                }
                for (out, painted) in segmentation_layer.pixels_mut().zip(scratch.pixels_mut()) {
                    out.0[0] |= painted.0[0];
                    painted.0[0] = 0;
                }
            }
            Points::Flat(points) if annotation.kind == AnnotationType::Bbox => {
                fill_ring(&mut canvas, &box_ring(points), color);
            }
            Points::Flat(points) => fill_ring(&mut canvas, &normalize_clockwise(points), color),
            Points::Point { .. } => {}
        }
        next_instance += 1;
        report.record_written();
    }

    for (out, painted) in canvas.pixels_mut().zip(segmentation_layer.pixels()) {
        out.0[0] |= painted.0[0];
    }
    canvas
}

fn drawable(annotation: &Annotation) -> Result<(), SkipReason> {
    let shape_matches = matches!(
        (annotation.kind, &annotation.points),
        (AnnotationType::Bbox | AnnotationType::Polygon, Points::Flat(_))
            | (AnnotationType::Segmentation, Points::Regions(_))
    );
    if !shape_matches {
        return Err(SkipReason::UnsupportedType {
            kind: annotation.kind,
        });
    }
    if annotation.points.is_empty() {
        return Err(SkipReason::EmptyPoints);
    }
    if annotation.kind == AnnotationType::Bbox && annotation.points.flat().len() < 4 {
        return Err(SkipReason::MalformedInput {
            detail: format!("bbox needs 4 values, got {}", annotation.points.flat().len()),
        });
    }
    Ok(())
}

fn semantic_index(annotation: &Annotation, classes: &[String], start_index: u8) -> Result<u8, SkipReason> {
    let position = classes
        .iter()
        .position(|class| *class == annotation.value)
        .ok_or_else(|| SkipReason::UnknownCategory {
            value: annotation.value.clone(),
        })?;
    u8::try_from(position + usize::from(start_index)).map_err(|_| SkipReason::PaletteExhausted)
}

/// Clockwise rectangle ring through the two corners of `[x1, y1, x2, y2]`.
fn box_ring(points: &[f64]) -> Vec<f64> {
    let (x1, x2) = (points[0].min(points[2]), points[0].max(points[2]));
    let (y1, y2) = (points[1].min(points[3]), points[1].max(points[3]));
    vec![x1, y1, x2, y1, x2, y2, x1, y2]
}

// ============================================================================
// Writing
// ============================================================================

/// Writes one indexed PNG per task under `output_dir`, one index per drawn
/// annotation.
pub fn write_instance_segmentation(
    output_dir: &Path,
    tasks: &[Task],
    options: &SegmentationOptions,
) -> Result<ConversionReport, LabelkitError> {
    let coloring = Coloring::Instance {
        start_index: options.start_index,
    };
    write_index_pngs(output_dir, tasks, &coloring, &options.palette, "instance_segmentation")
}

/// Writes one indexed PNG per task under `output_dir`, one index per class.
pub fn write_semantic_segmentation(
    output_dir: &Path,
    tasks: &[Task],
    options: &SegmentationOptions,
) -> Result<ConversionReport, LabelkitError> {
    let classes = if options.classes.is_empty() {
        semantic_classes(tasks)
    } else {
        options.classes.clone()
    };
    let coloring = Coloring::Semantic {
        classes: &classes,
        start_index: options.start_index,
    };
    write_index_pngs(output_dir, tasks, &coloring, &options.palette, "semantic_segmentation")
}

fn write_index_pngs(
    output_dir: &Path,
    tasks: &[Task],
    coloring: &Coloring<'_>,
    palette: &[u8],
    format: &str,
) -> Result<ConversionReport, LabelkitError> {
    let mut report = ConversionReport::new(format);
    let mut written = 0usize;

    for task in to_pixel_coordinates(tasks) {
        if task.has_zero_size() {
            report.skip(&task.name, SkipReason::ZeroSizedImage);
            continue;
        }
        let mask = render_index_mask(&task, coloring, &mut report);
        write_index_png(&task.output_path(output_dir, PNG_EXTENSION), &mask, palette)?;
        written += 1;
    }

    log::info!("wrote {} {} PNGs to {}", written, format, output_dir.display());
    Ok(report)
}

/// Encodes `mask` as an 8-bit palette PNG.
pub fn write_index_png(path: &Path, mask: &GrayImage, palette: &[u8]) -> Result<(), LabelkitError> {
    ensure_parent_dir(path)?;
    let file = File::create(path).map_err(LabelkitError::Io)?;
    let encode_error = |source| LabelkitError::PngEncode {
        path: path.to_path_buf(),
        source,
    };

    let mut encoder = png::Encoder::new(BufWriter::new(file), mask.width(), mask.height());
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(padded_palette(palette));

    let mut writer = encoder.write_header().map_err(encode_error)?;
    writer.write_image_data(mask.as_raw()).map_err(encode_error)?;
    writer.finish().map_err(encode_error)
}

fn padded_palette(palette: &[u8]) -> Vec<u8> {
    let mut padded: Vec<u8> = palette.iter().copied().take(MAX_PALETTE_BYTES).collect();
    padded.resize(MAX_PALETTE_BYTES, 0);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Vec<f64> {
        vec![x, y, x + size, y, x + size, y + size, x, y + size, x, y]
    }

    #[test]
    fn default_palette_has_58_entries() {
        assert_eq!(DEFAULT_PALETTE.len(), 58 * 3);
        assert_eq!(&DEFAULT_PALETTE[..6], &[0, 0, 0, 228, 26, 28]);
    }

    #[test]
    fn instance_indices_follow_draw_order() {
        let task = Task::new("a.png", 100, 100)
            .with_annotation(Annotation::bbox("cat", 0.0, 0.0, 10.0, 10.0))
            .with_annotation(Annotation::keypoint("eye", 50.0, 50.0))
            .with_annotation(Annotation::bbox("cat", 20.0, 20.0, 30.0, 30.0));
        let mut report = ConversionReport::new("test");
        let mask = render_instance_mask(&task, 1, &mut report);
        assert_eq!(mask.get_pixel(5, 5).0[0], 1);
        assert_eq!(mask.get_pixel(25, 25).0[0], 2);
        assert_eq!(mask.get_pixel(50, 50).0[0], 0);
        assert_eq!(mask.get_pixel(10, 10).0[0], 0);
        assert_eq!(report.skipped_count(), 1);
    }

    #[test]
    fn instance_index_overflow_is_skipped() {
        let mut task = Task::new("a.png", 4, 4);
        for _ in 0..3 {
            task = task.with_annotation(Annotation::bbox("cat", 0.0, 0.0, 2.0, 2.0));
        }
        let mut report = ConversionReport::new("test");
        render_instance_mask(&task, 254, &mut report);
        assert_eq!(report.skip_counts()["palette_exhausted"], 1);
    }

    #[test]
    fn semantic_uses_class_position() {
        let task = Task::new("a.png", 40, 40)
            .with_annotation(Annotation::polygon("dog", square(0.0, 0.0, 10.0)))
            .with_annotation(Annotation::polygon("cat", square(20.0, 20.0, 10.0)))
            .with_annotation(Annotation::polygon("bird", square(30.0, 0.0, 5.0)));
        let classes = vec!["cat".to_string(), "dog".to_string()];
        let mut report = ConversionReport::new("test");
        let mask = render_semantic_mask(&task, &classes, 1, &mut report);
        assert_eq!(mask.get_pixel(5, 5).0[0], 2);
        assert_eq!(mask.get_pixel(25, 25).0[0], 1);
        assert_eq!(mask.get_pixel(32, 2).0[0], 0);
        assert_eq!(report.skip_counts()["unknown_category"], 1);
    }

    #[test]
    fn semantic_classes_are_sorted_and_global() {
        let tasks = vec![
            Task::new("a.png", 1, 1).with_annotation(Annotation::keypoint("zebra", 0.0, 0.0)),
            Task::new("b.png", 1, 1)
                .with_annotation(Annotation::bbox("ant", 0.0, 0.0, 1.0, 1.0))
                .with_annotation(Annotation::bbox("zebra", 0.0, 0.0, 1.0, 1.0)),
        ];
        assert_eq!(semantic_classes(&tasks), vec!["ant", "zebra"]);
    }

    #[test]
    fn segmentation_hole_does_not_erase_other_annotation() {
        let donut = Annotation::segmentation(
            "donut",
            vec![vec![square(0.0, 0.0, 30.0), square(10.0, 10.0, 10.0)]],
        );
        let filler = Annotation::polygon("filler", square(12.0, 12.0, 4.0));
        let task = Task::new("a.png", 40, 40)
            .with_annotation(filler)
            .with_annotation(donut);
        let mut report = ConversionReport::new("test");
        let mask = render_instance_mask(&task, 1, &mut report);
        assert_eq!(mask.get_pixel(14, 14).0[0], 1);
        assert_eq!(mask.get_pixel(11, 11).0[0], 0);
        assert_eq!(mask.get_pixel(2, 2).0[0], 2);
    }

    #[test]
    fn writes_palette_png() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = vec![
            Task::new("nested/a.jpg", 8, 6)
                .with_annotation(Annotation::bbox("cat", 1.0, 1.0, 3.0, 3.0)),
            Task::new("empty.jpg", 0, 0),
        ];
        let report =
            write_instance_segmentation(dir.path(), &tasks, &SegmentationOptions::default())
                .unwrap();
        assert_eq!(report.skip_counts()["zero_sized_image"], 1);
        assert!(!dir.path().join("empty.png").exists());

        let mut decoder = png::Decoder::new(File::open(dir.path().join("nested/a.png")).unwrap());
        decoder.set_transformations(png::Transformations::IDENTITY);
        let mut reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().color_type, png::ColorType::Indexed);
        assert_eq!(reader.info().palette.as_ref().unwrap().len(), 768);
        let mut buf = vec![0; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf).unwrap();
        let pixels = &buf[..frame.buffer_size()];
        assert_eq!((frame.width, frame.height), (8, 6));
        assert_eq!(pixels[8 + 1], 1);
        assert_eq!(pixels[8 * 2 + 2], 1);
        assert_eq!(pixels[8 * 3 + 3], 0);
        assert_eq!(pixels[0], 0);
    }
}

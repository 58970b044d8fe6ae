//! Drawing annotations on top of their images.
//!
//! Every image under the image directory whose relative path matches a task
//! name is rendered with that task's annotations and written to the same
//! relative path under the output directory. Images are processed on the
//! image worker pool; each worker reads one file and writes one file.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, Blend, Canvas,
};
use imageproc::rect::Rect;

use crate::conversion::{ConversionReport, SkipReason};
use crate::error::LabelkitError;
use crate::ir::walk::{collect_files_with_extensions, ensure_parent_dir, has_extension, rel_string};
use crate::ir::{Annotation, AnnotationType, Points, Task};
use crate::mask::{for_each_span, paint_region};
use crate::parallel::WorkerPool;

pub const OPACITY_DARK: u8 = 200;
pub const OPACITY_THIN: u8 = 50;
pub const KEYPOINT_MIN_STROKE_WIDTH: u32 = 2;
pub const POSE_ESTIMATION_MIN_STROKE_WIDTH: u32 = 7;

const OVERLAY_IMAGE_EXTENSIONS: [&str; 6] = ["jpeg", "jpg", "png", "tif", "tiff", "bmp"];
const JPEG_QUALITY: u8 = 95;

type AnnotationSkips = Vec<(usize, SkipReason)>;

/// Renders every image in `image_dir` that has a task and writes the
/// result under `output_dir`.
///
/// Images without a task are logged and left alone. An image that cannot
/// be read or written is reported as skipped; the batch carries on.
pub fn export_image_with_annotations(
    tasks: &[Task],
    image_dir: &Path,
    output_dir: &Path,
) -> Result<ConversionReport, LabelkitError> {
    let mut by_name: HashMap<&str, &Task> = HashMap::new();
    for task in tasks {
        by_name.entry(task.name.as_str()).or_insert(task);
    }

    let mut jobs = Vec::new();
    for image_path in collect_files_with_extensions(image_dir, &OVERLAY_IMAGE_EXTENSIONS)? {
        let name = rel_string(image_dir, &image_path);
        match by_name.get(name.as_str()) {
            Some(task) => jobs.push((image_path, *task)),
            None => log::info!("no task for image {name}"),
        }
    }

    let pool = WorkerPool::for_images()?;
    let results = pool.map_ordered(&jobs, |(image_path, task)| {
        render_file(image_path, task, &output_dir.join(&task.name))
    });

    let mut report = ConversionReport::new("image_with_annotations");
    for ((_, task), result) in jobs.iter().zip(results) {
        match result {
            Ok(skips) => {
                report.record_written();
                for (index, reason) in skips {
                    report.skip_annotation(&task.name, index, reason);
                }
            }
            Err(reason) => report.skip(&task.name, reason),
        }
    }

    log::info!(
        "wrote {} annotated images to {}",
        report.written,
        output_dir.display()
    );
    Ok(report)
}

fn render_file(image_path: &Path, task: &Task, output_path: &Path) -> Result<AnnotationSkips, SkipReason> {
    let io_skip = |detail: String| SkipReason::Io { detail };

    let base = image::open(image_path)
        .map_err(|e| io_skip(format!("{}: {e}", image_path.display())))?
        .to_rgba8();
    let (rendered, skips) = render_annotations(&base, task);

    let rgb = image::DynamicImage::ImageRgba8(rendered).to_rgb8();
    ensure_parent_dir(output_path).map_err(|e| io_skip(e.to_string()))?;
    let saved = if has_extension(output_path, &["jpg", "jpeg"]) {
        File::create(output_path)
            .map_err(image::ImageError::IoError)
            .and_then(|file| {
                JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY).encode_image(&rgb)
            })
    } else {
        rgb.save(output_path)
    };
    saved.map_err(|e| io_skip(format!("{}: {e}", output_path.display())))?;
    Ok(skips)
}

/// Stroke width for an image: one pixel per 300 pixels of the shorter
/// side, at least 1.
pub fn stroke_width(width: u32, height: u32) -> u32 {
    (width.min(height) / 300).max(1)
}

/// Draws `task`'s annotations over `base`.
///
/// Returns the rendered image and the annotations that were not drawn,
/// by index. Annotations without a valid `#RRGGBB` color are not drawn.
pub fn render_annotations(base: &RgbaImage, task: &Task) -> (RgbaImage, AnnotationSkips) {
    let (width, height) = base.dimensions();
    let stroke = stroke_width(width, height);
    let mut canvas = Blend(base.clone());
    let mut segmentation_layer = RgbaImage::new(width, height);
    let mut skips = Vec::new();

    for (index, annotation) in task.annotations.iter().enumerate() {
        let drawn = parse_color(annotation.color.as_deref()).and_then(|rgb| {
            draw_annotation(&mut canvas, &mut segmentation_layer, annotation, rgb, stroke)
        });
        if let Err(reason) = drawn {
            skips.push((index, reason));
        }
    }

    let mut rendered = canvas.0;
    blend_segmentation(&mut rendered, &segmentation_layer);
    (rendered, skips)
}

fn draw_annotation(
    canvas: &mut Blend<RgbaImage>,
    segmentation_layer: &mut RgbaImage,
    annotation: &Annotation,
    [r, g, b]: [u8; 3],
    stroke: u32,
) -> Result<(), SkipReason> {
    let dark = Rgba([r, g, b, OPACITY_DARK]);
    let thin = Rgba([r, g, b, OPACITY_THIN]);

    match (annotation.kind, &annotation.points) {
        (AnnotationType::Bbox, Points::Flat(p)) if p.len() >= 4 => {
            draw_box(canvas, p, thin, dark, stroke);
        }
        (AnnotationType::Polygon, Points::Flat(p)) if p.len() >= 6 => {
            fill_spans(canvas, p, thin);
            let mut closed = p.clone();
            closed.extend_from_slice(&p[..2]);
            draw_polyline(canvas, &closed, dark, stroke);
        }
        (AnnotationType::Line, Points::Flat(p)) if p.len() >= 4 => {
            draw_polyline(canvas, p, dark, stroke);
        }
        (AnnotationType::Keypoint, points) => {
            let (x, y) = points.xy().ok_or(SkipReason::EmptyPoints)?;
            draw_dot(canvas, x, y, stroke.max(KEYPOINT_MIN_STROKE_WIDTH), dark);
        }
        (AnnotationType::Segmentation, Points::Regions(regions)) if !regions.is_empty() => {
            let (width, height) = segmentation_layer.dimensions();
            let mut scratch = GrayImage::new(width, height);
            for region in regions {
                paint_region(&mut scratch, region, u8::MAX);
            }
            let color = Rgba([r, g, b, OPACITY_THIN * 2]);
            for (out, covered) in segmentation_layer.pixels_mut().zip(scratch.pixels()) {
                if covered.0[0] != 0 {
                    for (channel, value) in out.0.iter_mut().zip(color.0) {
                        *channel |= value;
                    }
                }
            }
        }
        (AnnotationType::PoseEstimation, _) => {
            draw_pose(canvas, annotation, [r, g, b], stroke.max(POSE_ESTIMATION_MIN_STROKE_WIDTH));
        }
        (AnnotationType::Classification, _) => {
            return Err(SkipReason::UnsupportedType {
                kind: annotation.kind,
            })
        }
        _ => return Err(SkipReason::EmptyPoints),
    }
    Ok(())
}

/// Translucent fill plus an outline growing inwards from the box edge.
fn draw_box(canvas: &mut Blend<RgbaImage>, p: &[f64], fill: Rgba<u8>, outline: Rgba<u8>, stroke: u32) {
    let (x1, x2) = (p[0].min(p[2]) as i32, p[0].max(p[2]) as i32);
    let (y1, y2) = (p[1].min(p[3]) as i32, p[1].max(p[3]) as i32);
    let (width, height) = canvas.dimensions();

    for y in y1.max(0)..=y2.min(height as i32 - 1) {
        for x in x1.max(0)..=x2.min(width as i32 - 1) {
            canvas.draw_pixel(x as u32, y as u32, fill);
        }
    }
    for inset in 0..stroke as i32 {
        let (w, h) = (x2 - x1 + 1 - 2 * inset, y2 - y1 + 1 - 2 * inset);
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(canvas, rect, outline);
    }
}

fn fill_spans(canvas: &mut Blend<RgbaImage>, ring: &[f64], color: Rgba<u8>) {
    let (width, height) = canvas.dimensions();
    for_each_span(ring, width, height, |y, x0, x1| {
        for x in x0..x1 {
            canvas.draw_pixel(x, y, color);
        }
    });
}

fn draw_polyline(canvas: &mut Blend<RgbaImage>, points: &[f64], color: Rgba<u8>, stroke: u32) {
    let vertices: Vec<(f32, f32)> = points
        .chunks_exact(2)
        .map(|p| (p[0] as f32, p[1] as f32))
        .collect();
    for segment in vertices.windows(2) {
        draw_thick_segment(canvas, segment[0], segment[1], color, stroke);
    }
}

/// Parallel one-pixel segments offset across the main direction of travel.
fn draw_thick_segment(
    canvas: &mut Blend<RgbaImage>,
    start: (f32, f32),
    end: (f32, f32),
    color: Rgba<u8>,
    stroke: u32,
) {
    let steep = (end.1 - start.1).abs() > (end.0 - start.0).abs();
    let half = stroke as i32 / 2;
    for offset in -half..(stroke as i32 - half) {
        let offset = offset as f32;
        let (dx, dy) = if steep { (offset, 0.0) } else { (0.0, offset) };
        draw_line_segment_mut(
            canvas,
            (start.0 + dx, start.1 + dy),
            (end.0 + dx, end.1 + dy),
            color,
        );
    }
}

fn draw_dot(canvas: &mut Blend<RgbaImage>, x: f64, y: f64, radius: u32, color: Rgba<u8>) {
    draw_filled_circle_mut(canvas, (x as i32, y as i32), radius as i32, color);
}

/// Skeleton edges between labelled joints, then one opaque dot per joint.
fn draw_pose(canvas: &mut Blend<RgbaImage>, annotation: &Annotation, [r, g, b]: [u8; 3], stroke: u32) {
    let joints: HashMap<&str, (f64, f64)> = annotation
        .keypoints
        .iter()
        .filter_map(|keypoint| {
            let value = keypoint.value.as_ref()?;
            Some((keypoint.key.as_str(), (value.x, value.y)))
        })
        .collect();

    let edges: BTreeSet<(&str, &str)> = annotation
        .keypoints
        .iter()
        .flat_map(|keypoint| {
            keypoint.edges.iter().map(move |edge| {
                let (a, b) = (keypoint.key.as_str(), edge.as_str());
                if a <= b {
                    (a, b)
                } else {
                    (b, a)
                }
            })
        })
        .collect();

    let dark = Rgba([r, g, b, OPACITY_DARK]);
    for (from, to) in edges {
        if let (Some(&(x0, y0)), Some(&(x1, y1))) = (joints.get(from), joints.get(to)) {
            draw_thick_segment(canvas, (x0 as f32, y0 as f32), (x1 as f32, y1 as f32), dark, stroke);
        }
    }

    let opaque = Rgba([r, g, b, u8::MAX]);
    for keypoint in &annotation.keypoints {
        if let Some(&(x, y)) = joints.get(keypoint.key.as_str()) {
            draw_dot(canvas, x, y, stroke, opaque);
        }
    }
}

/// Mixes the segmentation layer in at half strength, weighted by the
/// layer's alpha.
fn blend_segmentation(image: &mut RgbaImage, layer: &RgbaImage) {
    for (pixel, mask) in image.pixels_mut().zip(layer.pixels()) {
        let alpha = u32::from(mask.0[3]);
        if alpha == 0 {
            continue;
        }
        for channel in 0..3 {
            let base = u32::from(pixel.0[channel]);
            let merged = (base + u32::from(mask.0[channel])) / 2;
            pixel.0[channel] = ((merged * alpha + base * (255 - alpha)) / 255) as u8;
        }
    }
}

/// Parses `#RRGGBB` or `#RGB`.
pub fn parse_color(color: Option<&str>) -> Result<[u8; 3], SkipReason> {
    let invalid = || SkipReason::InvalidColor {
        color: color.map(str::to_string),
    };
    let hex = color.ok_or_else(invalid)?.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
    match hex.len() {
        6 => Ok([channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?]),
        3 => {
            let short = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
            Ok([short(0)?, short(1)?, short(2)?])
        }
        _ => Err(invalid()),
    }
}

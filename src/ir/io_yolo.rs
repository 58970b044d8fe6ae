//! YOLO label import and export.
//!
//! A YOLO dataset here is a `classes.txt` (one class name per line, line
//! index = class id) plus one `.txt` label file per image, sitting next to
//! the image with the same stem. Each label line is
//! `class_id cx cy w h` with all four values as fractions of the image size.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::io_coco_json::{discover_values, export_box};
use super::model::{Annotation, AnnotationMap, AnnotationType, Task};
use super::walk::{
    collect_files_with_extensions, ensure_parent_dir, read_image_dimensions, rel_string,
    IMAGE_EXTENSIONS,
};
use super::{BBoxXYXY, Normalized};
use crate::conversion::{ConversionReport, SkipReason};
use crate::error::LabelkitError;
use crate::parallel::WorkerPool;

const LABEL_EXTENSION: &str = "txt";
const CLASSES_FILE: &str = "classes.txt";

/// Options for YOLO export.
#[derive(Clone, Debug, Default)]
pub struct YoloExportOptions {
    /// Explicit class list. When set, only annotations whose value is listed
    /// are written, with class id = position in this list. When empty, the
    /// classes are the bbox/polygon values in first-seen order.
    pub classes: Vec<String>,
}

/// One label file's worth of YOLO lines.
#[derive(Clone, Debug, PartialEq)]
pub struct YoloLabelFile {
    /// `<task output stem>.txt`, relative to the `annotations` directory.
    pub file_name: String,
    pub lines: Vec<String>,
}

/// In-memory YOLO export.
#[derive(Clone, Debug)]
pub struct YoloExport {
    pub classes: Vec<String>,
    pub labels: Vec<YoloLabelFile>,
    pub report: ConversionReport,
}

// ============================================================================
// Export
// ============================================================================

/// Converts tasks into YOLO class names and label lines.
///
/// Every task gets a label file, empty if nothing survives. Boxes are
/// computed exactly as for COCO (rotation and degenerate-box rules
/// included), then normalized by the task size. Tasks with zero width or
/// height contribute no lines.
pub fn tasks_to_yolo(
    tasks: &[Task],
    options: &YoloExportOptions,
) -> Result<YoloExport, LabelkitError> {
    let explicit = !options.classes.is_empty();
    let classes = if explicit {
        options.classes.clone()
    } else {
        discover_values(tasks, &[AnnotationType::Bbox, AnnotationType::Polygon])
    };
    let class_ids: HashMap<&str, usize> = classes
        .iter()
        .enumerate()
        .rev()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let pool = WorkerPool::for_annotations()?;
    let mut report = ConversionReport::new("yolo");
    let mut labels = Vec::with_capacity(tasks.len());

    for task in tasks {
        let results = pool.map_ordered(&task.annotations, |annotation| {
            to_yolo_line(annotation, task, &class_ids, explicit)
        });
        labels.push(YoloLabelFile {
            file_name: format!("{}.{}", task.output_stem(), LABEL_EXTENSION),
            lines: report.gather(&task.name, results),
        });
    }

    Ok(YoloExport {
        classes,
        labels,
        report,
    })
}

/// Writes `classes.txt` and `annotations/<stem>.txt` files under `output_dir`.
pub fn write_yolo_dir(
    output_dir: &Path,
    tasks: &[Task],
    options: &YoloExportOptions,
) -> Result<ConversionReport, LabelkitError> {
    let export = tasks_to_yolo(tasks, options)?;

    let labels_dir = output_dir.join("annotations");
    fs::create_dir_all(&labels_dir).map_err(LabelkitError::Io)?;

    for label in &export.labels {
        let label_path = labels_dir.join(&label.file_name);
        ensure_parent_dir(&label_path)?;
        fs::write(&label_path, join_lines(&label.lines)).map_err(LabelkitError::Io)?;
    }
    fs::write(output_dir.join(CLASSES_FILE), join_lines(&export.classes))
        .map_err(LabelkitError::Io)?;

    log::info!(
        "wrote {} label files and {} classes to {}",
        export.labels.len(),
        export.classes.len(),
        output_dir.display()
    );
    Ok(export.report)
}

fn join_lines(lines: &[String]) -> String {
    lines.iter().map(|line| format!("{line}\n")).collect()
}

fn to_yolo_line(
    annotation: &Annotation,
    task: &Task,
    class_ids: &HashMap<&str, usize>,
    explicit: bool,
) -> Result<String, SkipReason> {
    if !matches!(
        annotation.kind,
        AnnotationType::Bbox | AnnotationType::Polygon
    ) {
        return Err(SkipReason::UnsupportedType {
            kind: annotation.kind,
        });
    }
    let class_id = match class_ids.get(annotation.value.as_str()) {
        Some(&id) => id,
        None if explicit => {
            return Err(SkipReason::ExcludedClass {
                value: annotation.value.clone(),
            })
        }
        None => {
            return Err(SkipReason::UnknownCategory {
                value: annotation.value.clone(),
            })
        }
    };
    if task.has_zero_size() {
        return Err(SkipReason::ZeroSizedImage);
    }
    let bbox = export_box(annotation)?;
    let (cx, cy, w, h) = bbox
        .to_normalized(f64::from(task.width), f64::from(task.height))
        .to_cxcywh();
    let [cx, cy, w, h] = [cx, cy, w, h].map(|v| ratio_token(truncate7(v)));
    Ok(format!("{class_id} {cx} {cy} {w} {h}"))
}

/// Truncates (never rounds) to seven decimal places.
fn truncate7(value: f64) -> f64 {
    (value * 1e7).trunc() / 1e7
}

/// Ratios always carry a decimal point, so a full-width box reads `1.0`.
fn ratio_token(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

// ============================================================================
// Import
// ============================================================================

/// Reads a YOLO dataset into bbox annotations keyed by image path relative
/// to `dataset_dir`.
///
/// Label files whose image is missing or unreadable, lines that are not
/// five numbers and unknown class ids are skipped with a warning. Images without a label
/// file are not listed.
pub fn read_yolo_dir(classes_path: &Path, dataset_dir: &Path) -> Result<AnnotationMap, LabelkitError> {
    let classes = read_classes_txt(classes_path)?;

    let mut images: HashMap<PathBuf, PathBuf> = HashMap::new();
    for image_path in collect_files_with_extensions(dataset_dir, &IMAGE_EXTENSIONS)? {
        images
            .entry(image_path.with_extension(""))
            .or_insert(image_path);
    }

    let mut map = AnnotationMap::new();
    for label_path in collect_files_with_extensions(dataset_dir, &[LABEL_EXTENSION])? {
        if label_path.file_name().is_some_and(|n| n == CLASSES_FILE) {
            continue;
        }
        let Some(image_path) = images.get(&label_path.with_extension("")) else {
            log::warn!("no image found for label file {}", label_path.display());
            continue;
        };
        let (width, height) = match read_image_dimensions(image_path) {
            Ok(size) => size,
            Err(e) => {
                log::warn!("skipping {}: {e}", label_path.display());
                continue;
            }
        };
        let content = fs::read_to_string(&label_path).map_err(LabelkitError::Io)?;

        let annotations = map
            .entry(rel_string(dataset_dir, image_path))
            .or_default();
        for (line_idx, line) in content.lines().enumerate() {
            match parse_label_line(line, &classes, width, height) {
                Ok(Some(annotation)) => annotations.push(annotation),
                Ok(None) => {}
                Err(reason) => log::warn!(
                    "{}:{}: skipping line: {}",
                    label_path.display(),
                    line_idx + 1,
                    reason
                ),
            }
        }
    }
    Ok(map)
}

/// Class names in line order; blank lines keep their slot.
pub fn read_classes_txt(path: &Path) -> Result<Vec<String>, LabelkitError> {
    let data = fs::read_to_string(path).map_err(LabelkitError::Io)?;
    Ok(data.lines().map(|line| line.trim().to_string()).collect())
}

/// Parses one label line into a pixel-space bbox.
///
/// `Ok(None)` for blank lines.
fn parse_label_line(
    line: &str,
    classes: &[String],
    width: u32,
    height: u32,
) -> Result<Option<Annotation>, SkipReason> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().take(6).collect();
    if tokens.len() != 5 {
        return Err(SkipReason::MalformedInput {
            detail: format!("expected 5 tokens, found {}", tokens.len()),
        });
    }

    let class_id = tokens[0]
        .parse::<usize>()
        .map_err(|_| SkipReason::MalformedInput {
            detail: format!("invalid class id '{}'", tokens[0]),
        })?;
    let class = classes
        .get(class_id)
        .ok_or_else(|| SkipReason::UnknownCategory {
            value: tokens[0].to_string(),
        })?;

    let mut values = [0.0; 4];
    for (slot, raw) in values.iter_mut().zip(&tokens[1..]) {
        *slot = raw.parse::<f64>().map_err(|_| SkipReason::MalformedInput {
            detail: format!("invalid number '{raw}'"),
        })?;
    }
    let [cx, cy, w, h] = values;

    let bbox = BBoxXYXY::<Normalized>::from_cxcywh(cx, cy, w, h)
        .to_pixel(f64::from(width), f64::from(height));
    Ok(Some(Annotation::bbox(
        class,
        bbox.xmin(),
        bbox.ymin(),
        bbox.xmax(),
        bbox.ymax(),
    )))
}

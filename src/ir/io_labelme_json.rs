//! LabelMe JSON import and export.
//!
//! LabelMe stores one JSON file per image with a list of `shapes`, each a
//! label, a `shape_type` and a list of `[x, y]` points in pixels.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::model::{Annotation, AnnotationMap, AnnotationType, Task};
use super::walk::{collect_files_with_extensions, ensure_parent_dir, rel_string};
use super::{BBoxXYXY, Pixel};
use crate::conversion::{ConversionReport, SkipReason};
use crate::error::LabelkitError;
use crate::parallel::WorkerPool;

const LABELME_VERSION: &str = "4.5.6";
const LABELME_EXTENSION: &str = "json";

/// One LabelMe document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelmeFile {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub shapes: Vec<LabelmeShape>,
    pub image_path: String,
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub image_height: u32,
    #[serde(default)]
    pub image_width: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelmeShape {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    #[serde(default)]
    pub group_id: Option<i64>,
    pub shape_type: String,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

// ============================================================================
// Export
// ============================================================================

/// Converts every task into a LabelMe document.
///
/// Segmentation annotations keep only the outer ring of their first region;
/// holes and further regions are dropped.
pub fn tasks_to_labelme(tasks: &[Task]) -> Result<(Vec<LabelmeFile>, ConversionReport), LabelkitError> {
    let pool = WorkerPool::for_annotations()?;
    let mut report = ConversionReport::new("labelme");
    let mut files = Vec::with_capacity(tasks.len());

    for task in tasks {
        let results = pool.map_ordered(&task.annotations, to_labelme_shape);
        files.push(LabelmeFile {
            version: LABELME_VERSION.to_string(),
            flags: BTreeMap::new(),
            shapes: report.gather(&task.name, results),
            image_path: task.name.clone(),
            image_data: None,
            image_height: task.height,
            image_width: task.width,
        });
    }
    Ok((files, report))
}

/// Writes `<output stem>.json` for every task under `output_dir`.
pub fn write_labelme_dir(output_dir: &Path, tasks: &[Task]) -> Result<ConversionReport, LabelkitError> {
    let (files, report) = tasks_to_labelme(tasks)?;
    fs::create_dir_all(output_dir).map_err(LabelkitError::Io)?;

    for (task, labelme) in tasks.iter().zip(&files) {
        let json_path = task.output_path(output_dir, LABELME_EXTENSION);
        ensure_parent_dir(&json_path)?;
        let writer = BufWriter::new(File::create(&json_path).map_err(LabelkitError::Io)?);
        serde_json::to_writer_pretty(writer, labelme).map_err(|source| {
            LabelkitError::JsonWrite {
                path: json_path.clone(),
                source,
            }
        })?;
    }

    log::info!("wrote {} LabelMe files to {}", files.len(), output_dir.display());
    Ok(report)
}

fn to_labelme_shape(annotation: &Annotation) -> Result<LabelmeShape, SkipReason> {
    let (shape_type, flat) = match annotation.kind {
        AnnotationType::Bbox => ("rectangle", annotation.points.flat()),
        AnnotationType::Polygon => ("polygon", annotation.points.flat()),
        AnnotationType::Keypoint => ("point", annotation.points.flat()),
        AnnotationType::Line => ("line", annotation.points.flat()),
        AnnotationType::Segmentation => {
            let outer = annotation
                .points
                .regions()
                .first()
                .and_then(|region| region.first())
                .ok_or(SkipReason::EmptyPoints)?;
            ("polygon", outer.as_slice())
        }
        kind => return Err(SkipReason::UnsupportedType { kind }),
    };
    if flat.is_empty() {
        return Err(SkipReason::EmptyPoints);
    }

    Ok(LabelmeShape {
        label: annotation.value.clone(),
        points: flat.chunks_exact(2).map(|p| (p[0], p[1])).collect(),
        group_id: None,
        shape_type: shape_type.to_string(),
        flags: BTreeMap::new(),
    })
}

// ============================================================================
// Import
// ============================================================================

/// Reads every `.json` file under `folder`.
///
/// Keys are the JSON file's path relative to `folder` with the extension of
/// the document's `imagePath`, so `sample_dir/sample2.json` pointing at a
/// JPEG becomes `sample_dir/sample2.jpg`.
pub fn read_labelme_dir(folder: &Path) -> Result<AnnotationMap, LabelkitError> {
    let mut map = AnnotationMap::new();
    for json_path in collect_files_with_extensions(folder, &[LABELME_EXTENSION])? {
        let file = File::open(&json_path).map_err(LabelkitError::Io)?;
        let labelme: LabelmeFile = serde_json::from_reader(BufReader::new(file)).map_err(
            |source| LabelkitError::LabelmeJsonParse {
                path: json_path.clone(),
                source,
            },
        )?;

        let rel = rel_string(folder, &json_path);
        let rel_stem = rel.strip_suffix(".json").unwrap_or(&rel);
        let key = match Path::new(&labelme.image_path)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            Some(ext) => format!("{rel_stem}.{ext}"),
            None => labelme.image_path.clone(),
        };
        map.insert(key, labelme_to_annotations(&labelme));
    }
    Ok(map)
}

/// Parses one LabelMe document into its `imagePath` and annotations.
pub fn from_labelme_str(json: &str) -> Result<(String, Vec<Annotation>), LabelkitError> {
    let labelme: LabelmeFile =
        serde_json::from_str(json).map_err(|source| LabelkitError::LabelmeJsonParse {
            path: "<string>".into(),
            source,
        })?;
    let annotations = labelme_to_annotations(&labelme);
    Ok((labelme.image_path, annotations))
}

/// Shapes of an unknown `shape_type` (circle, linestrip, mask, ...) are
/// skipped.
pub fn labelme_to_annotations(labelme: &LabelmeFile) -> Vec<Annotation> {
    labelme
        .shapes
        .iter()
        .filter_map(|shape| {
            let flat: Vec<f64> = shape.points.iter().flat_map(|&(x, y)| [x, y]).collect();
            match shape.shape_type.as_str() {
                "rectangle" => {
                    let bbox = BBoxXYXY::<Pixel>::from_points(&flat)?;
                    Some(Annotation::bbox(
                        &shape.label,
                        bbox.xmin(),
                        bbox.ymin(),
                        bbox.xmax(),
                        bbox.ymax(),
                    ))
                }
                "polygon" => Some(Annotation::polygon(&shape.label, flat)),
                "point" => {
                    let &(x, y) = shape.points.first()?;
                    Some(Annotation::keypoint(&shape.label, x, y))
                }
                "line" => Some(Annotation::line(&shape.label, flat)),
                other => {
                    log::debug!("skipping LabelMe shape type '{other}'");
                    None
                }
            }
        })
        .collect()
}

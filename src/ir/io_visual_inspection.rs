//! Visual-inspection JSONL export.
//!
//! One JSON object per line and per annotation. Vertices are ratios of the
//! image size, so tasks with a zero width or height produce nothing.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::model::{Annotation, AnnotationType, Task};
use super::walk::ensure_parent_dir;
use crate::conversion::{ConversionReport, SkipReason};
use crate::error::LabelkitError;
use crate::parallel::WorkerPool;

const ANNOTATION_SET: &str = "Polygons Regions";
const ML_USE_LABEL: &str = "goog_vi_ml_use";

#[derive(Clone, Debug)]
pub struct VisualInspectionOptions {
    /// Prepended to each task name to form `image_gcs_uri`,
    /// e.g. `gs://bucket/2024/`.
    pub image_uri_prefix: String,
    /// Value of the `goog_vi_ml_use` data item label.
    pub ml_use: String,
}

impl Default for VisualInspectionOptions {
    fn default() -> Self {
        Self {
            image_uri_prefix: String::new(),
            ml_use: "test".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisualInspectionRecord {
    pub image_gcs_uri: String,
    pub vi_annotations: ViAnnotation,
    #[serde(rename = "dataItemResourceLabels")]
    pub data_item_resource_labels: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViAnnotation {
    pub vi_bounding_poly: ViBoundingPoly,
    pub annotation_spec: String,
    pub annotation_set: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViBoundingPoly {
    pub vertex: Vec<ViVertex>,
}

/// A point as fractions of the image width and height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViVertex {
    pub x: f64,
    pub y: f64,
}

/// Converts bbox and segmentation annotations into JSONL records.
///
/// A bbox gives its four corners in the order top-left, top-right,
/// bottom-left, bottom-right. A segmentation gives the outer ring of its
/// first region.
pub fn tasks_to_visual_inspection(
    tasks: &[Task],
    options: &VisualInspectionOptions,
) -> Result<(Vec<VisualInspectionRecord>, ConversionReport), LabelkitError> {
    let pool = WorkerPool::for_annotations()?;
    let mut report = ConversionReport::new("visual_inspection");
    let mut records = Vec::new();

    for task in tasks {
        if task.has_zero_size() {
            report.skip(&task.name, SkipReason::ZeroSizedImage);
            continue;
        }
        let uri = format!("{}{}", options.image_uri_prefix, task.name);
        let results = pool.map_ordered(&task.annotations, |annotation| -> Result<_, SkipReason> {
            let vertex = vertices(annotation, f64::from(task.width), f64::from(task.height))?;
            Ok(VisualInspectionRecord {
                image_gcs_uri: uri.clone(),
                vi_annotations: ViAnnotation {
                    vi_bounding_poly: ViBoundingPoly { vertex },
                    annotation_spec: annotation.value.clone(),
                    annotation_set: ANNOTATION_SET.to_string(),
                },
                data_item_resource_labels: BTreeMap::from([(
                    ML_USE_LABEL.to_string(),
                    options.ml_use.clone(),
                )]),
            })
        });
        records.extend(report.gather(&task.name, results));
    }
    Ok((records, report))
}

/// Writes the records to `path`, one compact JSON object per line.
pub fn write_visual_inspection_jsonl(
    path: &Path,
    tasks: &[Task],
    options: &VisualInspectionOptions,
) -> Result<ConversionReport, LabelkitError> {
    let (records, report) = tasks_to_visual_inspection(tasks, options)?;
    ensure_parent_dir(path)?;
    let mut writer = BufWriter::new(File::create(path).map_err(LabelkitError::Io)?);

    for record in &records {
        serde_json::to_writer(&mut writer, record).map_err(|source| LabelkitError::JsonWrite {
            path: path.to_path_buf(),
            source,
        })?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    log::info!("wrote {} visual inspection records to {}", records.len(), path.display());
    Ok(report)
}

fn vertices(annotation: &Annotation, width: f64, height: f64) -> Result<Vec<ViVertex>, SkipReason> {
    let ratio = |x: f64, y: f64| ViVertex {
        x: x / width,
        y: y / height,
    };
    match annotation.kind {
        AnnotationType::Bbox => {
            let p = annotation.points.flat();
            if p.len() < 4 {
                return Err(SkipReason::EmptyPoints);
            }
            Ok(vec![
                ratio(p[0], p[1]),
                ratio(p[2], p[1]),
                ratio(p[0], p[3]),
                ratio(p[2], p[3]),
            ])
        }
        AnnotationType::Segmentation => {
            let outer = annotation
                .points
                .regions()
                .first()
                .and_then(|region| region.first())
                .filter(|ring| !ring.is_empty())
                .ok_or(SkipReason::EmptyPoints)?;
            Ok(outer.chunks_exact(2).map(|p| ratio(p[0], p[1])).collect())
        }
        kind => Err(SkipReason::UnsupportedType { kind }),
    }
}

//! COCO JSON import and export.
//!
//! COCO boxes are `[x, y, width, height]` with `(x, y)` the top-left corner
//! in pixels. The canonical model stores boxes as `[x1, y1, x2, y2]`.
//!
//! # Deterministic output
//!
//! Images keep task order and get 1-based ids. Annotations are sorted by
//! `(image_id, category_id, area)` before ids are assigned, so parallel
//! conversion never changes the file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{
    Annotation, AnnotationDefinition, AnnotationMap, AnnotationType, KeypointValue, PoseKeypoint,
    Task,
};
use super::{BBoxXYXY, Coord, Pixel};
use crate::conversion::{ConversionReport, SkipReason};
use crate::error::LabelkitError;
use crate::geometry::{polygon_area, rotated_box_ring};
use crate::parallel::WorkerPool;

// ============================================================================
// COCO Schema Types
// ============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CocoDataset {
    #[serde(default)]
    pub images: Vec<CocoImage>,

    #[serde(default)]
    pub categories: Vec<CocoCategory>,

    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoImage {
    pub file_name: String,

    #[serde(default)]
    pub height: u32,

    #[serde(default)]
    pub width: u32,

    pub id: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoCategory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,

    pub id: u64,

    pub name: String,

    /// Joint names, present on pose-estimation categories.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keypoints: Vec<String>,

    /// 1-based joint index pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skeleton: Vec<[u64; 2]>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoAnnotation {
    /// Polygons as `[[x0, y0, ...], ...]`; RLE objects are accepted on import
    /// but never produced.
    #[serde(default)]
    pub segmentation: Value,

    #[serde(default)]
    pub iscrowd: u8,

    #[serde(default)]
    pub area: f64,

    pub image_id: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,

    pub category_id: u64,

    #[serde(default)]
    pub id: u64,

    /// Flat `[x, y, v]` triplets in category keypoint order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keypoints: Vec<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_keypoints: Option<u32>,

    /// Annotation attributes as a `key: value` map.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
}

/// Options for COCO export.
#[derive(Clone, Debug, Default)]
pub struct CocoExportOptions {
    /// Project class catalog. When non-empty, categories follow this order
    /// and pose-estimation classes carry keypoint and skeleton metadata.
    /// When empty, categories are discovered from the tasks.
    pub definitions: Vec<AnnotationDefinition>,
}

// ============================================================================
// Public API
// ============================================================================

/// Reads a COCO JSON file into annotations keyed by image `file_name`.
pub fn read_coco_json(path: &Path) -> Result<AnnotationMap, LabelkitError> {
    let file = File::open(path).map_err(LabelkitError::Io)?;
    let reader = BufReader::new(file);

    let coco: CocoDataset =
        serde_json::from_reader(reader).map_err(|source| LabelkitError::CocoJsonParse {
            path: path.to_path_buf(),
            source,
        })?;

    coco_to_annotations(&coco)
}

/// Writes tasks as a COCO JSON file.
pub fn write_coco_json(
    path: &Path,
    tasks: &[Task],
    options: &CocoExportOptions,
) -> Result<ConversionReport, LabelkitError> {
    let (coco, report) = tasks_to_coco(tasks, options)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).map_err(LabelkitError::Io)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, &coco).map_err(|source| LabelkitError::CocoJsonWrite {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!(
        "wrote {} images, {} annotations to {}",
        coco.images.len(),
        coco.annotations.len(),
        path.display()
    );
    Ok(report)
}

/// Renders tasks as a COCO JSON string.
pub fn to_coco_string(tasks: &[Task], options: &CocoExportOptions) -> Result<String, LabelkitError> {
    let (coco, _) = tasks_to_coco(tasks, options)?;
    serde_json::to_string_pretty(&coco).map_err(|source| LabelkitError::CocoJsonWrite {
        path: "<string>".into(),
        source,
    })
}

// ============================================================================
// Conversion: tasks -> COCO
// ============================================================================

/// Converts tasks into a COCO document.
///
/// Every task becomes an image, including tasks with zero width or height.
/// Annotations COCO can't carry are skipped and listed in the report.
///
/// # Errors
/// Fails with [`LabelkitError::PoseCategoryNotFound`] when a pose-estimation
/// annotation has no matching pose class in `options.definitions`.
pub fn tasks_to_coco(
    tasks: &[Task],
    options: &CocoExportOptions,
) -> Result<(CocoDataset, ConversionReport), LabelkitError> {
    let categories = build_categories(tasks, &options.definitions)?;
    let lookup: HashMap<&str, &CocoCategory> = categories
        .iter()
        .rev()
        .map(|c| (c.name.as_str(), c))
        .collect();

    let pool = WorkerPool::for_annotations()?;
    let mut report = ConversionReport::new("coco");
    let mut images = Vec::with_capacity(tasks.len());
    let mut annotations = Vec::new();

    for (index, task) in tasks.iter().enumerate() {
        let image = CocoImage {
            file_name: task.name.clone(),
            height: task.height,
            width: task.width,
            id: index as u64 + 1,
        };
        let results = pool.map_ordered(&task.annotations, |annotation| {
            to_coco_annotation(annotation, &lookup, image.id)
        });
        annotations.extend(report.gather(&task.name, results));
        images.push(image);
    }

    annotations.sort_by(|a, b| {
        (a.image_id, a.category_id)
            .cmp(&(b.image_id, b.category_id))
            .then(a.area.total_cmp(&b.area))
    });
    for (index, annotation) in annotations.iter_mut().enumerate() {
        annotation.id = index as u64 + 1;
    }

    Ok((
        CocoDataset {
            images,
            categories,
            annotations,
        },
        report,
    ))
}

const CATEGORY_TYPES: [AnnotationType; 4] = [
    AnnotationType::Bbox,
    AnnotationType::Polygon,
    AnnotationType::Segmentation,
    AnnotationType::PoseEstimation,
];

/// Distinct annotation values of the given kinds, in first-seen order.
pub(crate) fn discover_values(tasks: &[Task], kinds: &[AnnotationType]) -> Vec<String> {
    let mut seen = HashSet::new();
    tasks
        .iter()
        .flat_map(|t| &t.annotations)
        .filter(|a| kinds.contains(&a.kind))
        .filter(|a| seen.insert(a.value.as_str()))
        .map(|a| a.value.clone())
        .collect()
}

fn build_categories(
    tasks: &[Task],
    definitions: &[AnnotationDefinition],
) -> Result<Vec<CocoCategory>, LabelkitError> {
    let categories: Vec<CocoCategory> = if definitions.is_empty() {
        discover_values(tasks, &CATEGORY_TYPES[..3])
            .into_iter()
            .enumerate()
            .map(|(i, value)| CocoCategory {
                supercategory: Some(value.clone()),
                id: i as u64 + 1,
                name: value,
                keypoints: Vec::new(),
                skeleton: Vec::new(),
            })
            .collect()
    } else {
        definitions
            .iter()
            .filter(|d| CATEGORY_TYPES.contains(&d.kind))
            .enumerate()
            .map(|(i, d)| category_from_definition(i as u64 + 1, d))
            .collect()
    };

    let pose_values: HashSet<&str> = categories
        .iter()
        .filter(|c| !c.keypoints.is_empty())
        .map(|c| c.name.as_str())
        .collect();
    if let Some(orphan) = tasks
        .iter()
        .flat_map(|t| &t.annotations)
        .find(|a| a.kind == AnnotationType::PoseEstimation && !pose_values.contains(a.value.as_str()))
    {
        return Err(LabelkitError::PoseCategoryNotFound {
            value: orphan.value.clone(),
        });
    }

    Ok(categories)
}

/// Builds a category; pose classes get their joint list and skeleton.
///
/// Skeleton edges are undirected: each connected pair is emitted once, as
/// `[declaring joint, target joint]` for the first declaration met in
/// catalog order. Edges naming unknown joints are ignored.
fn category_from_definition(id: u64, definition: &AnnotationDefinition) -> CocoCategory {
    let keys: Vec<String> = definition.keypoints.iter().map(|k| k.key.clone()).collect();
    let mut seen = HashSet::new();
    let mut skeleton = Vec::new();
    for (from, keypoint) in definition.keypoints.iter().enumerate() {
        for target in &keypoint.edges {
            let Some(to) = keys.iter().position(|k| k == target) else {
                continue;
            };
            if from == to || !seen.insert((from.min(to), from.max(to))) {
                continue;
            }
            skeleton.push([from as u64 + 1, to as u64 + 1]);
        }
    }
    CocoCategory {
        supercategory: Some(definition.value.clone()),
        id,
        name: definition.value.clone(),
        keypoints: keys,
        skeleton,
    }
}

/// Box of a bbox or polygon annotation as the exporters see it.
///
/// Bbox corners are rotated about the box center by `rotation` degrees
/// before the axis-aligned hull is taken. Boxes whose truncated width or
/// height is zero are rejected.
pub(crate) fn export_box(annotation: &Annotation) -> Result<BBoxXYXY<Pixel>, SkipReason> {
    let points = annotation.points.flat();
    match annotation.kind {
        AnnotationType::Bbox => {
            let raw = raw_box(points)?;
            if annotation.rotation == 0.0 {
                return Ok(BBoxXYXY::from_points(points).unwrap_or(raw));
            }
            let ring = rotated_box_ring(&raw, annotation.rotation);
            BBoxXYXY::from_points(&ring).ok_or(SkipReason::EmptyPoints)
        }
        AnnotationType::Polygon => BBoxXYXY::from_points(points).ok_or(SkipReason::EmptyPoints),
        kind => Err(SkipReason::UnsupportedType { kind }),
    }
}

fn raw_box(points: &[f64]) -> Result<BBoxXYXY<Pixel>, SkipReason> {
    if points.is_empty() {
        return Err(SkipReason::EmptyPoints);
    }
    if points.len() < 4 {
        return Err(SkipReason::MalformedInput {
            detail: format!("bbox needs 4 values, got {}", points.len()),
        });
    }
    let raw = BBoxXYXY::from_xyxy(points[0], points[1], points[2], points[3]);
    if raw.is_degenerate_in_pixels() {
        return Err(SkipReason::DegenerateBox);
    }
    Ok(raw)
}

fn xywh(bbox: &BBoxXYXY<Pixel>) -> [f64; 4] {
    let (x, y, w, h) = bbox.to_xywh();
    [x, y, w, h]
}

fn to_coco_annotation(
    annotation: &Annotation,
    categories: &HashMap<&str, &CocoCategory>,
    image_id: u64,
) -> Result<CocoAnnotation, SkipReason> {
    if !CATEGORY_TYPES.contains(&annotation.kind) {
        return Err(SkipReason::UnsupportedType {
            kind: annotation.kind,
        });
    }
    let category = categories
        .get(annotation.value.as_str())
        .ok_or_else(|| SkipReason::UnknownCategory {
            value: annotation.value.clone(),
        })?;

    let mut coco = CocoAnnotation {
        segmentation: Value::Array(Vec::new()),
        iscrowd: 0,
        area: 0.0,
        image_id,
        bbox: None,
        category_id: category.id,
        id: 0,
        keypoints: Vec::new(),
        num_keypoints: None,
        attributes: annotation
            .attributes
            .iter()
            .map(|a| (a.key.clone(), a.value.clone()))
            .collect(),
    };

    match annotation.kind {
        AnnotationType::Bbox => {
            let points = annotation.points.flat();
            let raw = raw_box(points)?;
            let ring = rotated_box_ring(&raw, annotation.rotation);
            let hull = export_box(annotation)?;
            coco.segmentation = serde_json::json!([ring]);
            coco.area = (raw.width() * raw.height()).abs();
            coco.bbox = Some(xywh(&hull));
        }
        AnnotationType::Polygon => {
            let points = annotation.points.flat();
            let hull = BBoxXYXY::from_points(points).ok_or(SkipReason::EmptyPoints)?;
            coco.segmentation = serde_json::json!([points]);
            coco.area = polygon_area(points);
            coco.bbox = Some(xywh(&hull));
        }
        AnnotationType::Segmentation => {
            let rings: Vec<&Vec<f64>> = annotation
                .points
                .regions()
                .iter()
                .flatten()
                .filter(|ring| !ring.is_empty())
                .collect();
            let hull = BBoxXYXY::enclosing(
                rings.iter().flat_map(|ring| Coord::pairs(ring)),
            )
            .ok_or(SkipReason::EmptyPoints)?;
            coco.area = rings.iter().map(|ring| polygon_area(ring)).sum();
            coco.segmentation = serde_json::json!(rings);
            coco.bbox = Some(xywh(&hull));
        }
        AnnotationType::PoseEstimation => {
            let (keypoints, labelled) = pose_keypoints(annotation, &category.keypoints);
            let hull = BBoxXYXY::enclosing(labelled).unwrap_or_default();
            coco.num_keypoints = Some(
                keypoints
                    .chunks_exact(3)
                    .filter(|triplet| triplet[2] > 0.0)
                    .count() as u32,
            );
            coco.keypoints = keypoints;
            coco.area = hull.area();
            coco.bbox = Some(xywh(&hull));
        }
        kind => return Err(SkipReason::UnsupportedType { kind }),
    }
    Ok(coco)
}

/// Canonical visibility to COCO visibility: 0 stays 0 (not labelled),
/// 1 (visible) becomes 2, anything else becomes 1 (labelled, hidden).
fn coco_visibility(visibility: f64) -> f64 {
    if visibility == 0.0 {
        0.0
    } else if visibility == 1.0 {
        2.0
    } else {
        1.0
    }
}

/// Flat `[x, y, v]` triplets in category order plus the labelled positions.
fn pose_keypoints(annotation: &Annotation, keys: &[String]) -> (Vec<f64>, Vec<Coord<Pixel>>) {
    let by_key: HashMap<&str, &KeypointValue> = annotation
        .keypoints
        .iter()
        .filter_map(|k| k.value.as_ref().map(|v| (k.key.as_str(), v)))
        .collect();
    let mut flat = Vec::with_capacity(keys.len() * 3);
    let mut labelled = Vec::new();
    for key in keys {
        match by_key.get(key.as_str()) {
            Some(value) => {
                let v = coco_visibility(value.visibility);
                flat.extend([value.x, value.y, v]);
                if v > 0.0 {
                    labelled.push(Coord::new(value.x, value.y));
                }
            }
            None => flat.extend([0.0, 0.0, 0.0]),
        }
    }
    (flat, labelled)
}

// ============================================================================
// Conversion: COCO -> annotations
// ============================================================================

/// Converts a parsed COCO document into canonical annotations.
///
/// Every image gets an entry, even without annotations. Annotations whose
/// image or category id is unknown are skipped with a warning.
///
/// # Errors
/// Fails with [`LabelkitError::InvalidKeypointVisibility`] when a keypoint
/// visibility is not 0, 1 or 2.
pub fn coco_to_annotations(coco: &CocoDataset) -> Result<AnnotationMap, LabelkitError> {
    let images: HashMap<u64, &str> = coco
        .images
        .iter()
        .map(|img| (img.id, img.file_name.as_str()))
        .collect();
    let categories: HashMap<u64, &CocoCategory> =
        coco.categories.iter().map(|c| (c.id, c)).collect();

    let mut map: AnnotationMap = BTreeMap::new();
    for image in &coco.images {
        map.entry(image.file_name.clone()).or_default();
    }

    for ann in &coco.annotations {
        let Some(file_name) = images.get(&ann.image_id) else {
            log::warn!("COCO annotation {} references unknown image {}", ann.id, ann.image_id);
            continue;
        };
        let Some(category) = categories.get(&ann.category_id) else {
            log::warn!(
                "COCO annotation {} references unknown category {}",
                ann.id,
                ann.category_id
            );
            continue;
        };
        match annotation_from_coco(ann, category)? {
            Some(annotation) => map.entry(file_name.to_string()).or_default().push(annotation),
            None => log::debug!("COCO annotation {} has no usable geometry", ann.id),
        }
    }
    Ok(map)
}

fn annotation_from_coco(
    ann: &CocoAnnotation,
    category: &CocoCategory,
) -> Result<Option<Annotation>, LabelkitError> {
    if !category.keypoints.is_empty() && !ann.keypoints.is_empty() {
        return pose_from_coco(ann, category).map(Some);
    }

    let first_ring: Option<Vec<f64>> = ann
        .segmentation
        .as_array()
        .and_then(|rings| rings.first())
        .and_then(|ring| ring.as_array())
        .map(|ring| ring.iter().filter_map(Value::as_f64).collect());

    let annotation = match first_ring {
        Some(ring) if ring.len() == 4 => Some(Annotation::new(
            AnnotationType::Bbox,
            &category.name,
            super::Points::Flat(ring),
        )),
        Some(ring) if ring.len() > 4 => Some(Annotation::polygon(&category.name, ring)),
        Some(_) => None,
        None if is_empty_segmentation(&ann.segmentation) => ann
            .bbox
            .map(|[x, y, w, h]| Annotation::bbox(&category.name, x, y, x + w, y + h)),
        None => None,
    };
    Ok(annotation)
}

fn is_empty_segmentation(segmentation: &Value) -> bool {
    match segmentation {
        Value::Null => true,
        Value::Array(rings) => rings.is_empty(),
        _ => false,
    }
}

/// COCO visibility 1 and 2 become canonical 0 and 1; unlabelled joints
/// (v = 0) are left out.
fn pose_from_coco(ann: &CocoAnnotation, category: &CocoCategory) -> Result<Annotation, LabelkitError> {
    let mut keypoints = Vec::new();
    for (index, (key, triplet)) in category
        .keypoints
        .iter()
        .zip(ann.keypoints.chunks_exact(3))
        .enumerate()
    {
        let (x, y, v) = (triplet[0], triplet[1], triplet[2]);
        if v != 0.0 && v != 1.0 && v != 2.0 {
            return Err(LabelkitError::InvalidKeypointVisibility {
                annotation_id: ann.id,
                visibility: v,
            });
        }
        if v == 0.0 {
            continue;
        }
        let joint = index as u64 + 1;
        let mut keypoint = PoseKeypoint::new(key, Some(KeypointValue::new(x, y, v - 1.0)));
        keypoint.edges = category
            .skeleton
            .iter()
            .filter_map(|&[a, b]| match (a == joint, b == joint) {
                (true, false) => Some(b),
                (false, true) => Some(a),
                _ => None,
            })
            // Skeleton joints are 1-based; 0 names no joint.
            .filter_map(|other| other.checked_sub(1))
            .filter_map(|other| category.keypoints.get(other as usize).cloned())
            .collect();
        keypoints.push(keypoint);
    }
    Ok(Annotation::pose(&category.name, keypoints))
}

//! Canonical annotation records.
//!
//! Every importer produces these records and every exporter consumes them.
//! Geometry is always in pixel space with the origin at the top-left corner.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One closed or open ring as a flat `[x0, y0, x1, y1, ...]` list.
pub type Ring = Vec<f64>;

/// An outer ring followed by zero or more hole rings.
pub type Region = Vec<Ring>;

/// Importer output: annotations grouped by media key (a relative image path).
pub type AnnotationMap = BTreeMap<String, Vec<Annotation>>;

/// One image together with its annotations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Image file name, possibly containing `/` separators.
    pub name: String,

    /// Zero when the dimensions are unknown.
    #[serde(default)]
    pub width: u32,

    #[serde(default)]
    pub height: u32,

    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Task {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// True when either dimension is unknown, which rules out any ratio or
    /// raster output for this task.
    pub fn has_zero_size(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// `name` without its extension, directory components kept.
    ///
    /// Exporters derive every per-image output path from this, so
    /// `dir/photo.v2.jpg` becomes `dir/photo.v2.xml`, `dir/photo.v2.png`, etc.
    pub fn output_stem(&self) -> &str {
        let base_start = self.name.rfind('/').map_or(0, |slash| slash + 1);
        match self.name[base_start..].rfind('.') {
            Some(dot) if dot > 0 => &self.name[..base_start + dot],
            _ => &self.name,
        }
    }

    /// Output path for this task under `dir` with the given extension.
    pub fn output_path(&self, dir: &std::path::Path, extension: &str) -> std::path::PathBuf {
        dir.join(format!("{}.{}", self.output_stem(), extension))
    }
}

/// Shape kind of an [`Annotation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    Bbox,
    Polygon,
    Line,
    Keypoint,
    Segmentation,
    Classification,
    PoseEstimation,
}

impl AnnotationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationType::Bbox => "bbox",
            AnnotationType::Polygon => "polygon",
            AnnotationType::Line => "line",
            AnnotationType::Keypoint => "keypoint",
            AnnotationType::Segmentation => "segmentation",
            AnnotationType::Classification => "classification",
            AnnotationType::PoseEstimation => "pose_estimation",
        }
    }
}

impl std::fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry payload of an annotation.
///
/// The shape depends on the annotation type:
/// - bbox: `[x1, y1, x2, y2]`
/// - polygon / line: flat coordinate list
/// - keypoint: `[x, y]` or `{"x": .., "y": ..}`
/// - segmentation: a list of regions, each `[outer, hole, ...]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Points {
    Flat(Vec<f64>),
    Regions(Vec<Region>),
    Point { x: f64, y: f64 },
}

impl Default for Points {
    fn default() -> Self {
        Points::Flat(Vec::new())
    }
}

impl Points {
    /// The flat coordinate list, or an empty slice for other shapes.
    pub fn flat(&self) -> &[f64] {
        match self {
            Points::Flat(values) => values,
            _ => &[],
        }
    }

    /// The region list, or an empty slice for other shapes.
    pub fn regions(&self) -> &[Region] {
        match self {
            Points::Regions(regions) => regions,
            _ => &[],
        }
    }

    /// A single point, from either `{x, y}` or the first pair of a flat list.
    pub fn xy(&self) -> Option<(f64, f64)> {
        match self {
            Points::Point { x, y } => Some((*x, *y)),
            Points::Flat(values) if values.len() >= 2 => Some((values[0], values[1])),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Points::Flat(values) => values.is_empty(),
            Points::Regions(regions) => regions.is_empty(),
            Points::Point { .. } => false,
        }
    }
}

/// A labelled shape on one image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: AnnotationType,

    /// Class name.
    pub value: String,

    #[serde(default, skip_serializing_if = "Points::is_empty")]
    pub points: Points,

    /// Named joints, only meaningful for pose estimation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keypoints: Vec<PoseKeypoint>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,

    /// `#RRGGBB`, used by the overlay renderer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Clockwise rotation in degrees, only meaningful for bbox.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub rotation: f64,
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

impl Annotation {
    pub fn new(kind: AnnotationType, value: impl Into<String>, points: Points) -> Self {
        Self {
            kind,
            value: value.into(),
            points,
            keypoints: Vec::new(),
            attributes: Vec::new(),
            color: None,
            rotation: 0.0,
        }
    }

    pub fn bbox(value: impl Into<String>, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(
            AnnotationType::Bbox,
            value,
            Points::Flat(vec![x1, y1, x2, y2]),
        )
    }

    pub fn polygon(value: impl Into<String>, points: Vec<f64>) -> Self {
        Self::new(AnnotationType::Polygon, value, Points::Flat(points))
    }

    pub fn line(value: impl Into<String>, points: Vec<f64>) -> Self {
        Self::new(AnnotationType::Line, value, Points::Flat(points))
    }

    pub fn keypoint(value: impl Into<String>, x: f64, y: f64) -> Self {
        Self::new(AnnotationType::Keypoint, value, Points::Flat(vec![x, y]))
    }

    pub fn segmentation(value: impl Into<String>, regions: Vec<Region>) -> Self {
        Self::new(AnnotationType::Segmentation, value, Points::Regions(regions))
    }

    pub fn pose(value: impl Into<String>, keypoints: Vec<PoseKeypoint>) -> Self {
        let mut annotation = Self::new(AnnotationType::PoseEstimation, value, Points::default());
        annotation.keypoints = keypoints;
        annotation
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Value of a `switch` attribute, if the annotation carries one named `key`.
    pub fn switch(&self, key: &str) -> Option<bool> {
        self.attributes
            .iter()
            .find(|a| a.kind == "switch" && a.key == key)
            .and_then(|a| a.value.as_bool())
    }
}

/// Attribute attached to an annotation, e.g. a `switch` named `difficult`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: serde_json::Value,
}

impl Attribute {
    pub fn switch(key: impl Into<String>, on: bool) -> Self {
        Self {
            key: key.into(),
            kind: "switch".to_string(),
            value: serde_json::Value::Bool(on),
        }
    }
}

/// One named joint of a pose-estimation annotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseKeypoint {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// `None` when the joint was not labelled.
    #[serde(default)]
    pub value: Option<KeypointValue>,

    /// Keys of joints this one is connected to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<String>,
}

impl PoseKeypoint {
    pub fn new(key: impl Into<String>, value: Option<KeypointValue>) -> Self {
        Self {
            key: key.into(),
            name: None,
            value,
            edges: Vec::new(),
        }
    }
}

/// A joint position with its canonical visibility flag.
///
/// Serialized as `[x, y, visibility]`. Canonical visibility is `0` for an
/// occluded joint and `1` for a visible one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64, f64)", into = "(f64, f64, f64)")]
pub struct KeypointValue {
    pub x: f64,
    pub y: f64,
    pub visibility: f64,
}

impl KeypointValue {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, visibility }
    }
}

impl From<(f64, f64, f64)> for KeypointValue {
    fn from((x, y, visibility): (f64, f64, f64)) -> Self {
        Self { x, y, visibility }
    }
}

impl From<KeypointValue> for (f64, f64, f64) {
    fn from(value: KeypointValue) -> Self {
        (value.x, value.y, value.visibility)
    }
}

/// Project-level description of one class, used to build COCO categories.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDefinition {
    pub value: String,

    #[serde(rename = "type")]
    pub kind: AnnotationType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Joint catalog, in output order, for pose-estimation classes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keypoints: Vec<KeypointDefinition>,
}

impl AnnotationDefinition {
    pub fn new(value: impl Into<String>, kind: AnnotationType) -> Self {
        Self {
            value: value.into(),
            kind,
            color: None,
            keypoints: Vec::new(),
        }
    }

    pub fn with_keypoints(mut self, keypoints: Vec<KeypointDefinition>) -> Self {
        self.keypoints = keypoints;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeypointDefinition {
    pub key: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Keys of connected joints.
    #[serde(default)]
    pub edges: Vec<String>,
}

impl KeypointDefinition {
    pub fn new(key: impl Into<String>, edges: &[&str]) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            color: None,
            edges: edges.iter().map(|e| e.to_string()).collect(),
        }
    }
}

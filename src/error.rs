use std::path::PathBuf;
use thiserror::Error;

/// The main error type for labelkit operations.
///
/// Only conditions that abort a whole conversion call live here. Units that
/// a target format cannot represent are skipped and reported through
/// [`ConversionReport`](crate::conversion::ConversionReport) instead.
#[derive(Debug, Error)]
pub enum LabelkitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse task JSON from {path}: {source}")]
    TaskJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write task JSON to {path}: {source}")]
    TaskJsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse COCO JSON from {path}: {source}")]
    CocoJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write COCO JSON to {path}: {source}")]
    CocoJsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse LabelMe JSON from {path}: {source}")]
    LabelmeJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write JSON to {path}: {source}")]
    JsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse Pascal VOC XML from {path}: {message}")]
    VocXmlParse { path: PathBuf, message: String },

    #[error("Failed to traverse directory {path}: {message}")]
    DirectoryWalk { path: PathBuf, message: String },

    #[error("Failed to read image dimensions from {path}: {source}")]
    ImageDimensionRead {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Failed to read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode PNG {path}: {source}")]
    PngEncode {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },

    #[error("Invalid input: keypoint visibility {visibility} in COCO annotation {annotation_id} (expected 0, 1 or 2)")]
    InvalidKeypointVisibility { annotation_id: u64, visibility: f64 },

    #[error("No pose estimation category defined for annotation value '{value}'")]
    PoseCategoryNotFound { value: String },

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
